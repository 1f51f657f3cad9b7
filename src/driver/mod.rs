//! Browser driver abstraction.
//!
//! All core logic talks to the [`Driver`] trait; [`chrome::ChromeDriver`] is
//! the CDP-backed implementation and [`mock::MockDriver`] backs offline tests.

pub mod chrome;
pub mod js;
pub mod mock;

pub use chrome::{ChromeDriver, LaunchOptions};
pub use mock::MockDriver;

use crate::dom::{DomSnapshot, InteractionType, PossibleInteractionsByXpath, ScrollDirection};
use crate::error::{Result, WebpilotError};
use crate::trajectory::{NavigationCommand, NavigationOutput};
use indexmap::IndexMap;
use std::time::Duration;

/// One boundary crossed while resolving a synthetic xpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Absolute xpath of an `iframe` element whose content document the
    /// remainder of the path lives in
    Frame(String),
    /// Absolute xpath of a shadow host; the remainder is relative to its
    /// shadow root
    ShadowHost(String),
}

/// A synthetic xpath decomposed at iframe and shadow-root boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpathTarget {
    /// Boundaries to cross, outermost first
    pub steps: Vec<PathStep>,
    /// Path remainder inside the innermost context
    pub local: String,
    /// The full xpath as given
    pub full: String,
}

impl XpathTarget {
    /// Decompose an xpath at `iframe` segments and `//` shadow separators.
    ///
    /// `/html/body/iframe[2]/html/body/button` yields one Frame step for the
    /// iframe and a local path of `/html/body/button`;
    /// `/html/body/my-widget//button` yields one ShadowHost step and a local
    /// path of `button`.
    pub fn parse(xpath: &str) -> Self {
        let mut steps = Vec::new();
        let shadow_parts: Vec<&str> = xpath.split("//").collect();
        let mut local = String::new();
        for (i, part) in shadow_parts.iter().enumerate() {
            let last_part = i == shadow_parts.len() - 1;
            let remainder = split_frames(part, &mut steps);
            if last_part {
                local = remainder;
            } else {
                steps.push(PathStep::ShadowHost(remainder));
            }
        }
        Self {
            steps,
            local,
            full: xpath.to_string(),
        }
    }

    /// Whether the path crosses any iframe or shadow boundary
    pub fn crosses_boundary(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Peel `iframe` boundaries off one `//`-free path piece, pushing a Frame
/// step per boundary, and return the remainder
fn split_frames(piece: &str, steps: &mut Vec<PathStep>) -> String {
    let mut current = String::new();
    let mut rest = String::new();
    let mut in_frame_remainder = false;
    for segment in piece.split('/').filter(|s| !s.is_empty()) {
        if in_frame_remainder {
            rest.push('/');
            rest.push_str(segment);
            continue;
        }
        current.push('/');
        current.push_str(segment);
        let tag = segment.split('[').next().unwrap_or(segment);
        if tag == "iframe" {
            steps.push(PathStep::Frame(current.clone()));
            in_frame_remainder = true;
        }
    }
    if in_frame_remainder {
        // The remainder may itself contain another iframe boundary
        if rest.contains("/iframe") {
            let last = steps.len();
            let deeper = split_frames(&rest, steps);
            if steps.len() > last {
                return deeper;
            }
        }
        rest
    } else {
        // Relative shadow-content paths carry no leading slash
        if piece.starts_with('/') {
            current
        } else {
            current.trim_start_matches('/').to_string()
        }
    }
}

/// Focus guard returned by [`resolve_xpath`]: while alive, the driver's
/// frame focus is inside the target's context; dropping it restores the
/// default (top-level) context even on error paths.
pub struct ResolvedNode<'a> {
    driver: &'a dyn Driver,
    /// Decomposed target path
    pub target: XpathTarget,
}

impl ResolvedNode<'_> {
    /// Full xpath of the resolved element
    pub fn xpath(&self) -> &str {
        &self.target.full
    }
}

impl Drop for ResolvedNode<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.driver.restore_root() {
            log::warn!("failed to restore default frame context: {e}");
        }
    }
}

/// Resolve a synthetic xpath, switching the driver's focus across iframe and
/// shadow boundaries. Fails with `NoElement` when any segment resolves to
/// nothing; the focus is restored either way.
pub fn resolve_xpath<'a>(driver: &'a dyn Driver, xpath: &str) -> Result<ResolvedNode<'a>> {
    let target = XpathTarget::parse(xpath);
    let guard = ResolvedNode {
        driver,
        target: target.clone(),
    };
    for step in &target.steps {
        match step {
            PathStep::Frame(frame_xpath) => driver.enter_frame(frame_xpath)?,
            PathStep::ShadowHost(host_xpath) => driver.enter_shadow(host_xpath)?,
        }
    }
    if !driver.element_exists(xpath)? {
        return Err(WebpilotError::NoElement(xpath.to_string()));
    }
    Ok(guard)
}

/// Abstract browser driver.
///
/// Implementations provide session management, DOM snapshots and the element
/// primitives; `execute` dispatches structured actions onto those primitives
/// with an exhaustive match over [`NavigationCommand`].
pub trait Driver {
    /// Current page URL; `NoPage` when nothing is loaded
    fn get_url(&self) -> Result<String>;

    /// Navigate the active tab to a URL
    fn goto(&self, url: &str) -> Result<()>;

    /// Navigate back in history; `CannotBack` at the history root
    fn back(&self) -> Result<()>;

    /// One line per open tab: `<index> - <title> - <url>`
    fn get_tabs(&self) -> Result<String>;

    /// Make the tab with the given id active
    fn switch_tab(&self, tab_id: &str) -> Result<()>;

    /// Extract the full element tree, same-origin iframes and shadow roots
    /// included
    fn snapshot(&self) -> Result<DomSnapshot>;

    /// Serialized HTML of the current document
    fn get_html(&self) -> Result<String> {
        Ok(self.snapshot()?.to_html())
    }

    /// Interactions map for the current document
    fn get_possible_interactions(
        &self,
        in_viewport: bool,
        foreground_only: bool,
        types: &[InteractionType],
    ) -> Result<PossibleInteractionsByXpath> {
        Ok(self
            .snapshot()?
            .possible_interactions(in_viewport, foreground_only, types))
    }

    /// Shadow root content by host xpath
    fn get_shadow_roots(&self) -> Result<IndexMap<String, String>> {
        Ok(self.snapshot()?.shadow_roots())
    }

    /// Whether the element at the xpath is currently visible
    fn check_visibility(&self, xpath: &str) -> Result<bool> {
        Ok(self.snapshot()?.is_visible(xpath))
    }

    /// Whether the xpath resolves to an element at all
    fn element_exists(&self, xpath: &str) -> Result<bool> {
        Ok(self.snapshot()?.find(xpath).is_some())
    }

    /// Switch focus into the content document of the iframe at the xpath
    fn enter_frame(&self, frame_xpath: &str) -> Result<()>;

    /// Re-root resolution inside the shadow root of the host at the xpath
    fn enter_shadow(&self, host_xpath: &str) -> Result<()>;

    /// Restore the default top-level context
    fn restore_root(&self) -> Result<()>;

    /// Current nesting depth of frame/shadow focus (0 = top level)
    fn focus_depth(&self) -> usize;

    /// Click the element at the xpath
    fn click(&self, xpath: &str) -> Result<()>;

    /// Hover the element at the xpath
    fn hover(&self, xpath: &str) -> Result<()>;

    /// Clear the element and type the value; select elements pick the option
    /// by value, then by visible text; `enter` presses Enter afterwards
    fn set_value(&self, xpath: &str, value: &str, enter: bool) -> Result<()>;

    /// Send a single key to the focused element
    fn type_key(&self, key: &str) -> Result<()>;

    /// Scroll by 75% of the nearest scrollable ancestor of the xpath target,
    /// or of the viewport when no xpath is given or no ancestor scrolls
    fn scroll(&self, xpath: Option<&str>, direction: ScrollDirection) -> Result<()>;

    /// Block until in-flight network requests settle and the DOM stops
    /// mutating; a timeout is non-fatal and only logged
    fn wait_for_idle(&self, timeout: Duration) -> Result<()>;

    /// PNG screenshot of the current viewport
    fn get_screenshot_as_png(&self) -> Result<Vec<u8>>;

    /// Evaluate a JS expression in the page, returning its JSON value
    fn execute_script(&self, js: &str) -> Result<serde_json::Value>;

    /// Execute one structured action
    fn execute(&self, action: &NavigationOutput) -> Result<()> {
        action.validate()?;
        let xpath = || -> Result<&str> {
            action
                .xpath
                .as_deref()
                .ok_or_else(|| WebpilotError::InvalidAction("missing xpath".to_string()))
        };
        let value = || -> Result<&str> {
            action
                .value
                .as_deref()
                .ok_or_else(|| WebpilotError::InvalidAction("missing value".to_string()))
        };
        match action.navigation_command {
            NavigationCommand::Click => self.click(xpath()?),
            NavigationCommand::SetValue => self.set_value(xpath()?, value()?, false),
            NavigationCommand::SetValueAndEnter => self.set_value(xpath()?, value()?, true),
            NavigationCommand::TypeKey => self.type_key(value()?),
            NavigationCommand::Hover => self.hover(xpath()?),
            NavigationCommand::Scroll => {
                let direction = action.scroll_direction().ok_or_else(|| {
                    WebpilotError::InvalidAction("scroll without direction".to_string())
                })?;
                self.scroll(action.xpath.as_deref(), direction)
            }
            NavigationCommand::Back => self.back(),
            NavigationCommand::SwitchTab => self.switch_tab(value()?),
            NavigationCommand::Pass => {
                log::debug!("pass action: no-op");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_xpath() {
        let target = XpathTarget::parse("/html/body/div[2]/button");
        assert!(target.steps.is_empty());
        assert_eq!(target.local, "/html/body/div[2]/button");
        assert!(!target.crosses_boundary());
    }

    #[test]
    fn test_parse_iframe_boundary() {
        let target = XpathTarget::parse("/html/body/iframe[2]/html/body/button");
        assert_eq!(
            target.steps,
            vec![PathStep::Frame("/html/body/iframe[2]".to_string())]
        );
        assert_eq!(target.local, "/html/body/button");
    }

    #[test]
    fn test_parse_nested_iframes() {
        let target = XpathTarget::parse("/html/body/iframe/html/body/iframe/html/body/a");
        assert_eq!(
            target.steps,
            vec![
                PathStep::Frame("/html/body/iframe".to_string()),
                PathStep::Frame("/html/body/iframe".to_string()),
            ]
        );
        assert_eq!(target.local, "/html/body/a");
    }

    #[test]
    fn test_parse_shadow_boundary() {
        let target = XpathTarget::parse("/html/body/my-widget//button");
        assert_eq!(
            target.steps,
            vec![PathStep::ShadowHost("/html/body/my-widget".to_string())]
        );
        assert_eq!(target.local, "button");
    }

    #[test]
    fn test_parse_shadow_inside_iframe() {
        let target = XpathTarget::parse("/html/body/iframe/html/body/x-panel//div[2]/button");
        assert_eq!(
            target.steps,
            vec![
                PathStep::Frame("/html/body/iframe".to_string()),
                PathStep::ShadowHost("/html/body/x-panel".to_string()),
            ]
        );
        assert_eq!(target.local, "div[2]/button");
    }
}
