use crate::dom::ScrollDirection;
use crate::driver::Driver;
use crate::engine::EngineResult;
use crate::error::{Result, WebpilotError};
use crate::trajectory::{ActionOutput, NavigationOutput};
use std::time::Duration;

/// How long a WAIT instruction pauses
const WAIT_DURATION: Duration = Duration::from_secs(2);
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Keyword engine for deterministic browser controls.
///
/// Planners emit these as plain instructions (`SCROLL_DOWN`, `BACK`,
/// `SWITCH_TAB 2`, ...) when no element targeting is needed; each maps to
/// exactly one structured action.
pub struct NavigationControls<'a> {
    driver: &'a dyn Driver,
}

impl<'a> NavigationControls<'a> {
    pub fn new(driver: &'a dyn Driver) -> Self {
        Self { driver }
    }

    /// Whether an instruction is a control keyword
    pub fn handles(instruction: &str) -> bool {
        let trimmed = instruction.trim();
        let keyword = trimmed.split_whitespace().next().unwrap_or_default();
        matches!(
            keyword,
            "SCROLL_DOWN" | "SCROLL_UP" | "WAIT" | "BACK" | "SWITCH_TAB"
        )
    }

    /// Execute one control instruction
    pub fn execute_instruction(&self, instruction: &str) -> Result<EngineResult> {
        let trimmed = instruction.trim();
        let mut parts = trimmed.split_whitespace();
        let keyword = parts.next().unwrap_or_default();
        let action = match keyword {
            "SCROLL_DOWN" => NavigationOutput::scroll(None, ScrollDirection::Down),
            "SCROLL_UP" => NavigationOutput::scroll(None, ScrollDirection::Up),
            "BACK" => NavigationOutput::back(),
            "WAIT" => {
                std::thread::sleep(WAIT_DURATION);
                self.driver.wait_for_idle(IDLE_TIMEOUT)?;
                NavigationOutput::pass()
            }
            "SWITCH_TAB" => {
                let tab_id = parts.next().ok_or_else(|| {
                    WebpilotError::InvalidAction("SWITCH_TAB needs a tab id".to_string())
                })?;
                NavigationOutput::switch_tab(tab_id)
            }
            other => {
                return Err(WebpilotError::InvalidAction(format!(
                    "unknown control keyword: {other}"
                )))
            }
        };
        self.driver.execute(&action)?;
        Ok(EngineResult::success(vec![ActionOutput::WebNavigation(
            action,
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomSnapshot, ElementNode};
    use crate::driver::MockDriver;
    use crate::trajectory::NavigationCommand;

    fn driver() -> MockDriver {
        MockDriver::new(DomSnapshot::new(
            ElementNode::new("html")
                .with_children(vec![ElementNode::new("body").with_children(vec![])]),
        ))
    }

    #[test]
    fn test_handles_keywords() {
        assert!(NavigationControls::handles("SCROLL_DOWN"));
        assert!(NavigationControls::handles("  SWITCH_TAB 2 "));
        assert!(!NavigationControls::handles("Click the button"));
    }

    #[test]
    fn test_scroll_down() {
        let driver = driver();
        let result = NavigationControls::new(&driver)
            .execute_instruction("SCROLL_DOWN")
            .unwrap();
        assert!(result.success);
        let executed = driver.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].navigation_command, NavigationCommand::Scroll);
        assert_eq!(executed[0].value.as_deref(), Some("DOWN"));
    }

    #[test]
    fn test_back_at_root_propagates() {
        let driver = driver();
        let result = NavigationControls::new(&driver).execute_instruction("BACK");
        assert!(matches!(result, Err(WebpilotError::CannotBack)));
    }

    #[test]
    fn test_switch_tab_requires_id() {
        let driver = driver();
        let result = NavigationControls::new(&driver).execute_instruction("SWITCH_TAB");
        assert!(matches!(result, Err(WebpilotError::InvalidAction(_))));
    }

    #[test]
    fn test_unknown_keyword() {
        let driver = driver();
        let result = NavigationControls::new(&driver).execute_instruction("MAXIMIZE");
        assert!(matches!(result, Err(WebpilotError::InvalidAction(_))));
    }
}
