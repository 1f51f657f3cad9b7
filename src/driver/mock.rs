//! Scripted driver for offline tests.
//!
//! Pages are [`DomSnapshot`]s built with the element builders; executed
//! actions are recorded for assertions and element actions advance to the
//! next queued page, which is enough to script multi-step scenarios without
//! a browser.

use crate::dom::{DomSnapshot, ScrollDirection};
use crate::driver::Driver;
use crate::error::{Result, WebpilotError};
use crate::trajectory::{NavigationCommand, NavigationOutput};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

/// 1x1 transparent PNG, stands in for real screenshots
const PNG_STUB: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub struct MockDriver {
    current: RefCell<DomSnapshot>,
    queued: RefCell<VecDeque<DomSnapshot>>,
    read_queue: RefCell<VecDeque<DomSnapshot>>,
    url: RefCell<String>,
    history: RefCell<Vec<String>>,
    tabs: RefCell<Vec<(String, String)>>,
    executed: RefCell<Vec<NavigationOutput>>,
    focus_stack: RefCell<Vec<String>>,
    idle_waits: RefCell<usize>,
}

impl MockDriver {
    pub fn new(snapshot: DomSnapshot) -> Self {
        Self {
            current: RefCell::new(snapshot),
            queued: RefCell::new(VecDeque::new()),
            read_queue: RefCell::new(VecDeque::new()),
            url: RefCell::new("https://example.com/".to_string()),
            history: RefCell::new(vec!["https://example.com/".to_string()]),
            tabs: RefCell::new(vec![(
                "Example".to_string(),
                "https://example.com/".to_string(),
            )]),
            executed: RefCell::new(Vec::new()),
            focus_stack: RefCell::new(Vec::new()),
            idle_waits: RefCell::new(0),
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        let url = url.into();
        *self.url.borrow_mut() = url.clone();
        *self.history.borrow_mut() = vec![url];
        self
    }

    /// Queue the page that element actions advance to
    pub fn queue_snapshot(&self, snapshot: DomSnapshot) {
        self.queued.borrow_mut().push_back(snapshot);
    }

    /// Replace the current page outright
    pub fn set_snapshot(&self, snapshot: DomSnapshot) {
        *self.current.borrow_mut() = snapshot;
    }

    /// Script the page to change on a later `snapshot()` read: each queued
    /// entry becomes current when its read happens, simulating a page that
    /// mutates while the caller works
    pub fn queue_snapshot_for_read(&self, snapshot: DomSnapshot) {
        self.read_queue.borrow_mut().push_back(snapshot);
    }

    /// Actions executed so far, in order
    pub fn executed(&self) -> Vec<NavigationOutput> {
        self.executed.borrow().clone()
    }

    /// Number of idle waits the caller requested
    pub fn idle_waits(&self) -> usize {
        *self.idle_waits.borrow()
    }

    fn require_element(&self, xpath: &str) -> Result<()> {
        self.current.borrow().resolve(xpath)?;
        Ok(())
    }

    fn record(&self, action: NavigationOutput) {
        self.executed.borrow_mut().push(action);
    }

    /// Element actions move to the next queued page, when one is scripted
    fn advance_page(&self) {
        if let Some(next) = self.queued.borrow_mut().pop_front() {
            *self.current.borrow_mut() = next;
        }
    }
}

impl Driver for MockDriver {
    fn get_url(&self) -> Result<String> {
        let url = self.url.borrow().clone();
        if url.is_empty() {
            return Err(WebpilotError::NoPage);
        }
        Ok(url)
    }

    fn goto(&self, url: &str) -> Result<()> {
        *self.url.borrow_mut() = url.to_string();
        self.history.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn back(&self) -> Result<()> {
        let mut history = self.history.borrow_mut();
        if history.len() <= 1 {
            return Err(WebpilotError::CannotBack);
        }
        history.pop();
        if let Some(previous) = history.last() {
            *self.url.borrow_mut() = previous.clone();
        }
        Ok(())
    }

    fn get_tabs(&self) -> Result<String> {
        let lines: Vec<String> = self
            .tabs
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, (title, url))| format!("{} - {} - {}", i, title, url))
            .collect();
        Ok(lines.join("\n"))
    }

    fn switch_tab(&self, tab_id: &str) -> Result<()> {
        let index: usize = tab_id
            .trim()
            .parse()
            .map_err(|_| WebpilotError::DriverError(format!("Invalid tab id: {}", tab_id)))?;
        let tabs = self.tabs.borrow();
        let (_, url) = tabs
            .get(index)
            .ok_or_else(|| WebpilotError::DriverError(format!("No tab with id {}", tab_id)))?;
        *self.url.borrow_mut() = url.clone();
        Ok(())
    }

    fn snapshot(&self) -> Result<DomSnapshot> {
        if let Some(next) = self.read_queue.borrow_mut().pop_front() {
            *self.current.borrow_mut() = next;
        }
        Ok(self.current.borrow().clone())
    }

    fn enter_frame(&self, frame_xpath: &str) -> Result<()> {
        self.require_element(frame_xpath)?;
        self.focus_stack.borrow_mut().push(frame_xpath.to_string());
        Ok(())
    }

    fn enter_shadow(&self, host_xpath: &str) -> Result<()> {
        self.require_element(host_xpath)?;
        self.focus_stack.borrow_mut().push(host_xpath.to_string());
        Ok(())
    }

    fn restore_root(&self) -> Result<()> {
        self.focus_stack.borrow_mut().clear();
        Ok(())
    }

    fn focus_depth(&self) -> usize {
        self.focus_stack.borrow().len()
    }

    fn click(&self, xpath: &str) -> Result<()> {
        self.require_element(xpath)?;
        self.record(NavigationOutput::click(xpath));
        self.advance_page();
        Ok(())
    }

    fn hover(&self, xpath: &str) -> Result<()> {
        self.require_element(xpath)?;
        self.record(NavigationOutput::hover(xpath));
        Ok(())
    }

    fn set_value(&self, xpath: &str, value: &str, enter: bool) -> Result<()> {
        self.require_element(xpath)?;
        let action = if enter {
            NavigationOutput::set_value_and_enter(xpath, value)
        } else {
            NavigationOutput::set_value(xpath, value)
        };
        self.record(action);
        if enter {
            self.advance_page();
        }
        Ok(())
    }

    fn type_key(&self, key: &str) -> Result<()> {
        self.record(NavigationOutput::type_key(key));
        Ok(())
    }

    fn scroll(&self, xpath: Option<&str>, direction: ScrollDirection) -> Result<()> {
        if let Some(xpath) = xpath {
            self.require_element(xpath)?;
        }
        self.record(NavigationOutput::scroll(
            xpath.map(str::to_string),
            direction,
        ));
        Ok(())
    }

    fn wait_for_idle(&self, _timeout: Duration) -> Result<()> {
        *self.idle_waits.borrow_mut() += 1;
        Ok(())
    }

    fn get_screenshot_as_png(&self) -> Result<Vec<u8>> {
        Ok(PNG_STUB.to_vec())
    }

    fn execute_script(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn execute(&self, action: &NavigationOutput) -> Result<()> {
        action.validate()?;
        match action.navigation_command {
            NavigationCommand::Back => {
                self.back()?;
                self.record(action.clone());
                Ok(())
            }
            NavigationCommand::Pass => {
                self.record(action.clone());
                Ok(())
            }
            _ => {
                // Delegate to the primitives so existence checks and page
                // advancement apply exactly as for direct calls
                let xpath = action.xpath.as_deref();
                let value = action.value.as_deref();
                match action.navigation_command {
                    NavigationCommand::Click => self.click(xpath.unwrap_or_default()),
                    NavigationCommand::SetValue => {
                        self.set_value(xpath.unwrap_or_default(), value.unwrap_or_default(), false)
                    }
                    NavigationCommand::SetValueAndEnter => {
                        self.set_value(xpath.unwrap_or_default(), value.unwrap_or_default(), true)
                    }
                    NavigationCommand::TypeKey => self.type_key(value.unwrap_or_default()),
                    NavigationCommand::Hover => self.hover(xpath.unwrap_or_default()),
                    NavigationCommand::Scroll => {
                        let direction = action.scroll_direction().ok_or_else(|| {
                            WebpilotError::InvalidAction("scroll without direction".to_string())
                        })?;
                        self.scroll(xpath, direction)
                    }
                    NavigationCommand::SwitchTab => {
                        self.switch_tab(value.unwrap_or_default())?;
                        self.record(action.clone());
                        Ok(())
                    }
                    NavigationCommand::Back | NavigationCommand::Pass => unreachable!(),
                }
            }
        }
    }
}
