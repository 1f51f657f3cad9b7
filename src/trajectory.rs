//! Structured action and trajectory records.
//!
//! Every browser-facing action is data: a [`NavigationCommand`] plus its
//! arguments. Nothing in a trajectory is executable, which is what makes
//! replay and export safe.

use crate::dom::ScrollDirection;
use crate::error::{Result, WebpilotError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// The closed set of browser commands an action can carry.
///
/// Dispatch is an exhaustive match in the driver; adding a command is a
/// compile-visible change, not a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationCommand {
    Click,
    SetValue,
    SetValueAndEnter,
    TypeKey,
    Hover,
    Scroll,
    Back,
    SwitchTab,
    Pass,
}

impl NavigationCommand {
    /// Whether this command must carry a target xpath
    pub fn requires_xpath(&self) -> bool {
        matches!(
            self,
            NavigationCommand::Click
                | NavigationCommand::SetValue
                | NavigationCommand::SetValueAndEnter
                | NavigationCommand::Hover
        )
    }

    /// Whether this command must carry a value argument
    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            NavigationCommand::SetValue
                | NavigationCommand::SetValueAndEnter
                | NavigationCommand::TypeKey
                | NavigationCommand::Scroll
                | NavigationCommand::SwitchTab
        )
    }
}

/// One executable navigation step: command plus arguments.
///
/// For `Scroll` the value holds the direction (`UP`/`DOWN`/`LEFT`/`RIGHT`)
/// and the xpath, when present, names the element whose scrollable ancestor
/// should move. For `SwitchTab` the value holds the tab id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationOutput {
    pub navigation_command: NavigationCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl NavigationOutput {
    pub fn new(
        navigation_command: NavigationCommand,
        xpath: Option<String>,
        value: Option<String>,
    ) -> Self {
        Self {
            navigation_command,
            xpath,
            value,
        }
    }

    pub fn click(xpath: impl Into<String>) -> Self {
        Self::new(NavigationCommand::Click, Some(xpath.into()), None)
    }

    pub fn set_value(xpath: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            NavigationCommand::SetValue,
            Some(xpath.into()),
            Some(value.into()),
        )
    }

    pub fn set_value_and_enter(xpath: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            NavigationCommand::SetValueAndEnter,
            Some(xpath.into()),
            Some(value.into()),
        )
    }

    pub fn type_key(key: impl Into<String>) -> Self {
        Self::new(NavigationCommand::TypeKey, None, Some(key.into()))
    }

    pub fn hover(xpath: impl Into<String>) -> Self {
        Self::new(NavigationCommand::Hover, Some(xpath.into()), None)
    }

    pub fn scroll(xpath: Option<String>, direction: ScrollDirection) -> Self {
        let value = serde_json::to_string(&direction)
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        Self::new(NavigationCommand::Scroll, xpath, Some(value))
    }

    pub fn back() -> Self {
        Self::new(NavigationCommand::Back, None, None)
    }

    pub fn switch_tab(tab_id: impl Into<String>) -> Self {
        Self::new(NavigationCommand::SwitchTab, None, Some(tab_id.into()))
    }

    pub fn pass() -> Self {
        Self::new(NavigationCommand::Pass, None, None)
    }

    /// Parsed scroll direction, for `Scroll` commands
    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.value.as_deref().and_then(ScrollDirection::from_value)
    }

    /// Check the command carries the arguments it needs
    pub fn validate(&self) -> Result<()> {
        if self.navigation_command.requires_xpath() && self.xpath.is_none() {
            return Err(WebpilotError::InvalidAction(format!(
                "{:?} requires an xpath",
                self.navigation_command
            )));
        }
        if self.navigation_command.requires_value() && self.value.is_none() {
            return Err(WebpilotError::InvalidAction(format!(
                "{:?} requires a value",
                self.navigation_command
            )));
        }
        if self.navigation_command == NavigationCommand::Scroll && self.scroll_direction().is_none()
        {
            return Err(WebpilotError::InvalidAction(
                "scroll requires a direction value (UP/DOWN/LEFT/RIGHT)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output of an extraction step: named piece of page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub name: String,
    pub text: String,
}

/// Polymorphic step output, tagged for stable round-tripping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionOutput {
    WebNavigation(NavigationOutput),
    WebExtraction(ExtractionOutput),
}

/// Outcome of one agent step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Completed,
    Failed,
}

/// One recorded step: the instruction, where it ran, what it produced.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub step_id: Uuid,
    pub instruction: String,
    pub url: String,
    pub action_output: Vec<ActionOutput>,
    pub status: ActionStatus,
}

impl Action {
    pub fn new(
        instruction: impl Into<String>,
        url: impl Into<String>,
        action_output: Vec<ActionOutput>,
        status: ActionStatus,
    ) -> Self {
        Self {
            step_id: Uuid::new_v4(),
            instruction: instruction.into(),
            url: url.into(),
            action_output,
            status,
        }
    }
}

/// Lifecycle status of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Starting,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Append-only record of one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub run_id: Uuid,
    pub start_url: String,
    pub objective: String,
    pub status: RunStatus,
    pub actions: Vec<Action>,
}

impl Trajectory {
    pub fn new(start_url: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            start_url: start_url.into(),
            objective: objective.into(),
            status: RunStatus::Starting,
            actions: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
    }

    pub fn add_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
    }

    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
    }

    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
    }

    /// All navigation outputs across the run, in order
    pub fn navigation_outputs(&self) -> Vec<&NavigationOutput> {
        self.actions
            .iter()
            .flat_map(|a| &a.action_output)
            .filter_map(|o| match o {
                ActionOutput::WebNavigation(nav) => Some(nav),
                ActionOutput::WebExtraction(_) => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| WebpilotError::SerializationFailed(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            fs::read_to_string(path).map_err(|e| WebpilotError::SerializationFailed(e.to_string()))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_output_serde() {
        let out = NavigationOutput::set_value("/html/body/input", "rust");
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"navigation_command\":\"set_value\""));
        let back: NavigationOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(out, back);
    }

    #[test]
    fn test_action_output_tagging() {
        let out = ActionOutput::WebNavigation(NavigationOutput::click("/html/body/a"));
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"action_type\":\"web_navigation\""));
        let back: ActionOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(out, back);
    }

    #[test]
    fn test_validate_missing_xpath() {
        let out = NavigationOutput::new(NavigationCommand::Click, None, None);
        assert!(matches!(
            out.validate(),
            Err(WebpilotError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_validate_scroll_direction() {
        let out = NavigationOutput::scroll(None, ScrollDirection::Down);
        assert_eq!(out.value.as_deref(), Some("DOWN"));
        assert!(out.validate().is_ok());
        assert_eq!(out.scroll_direction(), Some(ScrollDirection::Down));

        let bad = NavigationOutput::new(
            NavigationCommand::Scroll,
            None,
            Some("sideways".to_string()),
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_pass_is_valid_without_arguments() {
        assert!(NavigationOutput::pass().validate().is_ok());
    }

    #[test]
    fn test_trajectory_lifecycle() {
        let mut traj = Trajectory::new("https://example.com", "find the docs");
        assert_eq!(traj.status, RunStatus::Starting);
        traj.start();
        traj.add_action(Action::new(
            "Click the docs link",
            "https://example.com",
            vec![ActionOutput::WebNavigation(NavigationOutput::click(
                "/html/body/a",
            ))],
            ActionStatus::Completed,
        ));
        traj.complete();
        assert_eq!(traj.status, RunStatus::Completed);
        assert_eq!(traj.navigation_outputs().len(), 1);
    }

    #[test]
    fn test_trajectory_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut traj = Trajectory::new("https://example.com", "objective");
        traj.cancel();
        traj.write_to_file(&path).unwrap();
        let back = Trajectory::from_file(&path).unwrap();
        assert_eq!(traj, back);
    }

    #[test]
    fn test_run_status_serialization() {
        let json = serde_json::to_string(&RunStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }
}
