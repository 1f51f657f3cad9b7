use crate::trajectory::ActionOutput;
use serde::Serialize;

/// Marker shown to the planner while no instruction has run yet
const NONE_MARKER: &str = "[NONE]";

/// Prefix recorded on instructions that failed, so the planner can route
/// around them instead of repeating them
const FAILED_PREFIX: &str = "[FAILED] ";

/// What the agent currently knows, rendered into the planner prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct CurrentState {
    pub external_observations: ExternalObservations,
    pub internal_state: InternalState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalObservations {
    /// Placeholder telling the planner where the screenshot lives in the
    /// multimodal prompt
    pub vision: String,
}

impl Default for ExternalObservations {
    fn default() -> Self {
        Self {
            vision: "[SCREENSHOT]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InternalState {
    /// Data the caller provided for the run (credentials, form values)
    pub user_inputs: Vec<String>,
    /// Extraction results produced so far
    pub agent_outputs: Vec<String>,
}

/// Per-run working memory for the planning loop
#[derive(Debug, Clone, Default)]
pub struct ShortTermMemory {
    state: CurrentState,
    previous_instructions: Vec<String>,
    last_engine: Option<String>,
}

impl ShortTermMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything for a fresh run
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Provide caller data the planner may use in instructions
    pub fn add_user_input(&mut self, input: impl Into<String>) {
        self.state.internal_state.user_inputs.push(input.into());
    }

    /// Record an instruction outcome: the instruction log grows either way,
    /// failed ones carry the failure prefix, and extraction outputs land in
    /// agent_outputs
    pub fn update_state(&mut self, instruction: &str, success: bool, outputs: &[ActionOutput]) {
        let entry = if success {
            instruction.to_string()
        } else {
            format!("{FAILED_PREFIX}{instruction}")
        };
        self.previous_instructions.push(entry);
        for output in outputs {
            if let ActionOutput::WebExtraction(extraction) = output {
                self.state
                    .internal_state
                    .agent_outputs
                    .push(extraction.text.clone());
            }
        }
    }

    /// Remember which engine the planner last routed to
    pub fn note_engine(&mut self, engine: impl Into<String>) {
        self.last_engine = Some(engine.into());
    }

    /// Engine of the previous cycle, if any
    pub fn last_engine(&self) -> Option<&str> {
        self.last_engine.as_deref()
    }

    /// Extraction outputs collected so far
    pub fn agent_outputs(&self) -> &[String] {
        &self.state.internal_state.agent_outputs
    }

    /// Yaml rendering of the current state for the planner prompt
    pub fn current_state_summary(&self) -> String {
        serde_yaml::to_string(&self.state).unwrap_or_default()
    }

    /// Bulleted instruction log, `[NONE]` while empty
    pub fn previous_instructions_summary(&self) -> String {
        if self.previous_instructions.is_empty() {
            return NONE_MARKER.to_string();
        }
        self.previous_instructions
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::ExtractionOutput;

    #[test]
    fn test_empty_memory_shows_none() {
        let memory = ShortTermMemory::new();
        assert_eq!(memory.previous_instructions_summary(), "[NONE]");
    }

    #[test]
    fn test_failed_instruction_is_prefixed() {
        let mut memory = ShortTermMemory::new();
        memory.update_state("Click the login button", true, &[]);
        memory.update_state("Fill the captcha", false, &[]);
        let summary = memory.previous_instructions_summary();
        assert_eq!(
            summary,
            "- Click the login button\n- [FAILED] Fill the captcha"
        );
    }

    #[test]
    fn test_extraction_outputs_accumulate() {
        let mut memory = ShortTermMemory::new();
        memory.update_state(
            "Extract the price",
            true,
            &[ActionOutput::WebExtraction(ExtractionOutput {
                name: "Extract the price".to_string(),
                text: "42 EUR".to_string(),
            })],
        );
        assert_eq!(memory.agent_outputs(), &["42 EUR".to_string()]);
        assert!(memory.current_state_summary().contains("42 EUR"));
    }

    #[test]
    fn test_last_engine_tracked() {
        let mut memory = ShortTermMemory::new();
        assert!(memory.last_engine().is_none());
        memory.note_engine("Navigation");
        assert_eq!(memory.last_engine(), Some("Navigation"));
        memory.reset();
        assert!(memory.last_engine().is_none());
    }

    #[test]
    fn test_user_inputs_render_in_state() {
        let mut memory = ShortTermMemory::new();
        memory.add_user_input("username: demo");
        assert!(memory.current_state_summary().contains("username: demo"));
    }
}
