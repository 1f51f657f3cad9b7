use crate::error::{Result, WebpilotError};
use crate::llm::MultiModalModel;
use regex::Regex;

const PLANNING_PROMPT: &str = r#"You are planning the next step of a web automation run.

Objective: {objective}

Current state:
{current_state}

Previous instructions:
{previous_instructions}

Engine used in the previous step:
{last_engine}

Open tabs:
{tabs}

A screenshot of the current page follows this text.

Decide the single next step. Reply in exactly this format:

Thoughts: <your reasoning>
Next engine: <one of NAVIGATION_ENGINE, EXTRACTION_ENGINE, NAVIGATION_CONTROLS, STOP>
Instruction: <the instruction for that engine, or [NONE] for STOP>

NAVIGATION_ENGINE interacts with page elements from a natural-language
instruction. EXTRACTION_ENGINE answers a question from the page content.
NAVIGATION_CONTROLS takes one keyword: SCROLL_DOWN, SCROLL_UP, WAIT, BACK
or SWITCH_TAB <id>. STOP means the objective is achieved."#;

/// The closed set of engines a plan can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Navigation,
    Extraction,
    Controls,
    Stop,
}

impl EngineKind {
    fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "NAVIGATION_ENGINE" => Some(EngineKind::Navigation),
            "EXTRACTION_ENGINE" => Some(EngineKind::Extraction),
            "NAVIGATION_CONTROLS" => Some(EngineKind::Controls),
            "STOP" => Some(EngineKind::Stop),
            _ => None,
        }
    }
}

/// One planning decision
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub engine: EngineKind,
    pub instruction: String,
}

/// Pull the routed engine out of a planner response
pub fn extract_next_engine(response: &str) -> Option<EngineKind> {
    let re = Regex::new(r"(?m)^Next engine:\s*(.+)$").ok()?;
    let name = re.captures(response)?.get(1)?.as_str();
    EngineKind::parse(name)
}

/// Pull the instruction line out of a planner response
pub fn extract_instruction(response: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^Instruction:\s*(.+)$").ok()?;
    Some(re.captures(response)?.get(1)?.as_str().trim().to_string())
}

/// Vision-capable planner: objective plus memory plus screenshot in, one
/// routed instruction out
pub struct WorldModel<'a> {
    model: &'a dyn MultiModalModel,
}

impl<'a> WorldModel<'a> {
    pub fn new(model: &'a dyn MultiModalModel) -> Self {
        Self { model }
    }

    pub fn plan(
        &self,
        objective: &str,
        current_state: &str,
        previous_instructions: &str,
        last_engine: &str,
        tabs: &str,
        screenshots: &[Vec<u8>],
    ) -> Result<Plan> {
        let prompt = PLANNING_PROMPT
            .replace("{objective}", objective)
            .replace("{current_state}", current_state)
            .replace("{previous_instructions}", previous_instructions)
            .replace("{last_engine}", last_engine)
            .replace("{tabs}", tabs);
        let response = self.model.complete_with_images(&prompt, screenshots)?;

        let engine = extract_next_engine(&response).ok_or_else(|| {
            WebpilotError::ModelError(format!(
                "planner response routed to no known engine: {response:?}"
            ))
        })?;
        let instruction = extract_instruction(&response).unwrap_or_default();
        if engine != EngineKind::Stop && (instruction.is_empty() || instruction == "[NONE]") {
            return Err(WebpilotError::ModelError(
                "planner response carried no instruction".to_string(),
            ));
        }
        Ok(Plan {
            engine,
            instruction,
        })
    }
}
