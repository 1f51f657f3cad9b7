//! Action resolution engines.
//!
//! [`NavigationEngine`] turns natural-language instructions into executed
//! element actions, [`NavigationControls`] handles deterministic keyword
//! commands, and [`ExtractionEngine`] answers questions from page content.

pub mod controls;
pub mod extraction;
pub mod extractor;
pub mod navigation;

pub use controls::NavigationControls;
pub use extraction::ExtractionEngine;
pub use extractor::Extractor;
pub use navigation::{NavigationEngine, Rephraser};

use crate::trajectory::ActionOutput;

/// Outcome of one engine invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResult {
    /// Whether the instruction was carried out
    pub success: bool,
    /// Structured outputs produced by the instruction
    pub outputs: Vec<ActionOutput>,
}

impl EngineResult {
    pub fn success(outputs: Vec<ActionOutput>) -> Self {
        Self {
            success: true,
            outputs,
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            outputs: Vec::new(),
        }
    }
}
