//! Language-model collaborators.
//!
//! Engines depend on these small traits, never on a concrete provider;
//! [`openai::OpenAiCompatible`] covers any chat-completions-style endpoint
//! and [`StaticModel`] scripts responses for offline tests.

pub mod openai;

pub use openai::OpenAiCompatible;

use crate::error::{Result, WebpilotError};
use std::cell::RefCell;
use std::collections::VecDeque;

/// Text-completion model
pub trait LanguageModel {
    /// Complete a prompt into a single response string
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Streamed completion; the default wraps [`complete`](Self::complete)
    /// in a one-shot iterator so providers without streaming still conform
    fn complete_stream(&self, prompt: &str) -> Result<Box<dyn Iterator<Item = Result<String>>>> {
        let full = self.complete(prompt)?;
        Ok(Box::new(std::iter::once(Ok(full))))
    }
}

/// Vision-capable model taking PNG images alongside the prompt
pub trait MultiModalModel {
    fn complete_with_images(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String>;
}

/// Text embedding model
pub trait Embedder {
    /// Embed each input text into a dense vector; output order matches input
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Scripted model for tests: returns queued responses in order and records
/// every prompt it saw
#[derive(Default)]
pub struct StaticModel {
    responses: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl StaticModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().map(String::from).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    fn next_response(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| WebpilotError::ModelError("no scripted response left".to_string()))
    }
}

impl LanguageModel for StaticModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.next_response(prompt)
    }
}

impl MultiModalModel for StaticModel {
    fn complete_with_images(&self, prompt: &str, _images: &[Vec<u8>]) -> Result<String> {
        self.next_response(prompt)
    }
}
