use crate::error::{Result, WebpilotError};
use crate::trajectory::NavigationOutput;
use regex::Regex;

/// Strategies for pulling the structured payload out of a model response.
///
/// Closed set: extraction is always "first fenced block of the expected
/// kind"; a missing block is an error the caller retries on, never a reason
/// to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// First ```yaml fenced block
    YamlBlock,
    /// First ```json fenced block
    JsonBlock,
    /// Yaml block, then json block, then any fenced block
    Dynamic,
}

fn first_fenced(text: &str, tag: &str) -> Option<String> {
    // Fence tags are fixed strings, the pattern always compiles
    let pattern = format!(r"(?s)```{}\s*\n(.*?)```", tag);
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Extractor {
    /// Extract the payload, or `None` when the expected block is absent
    pub fn extract(&self, text: &str) -> Option<String> {
        match self {
            Extractor::YamlBlock => first_fenced(text, "yaml"),
            Extractor::JsonBlock => first_fenced(text, "json"),
            Extractor::Dynamic => first_fenced(text, "yaml")
                .or_else(|| first_fenced(text, "json"))
                .or_else(|| first_fenced(text, "")),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Extractor::YamlBlock => "yaml",
            Extractor::JsonBlock => "json",
            Extractor::Dynamic => "fenced",
        }
    }

    /// Extract and parse a list of navigation outputs.
    ///
    /// Yaml parsing covers the json case too, json being a yaml subset.
    pub fn parse_navigation(&self, text: &str) -> Result<Vec<NavigationOutput>> {
        let payload = self.extract(text).ok_or_else(|| WebpilotError::ExtractionFailed {
            kind: self.kind().to_string(),
        })?;
        let outputs: Vec<NavigationOutput> = serde_yaml::from_str(&payload)
            .map_err(|e| WebpilotError::InvalidAction(e.to_string()))?;
        for output in &outputs {
            output.validate()?;
        }
        Ok(outputs)
    }
}
