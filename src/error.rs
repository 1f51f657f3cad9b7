use thiserror::Error;

/// Errors that can occur during web automation
#[derive(Debug, Error)]
pub enum WebpilotError {
    /// Failed to launch the browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Failed to connect to an existing browser
    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    /// A driver-level operation failed (navigation, script evaluation, tabs)
    #[error("Driver error: {0}")]
    DriverError(String),

    /// An xpath resolved to nothing in the live DOM
    #[error("No element found for xpath: {0}")]
    NoElement(String),

    /// An xpath matched multiple elements where exactly one was expected
    #[error("Ambiguous xpath, multiple elements matched: {0}")]
    Ambiguous(String),

    /// The model referenced an xpath that was never offered in its context
    #[error("Hallucinated xpath, not part of the provided context: {0}")]
    Hallucinated(String),

    /// The xpath exists in the DOM but was not among the retrieved set
    #[error("Element exists but is outside the retrieved context: {0}")]
    ElementOutOfContext(String),

    /// History root reached, cannot navigate back
    #[error("History root reached, cannot go back")]
    CannotBack,

    /// No page is loaded yet
    #[error("No page loaded")]
    NoPage,

    /// Failed to parse the DOM snapshot returned by the extraction script
    #[error("Failed to parse DOM snapshot: {0}")]
    DomParseFailed(String),

    /// The model response did not contain the expected fenced block
    #[error("Failed to extract {kind} block from model response")]
    ExtractionFailed {
        /// Fence type that was expected (yaml, json)
        kind: String,
    },

    /// A parsed action could not be interpreted as a structured command
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// The language model call failed or returned an unusable response
    #[error("Model error: {0}")]
    ModelError(String),

    /// Serialization or deserialization of a trajectory failed
    #[error("Trajectory serialization failed: {0}")]
    SerializationFailed(String),

    /// The run was interrupted by an external stop signal
    #[error("Run cancelled by stop signal")]
    Cancelled,
}

/// Result type alias using [`WebpilotError`]
pub type Result<T> = std::result::Result<T, WebpilotError>;

impl From<serde_json::Error> for WebpilotError {
    fn from(e: serde_json::Error) -> Self {
        WebpilotError::SerializationFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WebpilotError::NoElement("/html/body/div".to_string());
        assert!(err.to_string().contains("/html/body/div"));

        let err = WebpilotError::ExtractionFailed {
            kind: "yaml".to_string(),
        };
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn test_cannot_back_message() {
        let err = WebpilotError::CannotBack;
        assert_eq!(err.to_string(), "History root reached, cannot go back");
    }
}
