//! Error types for mask authoring and remote inpainting

use crate::workflow::WorkflowStage;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for inpainting operations
pub type Result<T> = std::result::Result<T, InpaintError>;

/// Error kinds surfaced by the authoring core and the remote client
#[derive(Error, Debug)]
pub enum InpaintError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input is not a valid or loadable image
    #[error("Failed to load image: {0}")]
    Decode(String),

    /// An operation that needs an image and a mask ran without both
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The requested action is not legal from the current stage
    #[error("Cannot {action} while in the {from} stage")]
    InvalidTransition {
        from: WorkflowStage,
        action: &'static str,
    },

    /// Leaving the mark stage was attempted without any marked pixel
    #[error("No area has been marked for removal")]
    EmptyMask,

    /// Remote transport failure, bad status or malformed response
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Remote request did not complete in time
    #[error("Submission timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InpaintError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new precondition error
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a new submission error
    pub fn submission<S: Into<String>>(msg: S) -> Self {
        Self::Submission(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid transition error
    #[must_use]
    pub fn invalid_transition(from: WorkflowStage, action: &'static str) -> Self {
        Self::InvalidTransition { from, action }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create a network error from a transport failure, keeping timeouts distinct
    pub fn network_error<S: Into<String>>(context: S, error: &reqwest::Error) -> Self {
        Self::Submission(format!("{}: {}", context.into(), error))
    }

    /// Whether the error should be shown as a local notice and the session kept alive
    #[must_use]
    pub fn is_user_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// Whether this error is a remote submission failure (transport or timeout)
    #[must_use]
    pub fn is_submission_failure(&self) -> bool {
        matches!(self, Self::Submission(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = InpaintError::invalid_config("test config error");
        assert!(matches!(err, InpaintError::InvalidConfig(_)));

        let err = InpaintError::decode("not an image");
        assert!(matches!(err, InpaintError::Decode(_)));

        let err = InpaintError::precondition("mask missing");
        assert!(matches!(err, InpaintError::Precondition(_)));
    }

    #[test]
    fn test_error_display() {
        let err = InpaintError::invalid_config("Invalid base URL");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid base URL");

        let err = InpaintError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Submission timed out after 30s");

        let err = InpaintError::invalid_transition(WorkflowStage::Upload, "continue to settings");
        assert_eq!(
            err.to_string(),
            "Cannot continue to settings while in the Upload stage"
        );
    }

    #[test]
    fn test_contextual_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = InpaintError::file_io_error("write mask", Path::new("/tmp/mask.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write mask"));
        assert!(error_string.contains("/tmp/mask.png"));

        let err = InpaintError::config_value_error("iterations", 9, "1-5", Some(2));
        let error_string = err.to_string();
        assert!(error_string.contains("iterations"));
        assert!(error_string.contains('9'));
        assert!(error_string.contains("1-5"));
        assert!(error_string.contains("Recommended: 2"));
    }

    #[test]
    fn test_recoverability() {
        assert!(InpaintError::EmptyMask.is_user_recoverable());
        assert!(InpaintError::submission("502").is_user_recoverable());
        assert!(!InpaintError::internal("poisoned").is_user_recoverable());

        assert!(InpaintError::Timeout(Duration::from_secs(1)).is_submission_failure());
        assert!(!InpaintError::decode("bad").is_submission_failure());
    }
}
