//! Result and error types for the acceptance harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for harness operations
pub type AcceptanceResult<T> = Result<T, AcceptanceError>;

/// Errors that can occur while driving a run
#[derive(Debug, Error)]
pub enum AcceptanceError {
    /// Configuration could not be loaded (callers fall back to defaults)
    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoad {
        /// File that was being read
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Browser driver could not be started
    #[error("Failed to initialize browser session: {message}")]
    SessionInit {
        /// Error message
        message: String,
    },

    /// A step raised while executing against the page
    #[error("Step '{step}' failed: {message}")]
    StepExecution {
        /// Step text
        step: String,
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot capture failed: {message}")]
    EvidenceCapture {
        /// Error message
        message: String,
    },

    /// Orchestration collaborator is unreachable
    #[error("Orchestration collaborator unavailable: {message}")]
    OrchestrationUnavailable {
        /// Error message
        message: String,
    },

    /// A report artifact could not be written
    #[error("Failed to write report {path}: {message}")]
    ReportWrite {
        /// Artifact path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Page or element interaction error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Invalid state error (hook called in the wrong phase, nested event loop)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcceptanceError {
    /// Create a session initialization error
    #[must_use]
    pub fn session_init(message: impl Into<String>) -> Self {
        Self::SessionInit {
            message: message.into(),
        }
    }

    /// Create a step execution error
    #[must_use]
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepExecution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an orchestration-unavailable error
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::OrchestrationUnavailable {
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole run rather than one scenario
    #[must_use]
    pub const fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::SessionInit { .. })
    }

    /// Whether this error is always recovered where it occurs
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::EvidenceCapture { .. }
                | Self::OrchestrationUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_init_is_fatal() {
        let err = AcceptanceError::session_init("chromium not found");
        assert!(err.is_fatal_to_run());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("chromium not found"));
    }

    #[test]
    fn test_step_error_is_scenario_scoped() {
        let err = AcceptanceError::StepExecution {
            step: "verify results".to_string(),
            message: "no results".to_string(),
        };
        assert!(!err.is_fatal_to_run());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("verify results"));
    }

    #[test]
    fn test_recoverable_variants() {
        assert!(AcceptanceError::unavailable("down").is_recoverable());
        assert!(AcceptanceError::EvidenceCapture {
            message: "no page".to_string()
        }
        .is_recoverable());
        assert!(AcceptanceError::ConfigLoad {
            path: PathBuf::from("dev.json"),
            message: "bad json".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AcceptanceError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }

    #[test]
    fn test_timeout_message() {
        let err = AcceptanceError::Timeout { ms: 1500 };
        assert_eq!(err.to_string(), "Operation timed out after 1500ms");
    }
}
