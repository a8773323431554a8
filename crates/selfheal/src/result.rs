//! Result and error types for selfheal.

use thiserror::Error;

/// Result type for selfheal operations
pub type HealResult<T> = Result<T, HealError>;

/// Errors that can occur while recovering UI actions
#[derive(Debug, Error)]
pub enum HealError {
    /// Selector never matched within the retry budget
    #[error("Element {selector} not found after {attempts} attempt(s)")]
    NotFound {
        /// Selector that was queried
        selector: String,
        /// Attempts performed
        attempts: usize,
    },

    /// Retry budget consumed while the action itself kept failing
    #[error("Action on {selector} exhausted {attempts} attempt(s): {reason}")]
    Exhausted {
        /// Selector that was acted on
        selector: String,
        /// Attempts performed
        attempts: usize,
        /// Reason reported by the last attempt
        reason: String,
    },

    /// Recoverable error marker persisted through every submission
    #[error("Submission via {selector} still reported an error after {attempts} attempt(s)")]
    Submission {
        /// Submit control selector
        selector: String,
        /// Submissions performed
        attempts: usize,
    },

    /// Session marker still absent after re-authentication
    #[error("Session not restored: marker {marker} absent after re-authentication")]
    SessionNotRestored {
        /// Session marker selector
        marker: String,
    },

    /// Driver (element locator / interaction) failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario body ran past its deadline
    #[error("Scenario body exceeded its {ms}ms deadline")]
    DeadlineExceeded {
        /// Deadline in milliseconds
        ms: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HealError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = HealError::NotFound {
            selector: "a[href*=\"overview\"]".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Element a[href*=\"overview\"] not found after 3 attempt(s)"
        );
    }

    #[test]
    fn test_submission_message() {
        let err = HealError::Submission {
            selector: "input[type=\"submit\"]".into(),
            attempts: 2,
        };
        assert!(err.to_string().contains("after 2 attempt(s)"));
    }

    #[test]
    fn test_deadline_message() {
        let err = HealError::DeadlineExceeded { ms: 30_000 };
        assert_eq!(err.to_string(), "Scenario body exceeded its 30000ms deadline");
    }

    #[test]
    fn test_driver_message() {
        assert_eq!(
            HealError::driver("socket closed").to_string(),
            "Driver error: socket closed"
        );
    }
}
