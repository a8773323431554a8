//! Recovery configuration.
//!
//! Loaded from YAML; every key is optional and falls back to the defaults
//! below.
//!
//! ```yaml
//! element_retry:
//!   max_attempts: 3
//!   wait_ms: 500
//!   visibility: force
//! submission_retry:
//!   max_attempts: 2
//! session:
//!   marker: a[href*="logout.htm"]
//!   username_field: input[name="username"]
//!   password_field: input[name="password"]
//!   submit: input[value="Log In"]
//! sign_out: a[href*="logout.htm"]
//! error_marker: Error
//! dialogs:
//!   alert: dismiss
//!   confirm: accept
//! ```

use crate::dialog::ResponsePolicy;
use crate::policy::RetryPolicy;
use crate::result::{HealError, HealResult};
use crate::selector::Selector;
use crate::submit::{ErrorMarker, PatternMarker, RecoveryPredicate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default session marker: the sign-out link only exists when logged in
pub const DEFAULT_SESSION_MARKER: &str = "a[href*=\"logout.htm\"]";

/// Default recoverable error marker
pub const DEFAULT_ERROR_MARKER: &str = "Error";

/// Selectors driving the credential-entry sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSelectors {
    /// Presence of this selector means "authenticated"
    pub marker: Selector,
    /// Username input
    pub username_field: Selector,
    /// Password input
    pub password_field: Selector,
    /// Control that submits the credentials
    pub submit: Selector,
}

impl Default for SessionSelectors {
    fn default() -> Self {
        Self {
            marker: Selector::css(DEFAULT_SESSION_MARKER),
            username_field: Selector::css("input[name=\"username\"]"),
            password_field: Selector::css("input[name=\"password\"]"),
            submit: Selector::css("input[value=\"Log In\"]"),
        }
    }
}

/// Every tunable of the recovery layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Policy for element retries
    pub element_retry: RetryPolicy,
    /// Policy for submission retries
    pub submission_retry: RetryPolicy,
    /// Session guard selectors
    pub session: SessionSelectors,
    /// Sign-out affordance used by cleanup
    pub sign_out: Selector,
    /// Substring marking a recoverable submission error
    pub error_marker: String,
    /// Regex marking a recoverable submission error (overrides `error_marker`)
    pub error_pattern: Option<String>,
    /// Dialog response policy
    pub dialogs: ResponsePolicy,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            element_retry: RetryPolicy::element(),
            submission_retry: RetryPolicy::submission(),
            session: SessionSelectors::default(),
            sign_out: Selector::css(DEFAULT_SESSION_MARKER),
            error_marker: DEFAULT_ERROR_MARKER.to_string(),
            error_pattern: None,
            dialogs: ResponsePolicy::default(),
        }
    }
}

impl HealConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> HealResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> HealResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> HealResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check selectors and markers are usable
    pub fn validate(&self) -> HealResult<()> {
        let selectors = [
            ("session.marker", &self.session.marker),
            ("session.username_field", &self.session.username_field),
            ("session.password_field", &self.session.password_field),
            ("session.submit", &self.session.submit),
            ("sign_out", &self.sign_out),
        ];
        for (name, selector) in selectors {
            if selector.is_empty() {
                return Err(HealError::config(format!("{name} must not be empty")));
            }
        }

        match &self.error_pattern {
            Some(pattern) => {
                let _ = PatternMarker::new(pattern)?;
            }
            None if self.error_marker.is_empty() => {
                return Err(HealError::config(
                    "error_marker must not be empty when no error_pattern is set",
                ));
            }
            None => {}
        }
        Ok(())
    }

    /// Build the predicate deciding whether a submission should be retried
    pub fn recovery_predicate(&self) -> HealResult<Box<dyn RecoveryPredicate>> {
        match &self.error_pattern {
            Some(pattern) => Ok(Box::new(PatternMarker::new(pattern)?)),
            None => Ok(Box::new(ErrorMarker::new(self.error_marker.clone()))),
        }
    }
}
