//! Retry policies and per-attempt outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default attempt count for element retries
pub const DEFAULT_ELEMENT_ATTEMPTS: usize = 3;

/// Default attempt count for submission retries
pub const DEFAULT_SUBMISSION_ATTEMPTS: usize = 2;

/// Default wait between attempts (500ms)
pub const DEFAULT_WAIT_MS: u64 = 500;

/// Whether an attempt may act on an element that is not visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Act on the first match regardless of its state
    #[default]
    Force,
    /// Only a visible match counts; the first visible match wins
    RequireVisible,
}

impl Visibility {
    /// Whether actions are forced past interactability checks
    #[must_use]
    pub const fn is_forced(self) -> bool {
        matches!(self, Self::Force)
    }
}

/// Bounded attempt count plus inter-attempt delay.
///
/// `max_attempts = 0` still performs one attempt: zero means "no retry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts
    pub max_attempts: usize,
    /// Delay between attempts in milliseconds
    pub wait_ms: u64,
    /// Visibility precondition for acting on a match
    pub visibility: Visibility,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::element()
    }
}

impl RetryPolicy {
    /// Create a policy with an attempt count and the default wait
    #[must_use]
    pub const fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            wait_ms: DEFAULT_WAIT_MS,
            visibility: Visibility::Force,
        }
    }

    /// Element retry defaults (3 attempts, 500ms apart)
    #[must_use]
    pub const fn element() -> Self {
        Self::new(DEFAULT_ELEMENT_ATTEMPTS)
    }

    /// Submission retry defaults (2 attempts, 500ms apart)
    #[must_use]
    pub const fn submission() -> Self {
        Self::new(DEFAULT_SUBMISSION_ATTEMPTS)
    }

    /// A single attempt with no retry
    #[must_use]
    pub const fn single() -> Self {
        Self {
            max_attempts: 1,
            wait_ms: 0,
            visibility: Visibility::Force,
        }
    }

    /// Set the attempt count
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the wait between attempts
    #[must_use]
    pub const fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = wait_ms;
        self
    }

    /// Set the visibility precondition
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Number of attempts actually performed
    #[must_use]
    pub const fn attempt_budget(&self) -> usize {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Wait between attempts as a Duration
    #[must_use]
    pub const fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Upper bound on time spent waiting between attempts
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms.saturating_mul((self.attempt_budget() - 1) as u64))
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action was performed
    Success,
    /// The selector matched nothing usable
    NotFound,
    /// The action failed with a reason
    Failed(String),
}

impl ActionOutcome {
    /// Check if the attempt succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NotFound => write!(f, "not found"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Report of a successful retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    /// Attempts used, including the successful one
    pub attempts: usize,
}
