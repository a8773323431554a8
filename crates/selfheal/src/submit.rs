//! Submission Retrier
//!
//! Retries a whole submit action when the page reports a recoverable error
//! afterwards. The retry condition is content-based: whatever the element
//! retries say, a submission only counts once the rendered text stops
//! carrying the error marker.

use crate::clock::Clock;
use crate::config::DEFAULT_ERROR_MARKER;
use crate::driver::{Driver, Verb};
use crate::policy::{Execution, RetryPolicy};
use crate::result::{HealError, HealResult};
use crate::retry::RetryExecutor;
use crate::selector::Selector;
use regex::Regex;
use tracing::{debug, info};

/// Decides whether a page snapshot shows a recoverable submission error
pub trait RecoveryPredicate: Send + Sync {
    /// Whether `snapshot` warrants resubmitting
    fn is_recoverable(&self, snapshot: &str) -> bool;
}

impl<F> RecoveryPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_recoverable(&self, snapshot: &str) -> bool {
        self(snapshot)
    }
}

/// Substring match on the rendered text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMarker {
    marker: String,
}

impl ErrorMarker {
    /// Match snapshots containing `marker`
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// The marker text
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl Default for ErrorMarker {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_MARKER)
    }
}

impl RecoveryPredicate for ErrorMarker {
    fn is_recoverable(&self, snapshot: &str) -> bool {
        snapshot.contains(&self.marker)
    }
}

/// Regex match on the rendered text
#[derive(Debug, Clone)]
pub struct PatternMarker {
    pattern: Regex,
}

impl PatternMarker {
    /// Compile `pattern`
    pub fn new(pattern: &str) -> HealResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| HealError::config(format!("invalid error_pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// The source pattern
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl RecoveryPredicate for PatternMarker {
    fn is_recoverable(&self, snapshot: &str) -> bool {
        self.pattern.is_match(snapshot)
    }
}

/// Resubmits while the page reports a recoverable error
pub struct SubmissionRetrier<'a, D: Driver, C: Clock> {
    driver: &'a D,
    clock: &'a C,
    predicate: &'a dyn RecoveryPredicate,
}

impl<'a, D: Driver, C: Clock> SubmissionRetrier<'a, D, C> {
    /// Create a retrier judging snapshots with `predicate`
    #[must_use]
    pub fn new(driver: &'a D, clock: &'a C, predicate: &'a dyn RecoveryPredicate) -> Self {
        Self {
            driver,
            clock,
            predicate,
        }
    }

    /// Submit via `selector` until the page is free of errors.
    ///
    /// `policy` bounds whole submissions; `element_policy` bounds locating
    /// the submit control within one submission. A control that never
    /// appears fails with the element error, not `Submission`.
    pub async fn submit(
        &self,
        selector: &Selector,
        policy: &RetryPolicy,
        element_policy: &RetryPolicy,
    ) -> HealResult<Execution> {
        let executor = RetryExecutor::new(self.driver, self.clock);
        let budget = policy.attempt_budget();

        for attempt in 1..=budget {
            let _ = executor.execute(selector, &Verb::Click, element_policy).await?;
            let snapshot = self.driver.current_text().await?;

            if !self.predicate.is_recoverable(&snapshot) {
                debug!(%selector, attempt, "submission accepted");
                return Ok(Execution { attempts: attempt });
            }

            if attempt < budget {
                info!(%selector, attempt, budget, "submission reported an error, resubmitting");
                self.clock.delay(policy.wait_ms).await;
            }
        }

        Err(HealError::Submission {
            selector: selector.to_string(),
            attempts: budget,
        })
    }
}

impl<D: Driver, C: Clock> std::fmt::Debug for SubmissionRetrier<'_, D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionRetrier").finish_non_exhaustive()
    }
}
