//! Retry Executor
//!
//! Wraps a single locate-and-act step in a bounded retry loop. Retries exist
//! for timing races (an element rendered late or re-rendered in a different
//! order), so each attempt re-queries the driver from scratch.
//!
//! The loop is an explicit counter, never recursion: attempts are strictly
//! sequential because each one mutates interface state.

use crate::clock::Clock;
use crate::driver::{Driver, Verb};
use crate::policy::{ActionOutcome, Execution, RetryPolicy, Visibility};
use crate::result::{HealError, HealResult};
use crate::selector::Selector;
use tracing::{debug, info};

/// Bounded locate-and-act loop over a driver
#[derive(Debug)]
pub struct RetryExecutor<'a, D: Driver, C: Clock> {
    driver: &'a D,
    clock: &'a C,
}

impl<'a, D: Driver, C: Clock> RetryExecutor<'a, D, C> {
    /// Create an executor borrowing a driver and clock
    #[must_use]
    pub const fn new(driver: &'a D, clock: &'a C) -> Self {
        Self { driver, clock }
    }

    /// Locate `selector` and perform `verb` on the first usable match.
    ///
    /// The first successful attempt wins; no further attempts are made. When
    /// the budget runs out the error reflects the last attempt: `NotFound` if
    /// nothing matched, `Exhausted` if the action itself failed.
    pub async fn execute(
        &self,
        selector: &Selector,
        verb: &Verb,
        policy: &RetryPolicy,
    ) -> HealResult<Execution> {
        let budget = policy.attempt_budget();
        let mut remaining = budget;
        let mut attempts = 0;

        loop {
            attempts += 1;
            remaining -= 1;

            let outcome = self.attempt(selector, verb, policy.visibility).await;
            debug!(%selector, verb = %verb, attempt = attempts, budget, %outcome, "retry attempt");

            if outcome.is_success() {
                if attempts > 1 {
                    info!(%selector, verb = %verb, attempts, "recovered after retry");
                }
                return Ok(Execution { attempts });
            }

            if remaining == 0 {
                return Err(match outcome {
                    ActionOutcome::Failed(reason) => HealError::Exhausted {
                        selector: selector.to_string(),
                        attempts,
                        reason,
                    },
                    _ => HealError::NotFound {
                        selector: selector.to_string(),
                        attempts,
                    },
                });
            }

            self.clock.delay(policy.wait_ms).await;
        }
    }

    /// Whether `selector` currently matches, polling per `policy`
    pub async fn wait_for(&self, selector: &Selector, policy: &RetryPolicy) -> HealResult<bool> {
        let budget = policy.attempt_budget();
        for attempt in 1..=budget {
            match self.driver.find(selector).await {
                Ok(elements) if !elements.is_empty() => return Ok(true),
                Ok(_) => {}
                // a failed lookup only counts as "absent" while budget remains
                Err(e) if attempt < budget => {
                    debug!(%selector, attempt, budget, error = %e, "lookup failed, polling again");
                }
                Err(e) => return Err(e),
            }
            if attempt < budget {
                self.clock.delay(policy.wait_ms).await;
            }
        }
        Ok(false)
    }

    /// One locate-and-act attempt
    async fn attempt(&self, selector: &Selector, verb: &Verb, visibility: Visibility) -> ActionOutcome {
        let elements = match self.driver.find(selector).await {
            Ok(elements) => elements,
            Err(e) => return ActionOutcome::Failed(e.to_string()),
        };

        let target = match visibility {
            Visibility::Force => elements.first(),
            Visibility::RequireVisible => {
                let mut visible = None;
                for element in &elements {
                    match self.driver.is_visible(element).await {
                        Ok(true) => {
                            visible = Some(element);
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => return ActionOutcome::Failed(e.to_string()),
                    }
                }
                visible
            }
        };

        let Some(element) = target else {
            return ActionOutcome::NotFound;
        };

        match self
            .driver
            .act_on(element, verb, visibility.is_forced())
            .await
        {
            Ok(()) => ActionOutcome::Success,
            Err(e) => ActionOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use crate::mock::{Call, ScriptedDriver};

    fn overview() -> Selector {
        Selector::css("a[href*=\"overview\"]")
    }

    mod success_tests {
        use super::*;

        #[tokio::test]
        async fn test_immediate_match_uses_one_attempt() {
            let driver = ScriptedDriver::new().with_element(overview());
            let clock = RecordingClock::new();
            let exec = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap();
            assert_eq!(exec.attempts, 1);
            assert_eq!(clock.delay_count(), 0);
            assert_eq!(driver.lookups(&overview()), 1);
        }

        #[tokio::test]
        async fn test_late_element_found_on_third_attempt() {
            let driver = ScriptedDriver::new().with_delayed_element(overview(), 2);
            let clock = RecordingClock::new();
            let exec = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap();
            assert_eq!(exec.attempts, 3);
            assert_eq!(clock.delays(), vec![500, 500]);
            assert_eq!(driver.actions_on(&overview()).len(), 1);
        }

        #[tokio::test]
        async fn test_first_duplicate_wins() {
            let driver = ScriptedDriver::new().with_element_visibility(overview(), vec![true, true]);
            let clock = RecordingClock::new();
            let _ = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap();
            let actions = driver.actions_on(&overview());
            assert_eq!(actions.len(), 1);
            assert!(matches!(&actions[0], Call::Act { index: 0, force: true, .. }));
        }

        #[tokio::test]
        async fn test_force_acts_on_hidden_element() {
            let driver = ScriptedDriver::new().with_element_visibility(overview(), vec![false]);
            let clock = RecordingClock::new();
            let exec = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap();
            assert_eq!(exec.attempts, 1);
        }
    }

    mod exhaustion_tests {
        use super::*;

        #[tokio::test]
        async fn test_never_matching_performs_exact_budget() {
            let driver = ScriptedDriver::new();
            let clock = RecordingClock::new();
            let err = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap_err();
            assert!(matches!(err, HealError::NotFound { attempts: 3, .. }));
            assert_eq!(driver.lookups(&overview()), 3);
            assert_eq!(clock.delays(), vec![500, 500]);
        }

        #[tokio::test]
        async fn test_zero_attempts_means_single_attempt() {
            let driver = ScriptedDriver::new();
            let clock = RecordingClock::new();
            let err = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::new(0))
                .await
                .unwrap_err();
            assert!(matches!(err, HealError::NotFound { attempts: 1, .. }));
            assert_eq!(clock.delay_count(), 0);
        }

        #[tokio::test]
        async fn test_failing_action_is_retried_then_exhausted() {
            let driver = ScriptedDriver::new()
                .with_element(overview())
                .with_failing_action(overview(), 10);
            let clock = RecordingClock::new();
            let err = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::new(2).with_wait_ms(50))
                .await
                .unwrap_err();
            match err {
                HealError::Exhausted { attempts, reason, .. } => {
                    assert_eq!(attempts, 2);
                    assert!(reason.contains("detached"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(clock.delays(), vec![50]);
        }

        #[tokio::test]
        async fn test_transient_action_failure_recovers() {
            let driver = ScriptedDriver::new()
                .with_element(overview())
                .with_failing_action(overview(), 1);
            let clock = RecordingClock::new();
            let exec = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap();
            assert_eq!(exec.attempts, 2);
        }

        #[tokio::test]
        async fn test_lookup_error_counts_as_failed_attempt() {
            let driver = ScriptedDriver::new()
                .with_element(overview())
                .with_failing_lookups(1);
            let clock = RecordingClock::new();
            let exec = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &RetryPolicy::element())
                .await
                .unwrap();
            assert_eq!(exec.attempts, 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_composes_from_outside() {
            let driver = ScriptedDriver::new();
            let clock = crate::clock::TokioClock;
            let exec = RetryExecutor::new(&driver, &clock);
            let policy = RetryPolicy::new(100).with_wait_ms(1_000);
            let result = tokio::time::timeout(
                std::time::Duration::from_millis(2_500),
                exec.execute(&overview(), &Verb::Click, &policy),
            )
            .await;
            assert!(result.is_err());
            assert_eq!(driver.lookups(&overview()), 3);
        }
    }

    mod visibility_tests {
        use super::*;

        #[tokio::test]
        async fn test_require_visible_skips_hidden_duplicates() {
            let driver =
                ScriptedDriver::new().with_element_visibility(overview(), vec![false, true]);
            let clock = RecordingClock::new();
            let policy = RetryPolicy::element().with_visibility(Visibility::RequireVisible);
            let _ = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &policy)
                .await
                .unwrap();
            let actions = driver.actions_on(&overview());
            assert!(matches!(&actions[0], Call::Act { index: 1, force: false, .. }));
        }

        #[tokio::test]
        async fn test_require_visible_treats_hidden_as_not_found() {
            let driver = ScriptedDriver::new().with_element_visibility(overview(), vec![false]);
            let clock = RecordingClock::new();
            let policy = RetryPolicy::new(2).with_visibility(Visibility::RequireVisible);
            let err = RetryExecutor::new(&driver, &clock)
                .execute(&overview(), &Verb::Click, &policy)
                .await
                .unwrap_err();
            assert!(matches!(err, HealError::NotFound { attempts: 2, .. }));
            assert!(driver.actions_on(&overview()).is_empty());
        }
    }

    mod wait_for_tests {
        use super::*;

        #[tokio::test]
        async fn test_wait_for_polls_until_present() {
            let driver = ScriptedDriver::new().with_delayed_element(overview(), 1);
            let clock = RecordingClock::new();
            let found = RetryExecutor::new(&driver, &clock)
                .wait_for(&overview(), &RetryPolicy::element())
                .await
                .unwrap();
            assert!(found);
            assert_eq!(clock.delay_count(), 1);
        }

        #[tokio::test]
        async fn test_wait_for_gives_up() {
            let driver = ScriptedDriver::new();
            let clock = RecordingClock::new();
            let found = RetryExecutor::new(&driver, &clock)
                .wait_for(&overview(), &RetryPolicy::new(2))
                .await
                .unwrap();
            assert!(!found);
            assert_eq!(clock.delay_count(), 1);
        }

        #[tokio::test]
        async fn test_wait_for_polls_past_lookup_error() {
            let driver = ScriptedDriver::new()
                .with_element(overview())
                .with_failing_lookups(1);
            let clock = RecordingClock::new();
            let found = RetryExecutor::new(&driver, &clock)
                .wait_for(&overview(), &RetryPolicy::element())
                .await
                .unwrap();
            assert!(found);
            assert_eq!(clock.delay_count(), 1);
        }

        #[tokio::test]
        async fn test_wait_for_surfaces_error_on_last_poll() {
            let driver = ScriptedDriver::new()
                .with_element(overview())
                .with_failing_lookups(2);
            let clock = RecordingClock::new();
            let err = RetryExecutor::new(&driver, &clock)
                .wait_for(&overview(), &RetryPolicy::new(2))
                .await
                .unwrap_err();
            assert!(matches!(err, HealError::Driver { .. }));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// A match appearing on attempt k ≤ n is used after exactly k attempts
            #[test]
            fn prop_no_over_retry(n in 1usize..8, k_offset in 0usize..8) {
                let k = (k_offset % n) + 1;
                let driver = ScriptedDriver::new().with_delayed_element(overview(), k - 1);
                let clock = RecordingClock::new();
                let policy = RetryPolicy::new(n).with_wait_ms(25);
                let exec = futures::executor::block_on(
                    RetryExecutor::new(&driver, &clock).execute(&overview(), &Verb::Click, &policy),
                ).unwrap();
                prop_assert_eq!(exec.attempts, k);
                prop_assert_eq!(driver.lookups(&overview()), k);
                prop_assert_eq!(clock.delay_count(), k - 1);
            }

            /// A selector that never matches costs exactly n attempts and n - 1 waits
            #[test]
            fn prop_exact_budget_on_exhaustion(n in 1usize..10, wait in 0u64..1_000) {
                let driver = ScriptedDriver::new();
                let clock = RecordingClock::new();
                let policy = RetryPolicy::new(n).with_wait_ms(wait);
                let err = futures::executor::block_on(
                    RetryExecutor::new(&driver, &clock).execute(&overview(), &Verb::Click, &policy),
                ).unwrap_err();
                let is_not_found = matches!(err, HealError::NotFound { attempts, .. } if attempts == n);
                prop_assert!(is_not_found);
                prop_assert_eq!(driver.lookups(&overview()), n);
                prop_assert_eq!(clock.delays(), vec![wait; n - 1]);
            }
        }
    }
}
