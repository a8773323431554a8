//! Self-healing helpers a scenario author calls.
//!
//! [`SelfHealing`] bundles a driver, a clock and a [`HealConfig`] and exposes
//! the recovery operations by name: `ensure_logged_in`, `retry_click`,
//! `submit_with_retry`, `cleanup_session`.
//!
//! ## Example
//!
//! ```rust,ignore
//! let heal = SelfHealing::new(driver, TokioClock, HealConfig::default())?;
//! heal.ensure_logged_in("john", "demo").await;
//! heal.retry_click("a[href*=\"overview\"]").await?;
//! heal.submit_with_retry("input[value=\"Transfer\"]").await?;
//! heal.cleanup_session().await;
//! ```

use crate::cleanup::{CleanupHook, CleanupOutcome};
use crate::clock::Clock;
use crate::config::HealConfig;
use crate::driver::{Driver, Verb};
use crate::policy::{Execution, RetryPolicy};
use crate::result::HealResult;
use crate::retry::RetryExecutor;
use crate::selector::Selector;
use crate::session::{Credentials, SessionGuard, SessionStatus};
use crate::submit::{RecoveryPredicate, SubmissionRetrier};
use std::fmt;

/// Recovery operations over one driver
pub struct SelfHealing<D: Driver, C: Clock> {
    driver: D,
    clock: C,
    config: HealConfig,
    predicate: Box<dyn RecoveryPredicate>,
}

impl<D: Driver, C: Clock> SelfHealing<D, C> {
    /// Create helpers from a validated configuration
    pub fn new(driver: D, clock: C, config: HealConfig) -> HealResult<Self> {
        config.validate()?;
        let predicate = config.recovery_predicate()?;
        Ok(Self {
            driver,
            clock,
            config,
            predicate,
        })
    }

    /// Replace the recoverable-error predicate
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl RecoveryPredicate + 'static) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    /// The driver
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// The clock
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The configuration in use
    pub const fn config(&self) -> &HealConfig {
        &self.config
    }

    fn executor(&self) -> RetryExecutor<'_, D, C> {
        RetryExecutor::new(&self.driver, &self.clock)
    }

    fn guard(&self) -> SessionGuard<'_, D, C> {
        SessionGuard::new(
            &self.driver,
            &self.clock,
            &self.config.session,
            self.config.element_retry,
        )
    }

    /// Log in unless the session marker is present. Never fails.
    pub async fn ensure_logged_in(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SessionStatus {
        self.guard()
            .ensure(&Credentials::new(username, password))
            .await
    }

    /// Log in unless the session marker is present, then require the marker
    pub async fn ensure_logged_in_verified(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> HealResult<SessionStatus> {
        self.guard()
            .ensure_verified(
                &Credentials::new(username, password),
                &self.config.element_retry,
            )
            .await
    }

    /// Ensure the session for a credentials value
    pub async fn ensure_session(&self, credentials: &Credentials) -> SessionStatus {
        self.guard().ensure(credentials).await
    }

    /// Click with the configured element policy (3 attempts by default)
    pub async fn retry_click(&self, selector: impl Into<Selector>) -> HealResult<Execution> {
        self.retry_click_with(selector, &self.config.element_retry)
            .await
    }

    /// Click with an explicit policy
    pub async fn retry_click_with(
        &self,
        selector: impl Into<Selector>,
        policy: &RetryPolicy,
    ) -> HealResult<Execution> {
        self.executor()
            .execute(&selector.into(), &Verb::Click, policy)
            .await
    }

    /// Clear a field and type into it, each step retried
    pub async fn retry_type(
        &self,
        selector: impl Into<Selector>,
        text: impl Into<String>,
    ) -> HealResult<Execution> {
        let selector = selector.into();
        let policy = &self.config.element_retry;
        let cleared = self.executor().execute(&selector, &Verb::Clear, policy).await?;
        let typed = self
            .executor()
            .execute(&selector, &Verb::Type(text.into()), policy)
            .await?;
        Ok(Execution {
            attempts: cleared.attempts + typed.attempts,
        })
    }

    /// Select an option by index, retried
    pub async fn retry_select(
        &self,
        selector: impl Into<Selector>,
        index: usize,
    ) -> HealResult<Execution> {
        self.executor()
            .execute(&selector.into(), &Verb::Select(index), &self.config.element_retry)
            .await
    }

    /// Submit with the configured submission policy (2 attempts by default)
    pub async fn submit_with_retry(&self, selector: impl Into<Selector>) -> HealResult<Execution> {
        self.submit_with_retry_with(selector, &self.config.submission_retry)
            .await
    }

    /// Submit with an explicit submission policy
    pub async fn submit_with_retry_with(
        &self,
        selector: impl Into<Selector>,
        policy: &RetryPolicy,
    ) -> HealResult<Execution> {
        SubmissionRetrier::new(&self.driver, &self.clock, self.predicate.as_ref())
            .submit(&selector.into(), policy, &self.config.element_retry)
            .await
    }

    /// Sign out if signed in. Never fails.
    pub async fn cleanup_session(&self) -> CleanupOutcome {
        CleanupHook::new(&self.driver, &self.config.sign_out)
            .cleanup()
            .await
    }
}

impl<D: Driver + fmt::Debug, C: Clock + fmt::Debug> fmt::Debug for SelfHealing<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfHealing")
            .field("driver", &self.driver)
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use crate::mock::{LoginScript, ScriptedDriver, SubmissionScript};
    use crate::result::HealError;

    fn heal(driver: &ScriptedDriver) -> SelfHealing<ScriptedDriver, RecordingClock> {
        SelfHealing::new(driver.clone(), RecordingClock::new(), HealConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HealConfig {
            error_pattern: Some("(".to_string()),
            ..HealConfig::default()
        };
        let result = SelfHealing::new(ScriptedDriver::new(), RecordingClock::new(), config);
        assert!(matches!(result, Err(HealError::Config { .. })));
    }

    #[tokio::test]
    async fn test_retry_click_defaults_to_three_attempts() {
        let driver = ScriptedDriver::new();
        let heal = heal(&driver);
        let err = heal.retry_click("#missing").await.unwrap_err();
        assert!(matches!(err, HealError::NotFound { attempts: 3, .. }));
        assert_eq!(heal.clock().delays(), vec![500, 500]);
    }

    #[tokio::test]
    async fn test_retry_click_with_custom_retries() {
        let driver = ScriptedDriver::new();
        let heal = heal(&driver);
        let err = heal
            .retry_click_with("#missing", &RetryPolicy::new(5).with_wait_ms(100))
            .await
            .unwrap_err();
        assert!(matches!(err, HealError::NotFound { attempts: 5, .. }));
    }

    #[tokio::test]
    async fn test_retry_type_replaces_value() {
        let amount = Selector::css("#amount");
        let driver = ScriptedDriver::new().with_element(amount.clone());
        let heal = heal(&driver);
        let _ = heal.retry_type(amount.clone(), "100").await.unwrap();
        let _ = heal.retry_type(amount.clone(), "250").await.unwrap();
        assert_eq!(driver.field_value(&amount).as_deref(), Some("250"));
    }

    #[tokio::test]
    async fn test_retry_select() {
        let account = Selector::css("#fromAccountId");
        let driver = ScriptedDriver::new().with_element(account.clone());
        let heal = heal(&driver);
        let _ = heal.retry_select(account.clone(), 1).await.unwrap();
        assert_eq!(driver.field_value(&account).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_submit_with_retry_recovers_once() {
        let transfer = Selector::css("input[value=\"Transfer\"]");
        let driver =
            ScriptedDriver::new().with_submission(transfer.clone(), SubmissionScript::failing(1));
        let exec = heal(&driver).submit_with_retry(transfer).await.unwrap();
        assert_eq!(exec.attempts, 2);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let transfer = Selector::css("input[value=\"Transfer\"]");
        let driver =
            ScriptedDriver::new().with_submission(transfer.clone(), SubmissionScript::failing(3));
        let heal = heal(&driver).with_predicate(|_: &str| false);
        let exec = heal.submit_with_retry(transfer).await.unwrap();
        assert_eq!(exec.attempts, 1);
    }

    #[tokio::test]
    async fn test_login_then_cleanup() {
        let driver = ScriptedDriver::new().with_login(LoginScript::new());
        let heal = heal(&driver);
        assert_eq!(
            heal.ensure_logged_in("john", "demo").await,
            SessionStatus::ReauthenticationAttempted
        );
        assert!(driver.is_logged_in());
        assert_eq!(heal.cleanup_session().await, CleanupOutcome::SignedOut);
        assert!(!driver.is_logged_in());
    }

    #[tokio::test]
    async fn test_verified_login() {
        let driver = ScriptedDriver::new()
            .with_login(LoginScript::new().with_credentials("john", "demo"));
        let heal = heal(&driver);
        assert!(heal.ensure_logged_in_verified("john", "demo").await.is_ok());
    }
}
