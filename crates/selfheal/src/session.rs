//! Session Guard
//!
//! Checks for the session marker and replays the credential-entry sequence
//! when it is missing. [`SessionGuard::ensure`] is one-shot and never fails:
//! it does not re-check the marker after submitting. Callers needing a hard
//! guarantee use [`SessionGuard::ensure_verified`].

use crate::clock::Clock;
use crate::config::SessionSelectors;
use crate::driver::{Driver, Verb};
use crate::policy::RetryPolicy;
use crate::result::{HealError, HealResult};
use crate::retry::RetryExecutor;
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Username and password, passed through to the credential-entry sequence
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What [`SessionGuard::ensure`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Marker present, nothing done
    Authenticated,
    /// Marker absent, credentials were entered and submitted
    ReauthenticationAttempted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated => write!(f, "authenticated"),
            Self::ReauthenticationAttempted => write!(f, "re-authentication attempted"),
        }
    }
}

/// Re-authenticates when the session marker is missing
#[derive(Debug)]
pub struct SessionGuard<'a, D: Driver, C: Clock> {
    driver: &'a D,
    clock: &'a C,
    selectors: &'a SessionSelectors,
    policy: RetryPolicy,
}

impl<'a, D: Driver, C: Clock> SessionGuard<'a, D, C> {
    /// Create a guard; `policy` bounds locating each form element
    #[must_use]
    pub const fn new(
        driver: &'a D,
        clock: &'a C,
        selectors: &'a SessionSelectors,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            driver,
            clock,
            selectors,
            policy,
        }
    }

    /// Make sure the session looks authenticated.
    ///
    /// A single marker lookup decides. When absent, the username and password
    /// fields are cleared and filled and the form submitted, without
    /// re-checking the marker afterwards. Failures along the way are logged,
    /// never returned.
    pub async fn ensure(&self, credentials: &Credentials) -> SessionStatus {
        let marker = &self.selectors.marker;
        match self.driver.find(marker).await {
            Ok(found) if !found.is_empty() => {
                debug!(%marker, "session marker present");
                return SessionStatus::Authenticated;
            }
            Ok(_) => {}
            Err(e) => warn!(%marker, error = %e, "session marker lookup failed"),
        }

        info!(%marker, username = %credentials.username, "session marker absent, re-authenticating");
        if let Err(e) = self.enter_credentials(credentials).await {
            warn!(error = %e, "re-authentication did not complete");
        }
        SessionStatus::ReauthenticationAttempted
    }

    /// Like [`ensure`](Self::ensure), then poll for the marker per `verify`
    pub async fn ensure_verified(
        &self,
        credentials: &Credentials,
        verify: &RetryPolicy,
    ) -> HealResult<SessionStatus> {
        let status = self.ensure(credentials).await;
        if status == SessionStatus::Authenticated {
            return Ok(status);
        }

        let marker = &self.selectors.marker;
        let restored = RetryExecutor::new(self.driver, self.clock)
            .wait_for(marker, verify)
            .await?;
        if restored {
            info!(%marker, "session restored");
            Ok(status)
        } else {
            Err(HealError::SessionNotRestored {
                marker: marker.to_string(),
            })
        }
    }

    async fn enter_credentials(&self, credentials: &Credentials) -> HealResult<()> {
        self.fill(&self.selectors.username_field, &credentials.username)
            .await?;
        self.fill(&self.selectors.password_field, &credentials.password)
            .await?;
        let _ = RetryExecutor::new(self.driver, self.clock)
            .execute(&self.selectors.submit, &Verb::Click, &self.policy)
            .await?;
        Ok(())
    }

    async fn fill(&self, field: &Selector, text: &str) -> HealResult<()> {
        let executor = RetryExecutor::new(self.driver, self.clock);
        let _ = executor.execute(field, &Verb::Clear, &self.policy).await?;
        let _ = executor
            .execute(field, &Verb::type_text(text), &self.policy)
            .await?;
        Ok(())
    }
}
