//! Best-effort sign-out run at the end of every scenario.

use crate::driver::{Driver, Verb};
use crate::result::HealResult;
use crate::selector::Selector;
use tracing::{debug, info, warn};

/// What [`CleanupHook::cleanup`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The sign-out affordance was clicked
    SignedOut,
    /// No sign-out affordance, nothing to do
    NothingToDo,
    /// Cleanup failed; the failure was logged and swallowed
    Failed,
}

/// Teardown that never fails
#[derive(Debug)]
pub struct CleanupHook<'a, D: Driver> {
    driver: &'a D,
    sign_out: &'a Selector,
}

impl<'a, D: Driver> CleanupHook<'a, D> {
    /// Create a hook clicking `sign_out` when present
    #[must_use]
    pub const fn new(driver: &'a D, sign_out: &'a Selector) -> Self {
        Self { driver, sign_out }
    }

    /// Click the sign-out affordance if it is rendered, forcing past
    /// overlays. Errors are logged at `warn` and swallowed.
    pub async fn cleanup(&self) -> CleanupOutcome {
        match self.sign_out().await {
            Ok(true) => {
                info!(sign_out = %self.sign_out, "signed out");
                CleanupOutcome::SignedOut
            }
            Ok(false) => {
                debug!(sign_out = %self.sign_out, "no sign-out affordance, skipping");
                CleanupOutcome::NothingToDo
            }
            Err(e) => {
                warn!(sign_out = %self.sign_out, error = %e, "cleanup failed");
                CleanupOutcome::Failed
            }
        }
    }

    async fn sign_out(&self) -> HealResult<bool> {
        let found = self.driver.find(self.sign_out).await?;
        let Some(link) = found.first() else {
            return Ok(false);
        };
        self.driver.act_on(link, &Verb::Click, true).await?;
        Ok(true)
    }
}
