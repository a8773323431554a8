//! Scenario Runner
//!
//! Brackets a scenario body with the recovery lifecycle:
//!
//! 1. register the dialog interceptor and install it as the driver's hook
//! 2. ensure the session (one-shot, never fails)
//! 3. run the body
//! 4. sign out, whatever the body did
//! 5. tear the interceptor down
//!
//! Steps 4 and 5 also run when the body returns an error, panics or overruns
//! the deadline set with [`Scenario::with_deadline`]; a panic is resumed once
//! teardown is done.
//!
//! Dropping the `run` future from outside (for example under an external
//! `tokio::time::timeout`) still tears the interceptor down, but cannot sign
//! out. Use [`Scenario::with_deadline`] to bound the body and keep the cleanup.

use crate::cleanup::CleanupOutcome;
use crate::clock::Clock;
use crate::dialog::{DialogInterceptor, HandledDialog};
use crate::driver::Driver;
use crate::healing::SelfHealing;
use crate::result::{HealError, HealResult};
use crate::session::{Credentials, SessionStatus};
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, warn};

/// What happened during [`Scenario::run`]
#[derive(Debug)]
pub struct ScenarioReport<T> {
    /// Outcome of the body (or of setup, if setup failed)
    pub result: HealResult<T>,
    /// Session guard status; `None` if setup failed first
    pub session: Option<SessionStatus>,
    /// Cleanup outcome
    pub cleanup: CleanupOutcome,
    /// Dialogs auto-responded to during the scenario
    pub dialogs: Vec<HandledDialog>,
}

impl<T> ScenarioReport<T> {
    /// Whether the body succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Discard the report, keeping the body's result
    pub fn into_result(self) -> HealResult<T> {
        self.result
    }
}

/// One guarded scenario over a driver
#[derive(Debug)]
pub struct Scenario<D: Driver, C: Clock> {
    healing: SelfHealing<D, C>,
    credentials: Credentials,
    interceptor: DialogInterceptor,
    deadline: Option<Duration>,
}

/// Unhooks and tears down the interceptor when dropped, including on cancellation
struct DialogGuard<'a, D: Driver> {
    driver: &'a D,
    interceptor: &'a DialogInterceptor,
}

impl<D: Driver> Drop for DialogGuard<'_, D> {
    fn drop(&mut self) {
        self.driver.remove_dialog_hook();
        self.interceptor.teardown();
    }
}

impl<D: Driver, C: Clock> Scenario<D, C> {
    /// Create a scenario logging in with `credentials`
    #[must_use]
    pub fn new(healing: SelfHealing<D, C>, credentials: Credentials) -> Self {
        Self {
            healing,
            credentials,
            interceptor: DialogInterceptor::new(),
            deadline: None,
        }
    }

    /// Bound the body's run time; an overrun ends it with `DeadlineExceeded`
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use an existing interceptor handle (to observe dialogs from outside)
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: DialogInterceptor) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// The recovery helpers
    pub const fn healing(&self) -> &SelfHealing<D, C> {
        &self.healing
    }

    /// The scenario's dialog interceptor
    pub const fn interceptor(&self) -> &DialogInterceptor {
        &self.interceptor
    }

    /// Run `body` inside the recovery lifecycle
    pub async fn run<'a, F, Fut, T>(&'a self, body: F) -> ScenarioReport<T>
    where
        F: FnOnce(&'a SelfHealing<D, C>) -> Fut,
        Fut: Future<Output = HealResult<T>>,
    {
        let policy = self.healing.config().dialogs;
        self.interceptor.register(policy);
        let guard = DialogGuard {
            driver: self.healing.driver(),
            interceptor: &self.interceptor,
        };

        let (session, outcome) = match self
            .healing
            .driver()
            .install_dialog_hook(self.interceptor.clone())
            .await
        {
            Ok(()) => {
                let session = self.healing.ensure_session(&self.credentials).await;
                let healing = &self.healing;
                let deadline = self.deadline;
                let outcome = AssertUnwindSafe(async move {
                    match deadline {
                        Some(limit) => tokio::time::timeout(limit, body(healing))
                            .await
                            .unwrap_or_else(|_| {
                                warn!(?limit, "scenario body overran its deadline");
                                Err(HealError::DeadlineExceeded {
                                    ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                                })
                            }),
                        None => body(healing).await,
                    }
                })
                .catch_unwind()
                .await;
                (Some(session), outcome)
            }
            Err(e) => {
                warn!(error = %e, "dialog hook installation failed");
                (None, Ok(Err(e)))
            }
        };

        let cleanup = self.healing.cleanup_session().await;
        let dialogs = self.interceptor.dialogs();
        drop(guard);
        debug!(?session, ?cleanup, dialogs = dialogs.len(), "scenario finished");

        match outcome {
            Ok(result) => ScenarioReport {
                result,
                session,
                cleanup,
                dialogs,
            },
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}
