//! Selfheal: recovery layer for automated UI interaction
//!
//! Executes actions against a dynamic, possibly unreliable interface and
//! recovers from three classes of transient failure: a lost session, elements
//! that render late or in a different order, and unsolicited modal dialogs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Scenario                              │
//! │  register dialogs ─► ensure session ─► body ─► cleanup ─► teardown│
//! ├──────────────────────────────────────────────────────────────────┤
//! │   SelfHealing: ensure_logged_in / retry_click / submit_with_retry │
//! ├──────────────┬───────────────┬──────────────────┬────────────────┤
//! │ SessionGuard │ RetryExecutor │ SubmissionRetrier│  CleanupHook   │
//! ├──────────────┴───────────────┴──────────────────┴────────────────┤
//! │   Driver (find / act_on / current_text / dialog hook) + Clock    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use selfheal::prelude::*;
//!
//! let heal = SelfHealing::new(driver, TokioClock, HealConfig::default())?;
//! let scenario = Scenario::new(heal, Credentials::new("john", "demo"));
//! let report = scenario
//!     .run(|heal| async move {
//!         heal.retry_click("a[href*=\"overview\"]").await?;
//!         heal.submit_with_retry("input[value=\"Transfer\"]").await
//!     })
//!     .await;
//! ```

#![warn(missing_docs)]

mod cleanup;
mod clock;
mod config;
mod dialog;
mod driver;
mod healing;
mod policy;
mod result;
mod retry;
mod scenario;
mod selector;
mod session;
mod submit;

#[cfg(feature = "browser")]
mod cdp;

/// Scripted interface for tests and simulation
pub mod mock;

#[cfg(feature = "browser")]
pub use cdp::{CdpDriver, LaunchOptions};
pub use cleanup::{CleanupHook, CleanupOutcome};
pub use clock::{Clock, RecordingClock, TokioClock};
pub use config::{HealConfig, SessionSelectors, DEFAULT_ERROR_MARKER, DEFAULT_SESSION_MARKER};
pub use dialog::{
    DialogEvent, DialogInterceptor, DialogKind, DialogResponse, HandledDialog, ResponsePolicy,
};
pub use driver::{Driver, Verb};
pub use healing::SelfHealing;
pub use policy::{
    ActionOutcome, Execution, RetryPolicy, Visibility, DEFAULT_ELEMENT_ATTEMPTS,
    DEFAULT_SUBMISSION_ATTEMPTS, DEFAULT_WAIT_MS,
};
pub use result::{HealError, HealResult};
pub use retry::RetryExecutor;
pub use scenario::{Scenario, ScenarioReport};
pub use selector::Selector;
pub use session::{Credentials, SessionGuard, SessionStatus};
pub use submit::{ErrorMarker, PatternMarker, RecoveryPredicate, SubmissionRetrier};

/// Prelude for convenient imports
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::cdp::*;
    pub use super::cleanup::*;
    pub use super::clock::*;
    pub use super::config::*;
    pub use super::dialog::*;
    pub use super::driver::*;
    pub use super::healing::*;
    pub use super::mock::*;
    pub use super::policy::*;
    pub use super::result::*;
    pub use super::retry::*;
    pub use super::scenario::*;
    pub use super::selector::*;
    pub use super::session::*;
    pub use super::submit::*;
}
