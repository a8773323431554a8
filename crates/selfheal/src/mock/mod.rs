//! Scripted interface for testing recovery without a browser.
//!
//! [`ScriptedDriver`] models just enough of a web application to exercise
//! every recovery path: elements that render late, hidden duplicates, a login
//! form that flips a session marker, submissions that report errors a fixed
//! number of times, and dialogs routed through the installed hook.
//!
//! ## Example
//!
//! ```rust,ignore
//! let driver = ScriptedDriver::new()
//!     .with_delayed_element(Selector::css("a[href*=\"overview\"]"), 2)
//!     .with_login(LoginScript::default().logged_in(false));
//! ```

mod scripted;

pub use scripted::{Call, LoginScript, ScriptedDriver, ScriptedElement, SubmissionScript};
