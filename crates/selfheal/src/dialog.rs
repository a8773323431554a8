//! Dialog Interception
//!
//! Auto-responds to unsolicited alert/confirm dialogs so they never block an
//! action sequence awaiting operator input.
//!
//! A [`DialogInterceptor`] is owned by the scenario: it is registered when the
//! scenario starts and torn down when it ends, so a response policy never
//! leaks from one scenario into the next.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Kind of native dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
        }
    }
}

/// Response given to a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogResponse {
    /// OK / Yes
    Accept,
    /// Cancel / No / close
    Dismiss,
}

impl DialogResponse {
    /// Whether the response accepts the dialog
    #[must_use]
    pub const fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// A dialog raised by the interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogEvent {
    /// Dialog kind
    pub kind: DialogKind,
    /// Message displayed in the dialog
    pub text: String,
}

impl DialogEvent {
    /// Create an alert event
    #[must_use]
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::Alert,
            text: text.into(),
        }
    }

    /// Create a confirm event
    #[must_use]
    pub fn confirm(text: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::Confirm,
            text: text.into(),
        }
    }
}

/// Mapping from dialog kind to response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePolicy {
    /// Response to alerts
    pub alert: DialogResponse,
    /// Response to confirms
    pub confirm: DialogResponse,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            alert: DialogResponse::Dismiss,
            confirm: DialogResponse::Accept,
        }
    }
}

impl ResponsePolicy {
    /// Response for a dialog kind
    #[must_use]
    pub const fn response_for(&self, kind: DialogKind) -> DialogResponse {
        match kind {
            DialogKind::Alert => self.alert,
            DialogKind::Confirm => self.confirm,
        }
    }
}

/// A dialog that was auto-responded to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandledDialog {
    /// The dialog as raised
    pub event: DialogEvent,
    /// Response given
    pub response: DialogResponse,
}

#[derive(Debug, Default)]
struct InterceptorState {
    policy: Option<ResponsePolicy>,
    handled: Vec<HandledDialog>,
}

/// Auto-responder for unsolicited dialogs.
///
/// Cloning yields another handle to the same interceptor, so a driver's
/// dialog hook and the scenario observe the same policy and history.
#[derive(Clone, Default)]
pub struct DialogInterceptor {
    state: Arc<Mutex<InterceptorState>>,
}

impl DialogInterceptor {
    /// Create an unregistered interceptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a response policy.
    ///
    /// Re-registering replaces the policy; it never stacks a second listener.
    pub fn register(&self, policy: ResponsePolicy) {
        if let Ok(mut state) = self.state.lock() {
            state.policy = Some(policy);
        }
    }

    /// Remove the response policy and forget handled dialogs
    pub fn teardown(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.policy = None;
            state.handled.clear();
        }
    }

    /// Whether a policy is installed
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.policy().is_some()
    }

    /// Installed policy, if any
    #[must_use]
    pub fn policy(&self) -> Option<ResponsePolicy> {
        self.state.lock().ok().and_then(|s| s.policy)
    }

    /// Resolve a dialog. Never fails and never blocks.
    ///
    /// Without a registered policy the interface default applies (dismiss)
    /// and nothing is recorded.
    pub fn handle(&self, event: DialogEvent) -> DialogResponse {
        let Ok(mut state) = self.state.lock() else {
            return DialogResponse::Dismiss;
        };
        let Some(policy) = state.policy else {
            return DialogResponse::Dismiss;
        };

        let response = policy.response_for(event.kind);
        info!(kind = %event.kind, text = %event.text, ?response, "dialog intercepted");
        state.handled.push(HandledDialog { event, response });
        response
    }

    /// Every dialog handled since registration
    #[must_use]
    pub fn dialogs(&self) -> Vec<HandledDialog> {
        self.state
            .lock()
            .map(|s| s.handled.clone())
            .unwrap_or_default()
    }

    /// Number of dialogs handled
    #[must_use]
    pub fn dialog_count(&self) -> usize {
        self.state.lock().map(|s| s.handled.len()).unwrap_or(0)
    }

    /// Last dialog handled
    #[must_use]
    pub fn last_dialog(&self) -> Option<HandledDialog> {
        self.state.lock().ok().and_then(|s| s.handled.last().cloned())
    }

    /// Clear dialog history, keeping the policy
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.handled.clear();
        }
    }
}

impl fmt::Debug for DialogInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogInterceptor")
            .field("policy", &self.policy())
            .field("dialog_count", &self.dialog_count())
            .finish()
    }
}
