//! In-memory driver with scripted element timing and page reactions.

use crate::config::{SessionSelectors, DEFAULT_SESSION_MARKER};
use crate::dialog::{DialogEvent, DialogInterceptor, DialogResponse};
use crate::driver::{Driver, Verb};
use crate::result::{HealError, HealResult};
use crate::selector::Selector;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle to an element returned by [`ScriptedDriver::find`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedElement {
    /// Selector that located the element
    pub selector: Selector,
    /// Position among the matches
    pub index: usize,
    /// Whether the element is visible
    pub visible: bool,
}

/// A recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Element lookup
    Find {
        /// Selector queried
        selector: Selector,
        /// Number of elements returned
        matched: usize,
    },
    /// Successful interaction
    Act {
        /// Selector that located the element
        selector: Selector,
        /// Position among the matches
        index: usize,
        /// Verb performed
        verb: Verb,
        /// Whether interactability checks were bypassed
        force: bool,
    },
    /// Text snapshot taken
    Text,
    /// Dialog raised
    Dialog {
        /// Dialog as raised
        event: DialogEvent,
        /// Response it received
        response: DialogResponse,
    },
}

/// Login form behaviour
#[derive(Debug, Clone)]
pub struct LoginScript {
    selectors: SessionSelectors,
    sign_out: Selector,
    credentials: Option<(String, String)>,
    logged_in: bool,
    welcome_text: String,
    failure_text: String,
}

impl Default for LoginScript {
    fn default() -> Self {
        Self {
            selectors: SessionSelectors::default(),
            sign_out: Selector::css(DEFAULT_SESSION_MARKER),
            credentials: None,
            logged_in: false,
            welcome_text: "Accounts Overview".to_string(),
            failure_text: "Error! The username and password could not be verified.".to_string(),
        }
    }
}

impl LoginScript {
    /// Create a login script with default selectors
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom session selectors
    #[must_use]
    pub fn with_selectors(mut self, selectors: SessionSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Use a custom sign-out selector
    #[must_use]
    pub fn with_sign_out(mut self, sign_out: Selector) -> Self {
        self.sign_out = sign_out;
        self
    }

    /// Only accept these credentials (any are accepted otherwise)
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Start with the session established or not
    #[must_use]
    pub const fn logged_in(mut self, logged_in: bool) -> Self {
        self.logged_in = logged_in;
        self
    }
}

/// Reaction of a submit control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionScript {
    /// Submissions that still report an error
    pub failures: usize,
    /// Page text while failing
    pub error_text: String,
    /// Page text once the submission goes through
    pub success_text: String,
}

impl SubmissionScript {
    /// Fail `failures` times, then succeed
    #[must_use]
    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            error_text: "Error! An internal error has occurred and has been logged.".to_string(),
            success_text: "Transfer Complete!".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct ElementSchedule {
    visibility: Vec<bool>,
    appears_after: usize,
}

#[derive(Debug, Default)]
struct ScriptState {
    elements: HashMap<Selector, ElementSchedule>,
    lookups: HashMap<Selector, usize>,
    failing_actions: HashMap<Selector, usize>,
    failing_lookups: usize,
    values: HashMap<Selector, String>,
    submissions: HashMap<Selector, SubmissionScript>,
    login: Option<LoginScript>,
    logged_in: bool,
    page_text: String,
    history: Vec<Call>,
    dialog_hook: Option<DialogInterceptor>,
}

impl ScriptState {
    fn matches(&self, selector: &Selector, lookup: usize) -> Vec<bool> {
        if let Some(login) = &self.login {
            if *selector == login.selectors.marker || *selector == login.sign_out {
                return if self.logged_in { vec![true] } else { Vec::new() };
            }
            let form = [
                &login.selectors.username_field,
                &login.selectors.password_field,
                &login.selectors.submit,
            ];
            if form.contains(&selector) {
                return if self.logged_in { Vec::new() } else { vec![true] };
            }
        }

        match self.elements.get(selector) {
            Some(schedule) if lookup > schedule.appears_after => schedule.visibility.clone(),
            _ => Vec::new(),
        }
    }

    fn apply(&mut self, selector: &Selector, verb: &Verb) {
        match verb {
            Verb::Type(text) => self.values.entry(selector.clone()).or_default().push_str(text),
            Verb::Clear => {
                let _ = self.values.insert(selector.clone(), String::new());
            }
            Verb::Select(index) => {
                let _ = self.values.insert(selector.clone(), index.to_string());
            }
            Verb::Click => self.click(selector),
        }
    }

    fn click(&mut self, selector: &Selector) {
        if let Some(script) = self.submissions.get_mut(selector) {
            if script.failures > 0 {
                script.failures -= 1;
                self.page_text = script.error_text.clone();
            } else {
                self.page_text = script.success_text.clone();
            }
            return;
        }

        let Some(login) = self.login.clone() else {
            return;
        };
        if *selector == login.selectors.submit && !self.logged_in {
            let typed = |field: &Selector| self.values.get(field).cloned().unwrap_or_default();
            let accepted = login.credentials.as_ref().map_or(true, |(user, pass)| {
                typed(&login.selectors.username_field) == *user
                    && typed(&login.selectors.password_field) == *pass
            });
            if accepted {
                self.logged_in = true;
                self.page_text = login.welcome_text;
            } else {
                self.page_text = login.failure_text;
            }
        } else if *selector == login.sign_out && self.logged_in {
            self.logged_in = false;
            self.page_text = "Customer Login".to_string();
        }
    }
}

/// Scripted in-memory interface.
///
/// Clones share state, so a test can keep a handle while a scenario owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    /// Create an empty interface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> HealResult<MutexGuard<'_, ScriptState>> {
        self.state
            .lock()
            .map_err(|_| HealError::driver("scripted interface state poisoned"))
    }

    fn configure(self, f: impl FnOnce(&mut ScriptState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    /// Add a visible element present from the first lookup
    #[must_use]
    pub fn with_element(self, selector: Selector) -> Self {
        self.with_element_visibility(selector, vec![true])
    }

    /// Add a visible element that matches nothing for the first `lookups` queries
    #[must_use]
    pub fn with_delayed_element(self, selector: Selector, lookups: usize) -> Self {
        self.with_scheduled_element(selector, vec![true], lookups)
    }

    /// Add one element per entry, in order, with the given visibility
    #[must_use]
    pub fn with_element_visibility(self, selector: Selector, visibility: Vec<bool>) -> Self {
        self.with_scheduled_element(selector, visibility, 0)
    }

    /// Add elements with the given visibility that render after `lookups` empty queries
    #[must_use]
    pub fn with_scheduled_element(
        self,
        selector: Selector,
        visibility: Vec<bool>,
        lookups: usize,
    ) -> Self {
        self.configure(|s| {
            let _ = s.elements.insert(
                selector,
                ElementSchedule {
                    visibility,
                    appears_after: lookups,
                },
            );
        })
    }

    /// Make the next `times` interactions with `selector` fail
    #[must_use]
    pub fn with_failing_action(self, selector: Selector, times: usize) -> Self {
        self.configure(|s| {
            let _ = s.failing_actions.insert(selector, times);
        })
    }

    /// Make the next `times` lookups fail regardless of selector
    #[must_use]
    pub fn with_failing_lookups(self, times: usize) -> Self {
        self.configure(|s| s.failing_lookups = times)
    }

    /// Add a submit control reacting per `script`
    #[must_use]
    pub fn with_submission(self, selector: Selector, script: SubmissionScript) -> Self {
        self.with_element(selector.clone()).configure(|s| {
            let _ = s.submissions.insert(selector, script);
        })
    }

    /// Install a login form
    #[must_use]
    pub fn with_login(self, login: LoginScript) -> Self {
        self.configure(|s| {
            s.logged_in = login.logged_in;
            if login.logged_in {
                s.page_text = login.welcome_text.clone();
            }
            s.login = Some(login);
        })
    }

    /// Expire or restore the session
    pub fn set_logged_in(&self, logged_in: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.logged_in = logged_in;
        }
    }

    /// Whether the session marker is currently rendered
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.lock().map(|s| s.logged_in).unwrap_or(false)
    }

    /// Current page text without recording a call
    #[must_use]
    pub fn page_text(&self) -> String {
        self.state
            .lock()
            .map(|s| s.page_text.clone())
            .unwrap_or_default()
    }

    /// Value typed or selected into a field
    #[must_use]
    pub fn field_value(&self, selector: &Selector) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.values.get(selector).cloned())
    }

    /// Raise a dialog through the installed hook.
    ///
    /// Without a hook the interface default (dismiss) applies.
    pub fn raise_dialog(&self, event: DialogEvent) -> DialogResponse {
        let hook = self.state.lock().ok().and_then(|s| s.dialog_hook.clone());
        let response = hook.map_or(DialogResponse::Dismiss, |h| h.handle(event.clone()));
        if let Ok(mut s) = self.state.lock() {
            s.history.push(Call::Dialog { event, response });
        }
        response
    }

    /// Every recorded call
    #[must_use]
    pub fn history(&self) -> Vec<Call> {
        self.state
            .lock()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Successful interactions, in order
    #[must_use]
    pub fn actions(&self) -> Vec<Call> {
        self.history()
            .into_iter()
            .filter(|c| matches!(c, Call::Act { .. }))
            .collect()
    }

    /// Successful interactions with one selector
    #[must_use]
    pub fn actions_on(&self, selector: &Selector) -> Vec<Call> {
        self.actions()
            .into_iter()
            .filter(|c| matches!(c, Call::Act { selector: s, .. } if s == selector))
            .collect()
    }

    /// Number of lookups of one selector
    #[must_use]
    pub fn lookups(&self, selector: &Selector) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.lookups.get(selector).copied())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    type Element = ScriptedElement;

    async fn find(&self, selector: &Selector) -> HealResult<Vec<ScriptedElement>> {
        let mut state = self.state()?;
        if state.failing_lookups > 0 {
            state.failing_lookups -= 1;
            return Err(HealError::driver("page not ready"));
        }

        let lookup = {
            let count = state.lookups.entry(selector.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let elements: Vec<ScriptedElement> = state
            .matches(selector, lookup)
            .into_iter()
            .enumerate()
            .map(|(index, visible)| ScriptedElement {
                selector: selector.clone(),
                index,
                visible,
            })
            .collect();

        state.history.push(Call::Find {
            selector: selector.clone(),
            matched: elements.len(),
        });
        Ok(elements)
    }

    async fn is_visible(&self, element: &ScriptedElement) -> HealResult<bool> {
        Ok(element.visible)
    }

    async fn act_on(&self, element: &ScriptedElement, verb: &Verb, force: bool) -> HealResult<()> {
        let mut state = self.state()?;
        if let Some(remaining) = state.failing_actions.get_mut(&element.selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HealError::driver("element detached from DOM"));
            }
        }
        if !force && !element.visible {
            return Err(HealError::driver(format!(
                "element {} is not visible",
                element.selector
            )));
        }

        state.history.push(Call::Act {
            selector: element.selector.clone(),
            index: element.index,
            verb: verb.clone(),
            force,
        });
        state.apply(&element.selector, verb);
        Ok(())
    }

    async fn current_text(&self) -> HealResult<String> {
        let mut state = self.state()?;
        state.history.push(Call::Text);
        Ok(state.page_text.clone())
    }

    async fn install_dialog_hook(&self, interceptor: DialogInterceptor) -> HealResult<()> {
        self.state()?.dialog_hook = Some(interceptor);
        Ok(())
    }

    fn remove_dialog_hook(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.dialog_hook = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dialog::ResponsePolicy;

    mod element_tests {
        use super::*;

        #[tokio::test]
        async fn test_unknown_selector_matches_nothing() {
            let driver = ScriptedDriver::new();
            assert!(driver.find(&Selector::css("#nope")).await.unwrap().is_empty());
            assert_eq!(driver.lookups(&Selector::css("#nope")), 1);
        }

        #[tokio::test]
        async fn test_delayed_element_appears() {
            let sel = Selector::css("#late");
            let driver = ScriptedDriver::new().with_delayed_element(sel.clone(), 2);
            assert!(driver.find(&sel).await.unwrap().is_empty());
            assert!(driver.find(&sel).await.unwrap().is_empty());
            assert_eq!(driver.find(&sel).await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_hidden_element_rejects_unforced_action() {
            let sel = Selector::css("#hidden");
            let driver = ScriptedDriver::new().with_element_visibility(sel.clone(), vec![false]);
            let element = driver.find(&sel).await.unwrap().remove(0);
            assert!(!driver.is_visible(&element).await.unwrap());
            assert!(driver.act_on(&element, &Verb::Click, false).await.is_err());
            assert!(driver.act_on(&element, &Verb::Click, true).await.is_ok());
        }

        #[tokio::test]
        async fn test_type_and_clear() {
            let sel = Selector::css("input[name=\"amount\"]");
            let driver = ScriptedDriver::new().with_element(sel.clone());
            let element = driver.find(&sel).await.unwrap().remove(0);
            driver.act_on(&element, &Verb::type_text("5"), true).await.unwrap();
            driver.act_on(&element, &Verb::type_text("0"), true).await.unwrap();
            assert_eq!(driver.field_value(&sel).as_deref(), Some("50"));
            driver.act_on(&element, &Verb::Clear, true).await.unwrap();
            assert_eq!(driver.field_value(&sel).as_deref(), Some(""));
        }
    }

    mod login_tests {
        use super::*;

        #[tokio::test]
        async fn test_login_flips_marker() {
            let selectors = SessionSelectors::default();
            let driver = ScriptedDriver::new()
                .with_login(LoginScript::new().with_credentials("john", "demo"));
            assert!(driver.find(&selectors.marker).await.unwrap().is_empty());

            for (field, text) in [
                (&selectors.username_field, "john"),
                (&selectors.password_field, "demo"),
            ] {
                let el = driver.find(field).await.unwrap().remove(0);
                driver.act_on(&el, &Verb::type_text(text), true).await.unwrap();
            }
            let submit = driver.find(&selectors.submit).await.unwrap().remove(0);
            driver.act_on(&submit, &Verb::Click, true).await.unwrap();

            assert!(driver.is_logged_in());
            assert_eq!(driver.find(&selectors.marker).await.unwrap().len(), 1);
            assert_eq!(driver.current_text().await.unwrap(), "Accounts Overview");
        }

        #[tokio::test]
        async fn test_wrong_credentials_show_error() {
            let selectors = SessionSelectors::default();
            let driver = ScriptedDriver::new()
                .with_login(LoginScript::new().with_credentials("john", "demo"));
            let submit = driver.find(&selectors.submit).await.unwrap().remove(0);
            driver.act_on(&submit, &Verb::Click, true).await.unwrap();
            assert!(!driver.is_logged_in());
            assert!(driver.page_text().contains("Error"));
        }

        #[tokio::test]
        async fn test_sign_out_removes_marker() {
            let selectors = SessionSelectors::default();
            let driver = ScriptedDriver::new().with_login(LoginScript::new().logged_in(true));
            let link = driver.find(&selectors.marker).await.unwrap().remove(0);
            driver.act_on(&link, &Verb::Click, true).await.unwrap();
            assert!(!driver.is_logged_in());
            assert!(driver.find(&selectors.marker).await.unwrap().is_empty());
        }
    }

    mod submission_tests {
        use super::*;

        #[tokio::test]
        async fn test_submission_fails_then_succeeds() {
            let sel = Selector::css("input[type=\"submit\"]");
            let driver =
                ScriptedDriver::new().with_submission(sel.clone(), SubmissionScript::failing(1));
            let button = driver.find(&sel).await.unwrap().remove(0);
            driver.act_on(&button, &Verb::Click, true).await.unwrap();
            assert!(driver.current_text().await.unwrap().contains("Error"));
            driver.act_on(&button, &Verb::Click, true).await.unwrap();
            assert_eq!(driver.current_text().await.unwrap(), "Transfer Complete!");
        }
    }

    mod dialog_tests {
        use super::*;

        #[tokio::test]
        async fn test_dialog_without_hook_is_dismissed() {
            let driver = ScriptedDriver::new();
            assert_eq!(
                driver.raise_dialog(DialogEvent::confirm("Sure?")),
                DialogResponse::Dismiss
            );
        }

        #[tokio::test]
        async fn test_dialog_routed_through_hook() {
            let driver = ScriptedDriver::new();
            let interceptor = DialogInterceptor::new();
            interceptor.register(ResponsePolicy::default());
            driver.install_dialog_hook(interceptor.clone()).await.unwrap();
            assert_eq!(
                driver.raise_dialog(DialogEvent::confirm("Sure?")),
                DialogResponse::Accept
            );
            assert_eq!(interceptor.dialog_count(), 1);
            assert!(matches!(driver.history().last(), Some(Call::Dialog { .. })));
        }

        #[tokio::test]
        async fn test_removed_hook_stops_routing() {
            let driver = ScriptedDriver::new();
            let interceptor = DialogInterceptor::new();
            interceptor.register(ResponsePolicy::default());
            driver.install_dialog_hook(interceptor.clone()).await.unwrap();
            driver.remove_dialog_hook();
            assert_eq!(
                driver.raise_dialog(DialogEvent::confirm("Sure?")),
                DialogResponse::Dismiss
            );
            assert_eq!(interceptor.dialog_count(), 0);
        }
    }
}
