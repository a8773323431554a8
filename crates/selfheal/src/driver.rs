//! Driver - the interface the recovery layer acts through
//!
//! A driver bundles the consumed capabilities: the element locator
//! (`find` / `act_on`), text inspection (`current_text`) and the dialog hook.
//!
//! # Implementations
//!
//! - [`ScriptedDriver`](crate::mock::ScriptedDriver) - in-memory interface for tests and simulation
//! - `CdpDriver` - Chromium over CDP via chromiumoxide (`browser` feature)

use crate::dialog::DialogInterceptor;
use crate::result::HealResult;
use crate::selector::Selector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Interaction performed on a located element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Click the element
    Click,
    /// Type text into the element
    Type(String),
    /// Clear the element's value
    Clear,
    /// Select the option at an index
    Select(usize),
}

impl Verb {
    /// Create a type verb
    #[must_use]
    pub fn type_text(text: impl Into<String>) -> Self {
        Self::Type(text.into())
    }

    /// Short verb name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type(_) => "type",
            Self::Clear => "clear",
            Self::Select(_) => "select",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click | Self::Clear => write!(f, "{}", self.name()),
            // typed text may be a password
            Self::Type(text) => write!(f, "type({} chars)", text.chars().count()),
            Self::Select(index) => write!(f, "select({index})"),
        }
    }
}

/// Abstract driver trait for the interface under automation
#[async_trait]
pub trait Driver: Send + Sync {
    /// Handle to a located element
    type Element: Send + Sync;

    /// Currently matching elements in document order (may be empty)
    async fn find(&self, selector: &Selector) -> HealResult<Vec<Self::Element>>;

    /// Whether the element is visible and interactable
    async fn is_visible(&self, element: &Self::Element) -> HealResult<bool>;

    /// Perform a verb on an element, bypassing interactability checks when `force` is set
    async fn act_on(&self, element: &Self::Element, verb: &Verb, force: bool) -> HealResult<()>;

    /// Snapshot of the rendered interface text
    async fn current_text(&self) -> HealResult<String>;

    /// Route unsolicited dialogs through the interceptor.
    ///
    /// Drivers that cannot observe dialogs keep this default, which leaves
    /// the interface's own dialog behaviour in place.
    async fn install_dialog_hook(&self, interceptor: DialogInterceptor) -> HealResult<()> {
        warn!(
            registered = interceptor.is_registered(),
            "driver has no dialog hook; dialogs will not be auto-answered"
        );
        Ok(())
    }

    /// Stop routing dialogs to the interceptor installed last
    fn remove_dialog_hook(&self) {}
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Arc<D> {
    type Element = D::Element;

    async fn find(&self, selector: &Selector) -> HealResult<Vec<Self::Element>> {
        (**self).find(selector).await
    }

    async fn is_visible(&self, element: &Self::Element) -> HealResult<bool> {
        (**self).is_visible(element).await
    }

    async fn act_on(&self, element: &Self::Element, verb: &Verb, force: bool) -> HealResult<()> {
        (**self).act_on(element, verb, force).await
    }

    async fn current_text(&self) -> HealResult<String> {
        (**self).current_text().await
    }

    async fn install_dialog_hook(&self, interceptor: DialogInterceptor) -> HealResult<()> {
        (**self).install_dialog_hook(interceptor).await
    }

    fn remove_dialog_hook(&self) {
        (**self).remove_dialog_hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_names() {
        assert_eq!(Verb::Click.name(), "click");
        assert_eq!(Verb::type_text("john").name(), "type");
        assert_eq!(Verb::Clear.name(), "clear");
        assert_eq!(Verb::Select(1).name(), "select");
    }

    #[test]
    fn test_type_display_hides_text() {
        let verb = Verb::type_text("demo");
        assert_eq!(verb.to_string(), "type(4 chars)");
        assert!(!verb.to_string().contains("demo"));
        assert_eq!(Verb::Select(2).to_string(), "select(2)");
    }

    /// Driver without dialog support
    struct Blank;

    #[async_trait]
    impl Driver for Blank {
        type Element = ();

        async fn find(&self, _selector: &Selector) -> HealResult<Vec<()>> {
            Ok(Vec::new())
        }

        async fn is_visible(&self, _element: &()) -> HealResult<bool> {
            Ok(false)
        }

        async fn act_on(&self, _element: &(), _verb: &Verb, _force: bool) -> HealResult<()> {
            Ok(())
        }

        async fn current_text(&self) -> HealResult<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_default_dialog_hook_leaves_interceptor_untouched() {
        let interceptor = DialogInterceptor::new();
        let driver = Arc::new(Blank);
        assert!(driver.install_dialog_hook(interceptor.clone()).await.is_ok());
        driver.remove_dialog_hook();
        assert!(!interceptor.is_registered());
        assert_eq!(interceptor.dialog_count(), 0);
    }
}
