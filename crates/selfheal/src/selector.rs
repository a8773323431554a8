//! Selectors identifying interface elements.
//!
//! The recovery layer treats a selector as opaque: it only hands it to the
//! [`Driver`](crate::Driver) and prints it in logs and errors. Drivers decide
//! how each engine is resolved.
//!
//! The string form uses Playwright-style engine prefixes:
//!
//! | String                      | Selector                 |
//! |-----------------------------|--------------------------|
//! | `text=Log In`               | `Selector::Text`         |
//! | `xpath=//a[@id='x']`        | `Selector::XPath`        |
//! | `data-testid=submit`        | `Selector::TestId`       |
//! | `a[href*="logout.htm"]`     | `Selector::Css`          |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TEXT_PREFIX: &str = "text=";
const XPATH_PREFIX: &str = "xpath=";
const TEST_ID_PREFIX: &str = "data-testid=";

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    /// CSS selector (e.g., `input[name="username"]`)
    Css(String),
    /// XPath selector
    XPath(String),
    /// Text content selector
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Raw selector value without the engine prefix
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) | Self::Text(s) | Self::TestId(s) => s,
        }
    }

    /// Whether the selector carries no query at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value().trim().is_empty()
    }

    /// Translate non-CSS engines to an XPath expression.
    ///
    /// Text matches either element text or a submit-style `value` attribute, so
    /// `text=Log In` also finds `<input type="submit" value="Log In">`.
    #[must_use]
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Self::Css(_) => None,
            Self::XPath(s) => Some(s.clone()),
            Self::Text(t) => {
                let lit = xpath_literal(t);
                Some(format!(
                    "//*[contains(normalize-space(text()), {lit}) or @value={lit}]"
                ))
            }
            Self::TestId(id) => Some(format!("//*[@data-testid={}]", xpath_literal(id))),
        }
    }
}

/// Quote a string for use inside an XPath expression
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "{s}"),
            Self::XPath(s) => write!(f, "{XPATH_PREFIX}{s}"),
            Self::Text(s) => write!(f, "{TEXT_PREFIX}{s}"),
            Self::TestId(s) => write!(f, "{TEST_ID_PREFIX}{s}"),
        }
    }
}

impl From<String> for Selector {
    fn from(raw: String) -> Self {
        if let Some(rest) = raw.strip_prefix(TEXT_PREFIX) {
            Self::Text(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix(XPATH_PREFIX) {
            Self::XPath(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix(TEST_ID_PREFIX) {
            Self::TestId(rest.to_string())
        } else {
            Self::Css(raw)
        }
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}
