//! Chromium driver over the DevTools protocol.
//!
//! Only compiled with the `browser` feature. CSS selectors go through
//! `querySelectorAll`; every other engine is translated to XPath.

#![allow(clippy::missing_errors_doc)]

use crate::dialog::{DialogEvent, DialogInterceptor, DialogKind};
use crate::driver::{Driver, Verb};
use crate::result::{HealError, HealResult};
use crate::selector::Selector;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const IS_VISIBLE_JS: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    const s = window.getComputedStyle(this); \
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; \
}";

const FORCE_CLICK_JS: &str = "function() { this.click(); }";

const CLEAR_JS: &str = "function() { \
    this.value = ''; \
    this.dispatchEvent(new Event('input', { bubbles: true })); \
}";

fn cdp_err(e: impl Display) -> HealError {
    HealError::driver(e.to_string())
}

/// How a selector is resolved in the page
#[derive(Debug, Clone, PartialEq, Eq)]
enum Query {
    Css(String),
    XPath(String),
}

impl From<&Selector> for Query {
    fn from(selector: &Selector) -> Self {
        match selector.to_xpath() {
            Some(xpath) => Self::XPath(xpath),
            None => Self::Css(selector.value().to_string()),
        }
    }
}

/// Browser launch options
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Keep the Chromium sandbox enabled
    pub sandbox: bool,
    /// Chromium executable, if not on the default path
    pub chromium_path: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
        }
    }
}

/// [`Driver`] over a Chromium page
pub struct CdpDriver {
    page: Page,
    browser: Option<Arc<tokio::sync::Mutex<Browser>>>,
    handler: Option<JoinHandle<()>>,
    dialog_task: Mutex<Option<JoinHandle<()>>>,
}

impl CdpDriver {
    /// Launch Chromium and open a blank page
    pub async fn launch(options: LaunchOptions) -> HealResult<Self> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(cdp_err)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;
        Ok(Self {
            page,
            browser: Some(Arc::new(tokio::sync::Mutex::new(browser))),
            handler: Some(handler),
            dialog_task: Mutex::new(None),
        })
    }

    /// Drive an existing page
    #[must_use]
    pub fn from_page(page: Page) -> Self {
        Self {
            page,
            browser: None,
            handler: None,
            dialog_task: Mutex::new(None),
        }
    }

    /// The underlying page
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate and wait for the load to finish
    pub async fn goto(&self, url: &str) -> HealResult<()> {
        let _ = self.page.goto(url).await.map_err(cdp_err)?;
        Ok(())
    }

    /// Close the browser if this driver launched it
    pub async fn close(mut self) -> HealResult<()> {
        self.stop_dialog_task();
        if let Some(browser) = self.browser.take() {
            let _ = browser.lock().await.close().await.map_err(cdp_err)?;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        Ok(())
    }

    fn stop_dialog_task(&self) {
        if let Ok(mut task) = self.dialog_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }

    async fn call_bool(&self, element: &Element, function: &str) -> HealResult<bool> {
        let returns = element
            .call_js_fn(function, false)
            .await
            .map_err(cdp_err)?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

impl std::fmt::Debug for CdpDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpDriver")
            .field("owns_browser", &self.browser.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for CdpDriver {
    type Element = Element;

    async fn find(&self, selector: &Selector) -> HealResult<Vec<Element>> {
        let found = match Query::from(selector) {
            Query::Css(css) => self.page.find_elements(css).await,
            Query::XPath(xpath) => self.page.find_xpaths(xpath).await,
        };
        found.map_err(cdp_err)
    }

    async fn is_visible(&self, element: &Element) -> HealResult<bool> {
        self.call_bool(element, IS_VISIBLE_JS).await
    }

    async fn act_on(&self, element: &Element, verb: &Verb, force: bool) -> HealResult<()> {
        match verb {
            Verb::Click if force => {
                let _ = element
                    .call_js_fn(FORCE_CLICK_JS, false)
                    .await
                    .map_err(cdp_err)?;
            }
            Verb::Click => {
                let _ = element.click().await.map_err(cdp_err)?;
            }
            Verb::Type(text) => {
                let _ = element.focus().await.map_err(cdp_err)?;
                let _ = element.type_str(text).await.map_err(cdp_err)?;
            }
            Verb::Clear => {
                let _ = element.call_js_fn(CLEAR_JS, false).await.map_err(cdp_err)?;
            }
            Verb::Select(index) => {
                let select = format!(
                    "function() {{ this.selectedIndex = {index}; \
                     this.dispatchEvent(new Event('change', {{ bubbles: true }})); }}"
                );
                let _ = element.call_js_fn(select, false).await.map_err(cdp_err)?;
            }
        }
        Ok(())
    }

    async fn current_text(&self) -> HealResult<String> {
        self.page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(cdp_err)?
            .into_value::<String>()
            .map_err(cdp_err)
    }

    async fn install_dialog_hook(&self, interceptor: DialogInterceptor) -> HealResult<()> {
        let mut events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(cdp_err)?;
        let page = self.page.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let kind = match event.r#type {
                    DialogType::Alert => DialogKind::Alert,
                    DialogType::Confirm => DialogKind::Confirm,
                    ref other => {
                        debug!(?other, "dismissing unhandled dialog kind");
                        let _ = page.execute(HandleJavaScriptDialogParams::new(false)).await;
                        continue;
                    }
                };
                let response = interceptor.handle(DialogEvent {
                    kind,
                    text: event.message.clone(),
                });
                let params = HandleJavaScriptDialogParams::new(response.is_accept());
                if let Err(e) = page.execute(params).await {
                    warn!(error = %e, "failed to respond to dialog");
                }
            }
        });

        // re-installation replaces the listener instead of stacking a second one
        self.stop_dialog_task();
        if let Ok(mut slot) = self.dialog_task.lock() {
            *slot = Some(task);
        }
        Ok(())
    }

    fn remove_dialog_hook(&self) {
        self.stop_dialog_task();
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        self.stop_dialog_task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_is_queried_directly() {
        let query = Query::from(&Selector::css("input[name=\"username\"]"));
        assert_eq!(query, Query::Css("input[name=\"username\"]".to_string()));
    }

    #[test]
    fn test_text_becomes_xpath() {
        let query = Query::from(&Selector::text("Log In"));
        assert!(matches!(query, Query::XPath(x) if x.contains("'Log In'")));
    }

    #[test]
    fn test_test_id_becomes_xpath() {
        let query = Query::from(&Selector::test_id("submit"));
        assert_eq!(query, Query::XPath("//*[@data-testid='submit']".to_string()));
    }

    #[test]
    fn test_default_launch_is_headless() {
        let options = LaunchOptions::default();
        assert!(options.headless);
        assert!(options.sandbox);
    }
}
