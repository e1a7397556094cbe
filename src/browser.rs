//! Headless Chrome implementation of `PageDriver`.
//!
//! headless_chrome is blocking; callers run the whole page loop on a blocking
//! thread.

use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::BrowserConfig;
use crate::page::{PageDriver, PageError, PageFactory};

/// How long Chrome may sit without CDP traffic before headless_chrome drops it.
/// Pagination pauses and idle waits can be long.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

const IDLE_PROBE_JS: &str =
    "JSON.stringify([document.readyState === 'complete', performance.getEntriesByType('resource').length])";

/// A launched Chrome process. Each `open_page` call opens a new tab.
pub struct ChromeBrowser {
    browser: Browser,
    navigation_timeout: Duration,
}

impl ChromeBrowser {
    /// Launch Chrome. The sandbox is disabled when running inside a container
    /// (detected via /.dockerenv or BRANDMARK_CONTAINER).
    pub fn launch(config: &BrowserConfig, headless: bool) -> anyhow::Result<Self> {
        let is_container = std::env::var("BRANDMARK_CONTAINER").is_ok()
            || std::path::Path::new("/.dockerenv").exists();

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(!is_container)
            .window_size(Some((config.window_width, config.window_height)))
            .path(config.chrome_binary())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build Chrome launch options: {}", e))?;

        let browser = Browser::new(options)
            .map_err(|e| anyhow::anyhow!("Failed to launch Chrome (headless: {}): {}", headless, e))?;

        debug!("Launched Chrome (headless: {}, container: {})", headless, is_container);

        Ok(Self {
            browser,
            navigation_timeout: config.navigation_timeout(),
        })
    }
}

impl PageFactory for ChromeBrowser {
    type Page = ChromePage;

    fn open_page(&self) -> Result<ChromePage, PageError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| PageError::Open(e.to_string()))?;
        tab.set_default_timeout(self.navigation_timeout);
        Ok(ChromePage { tab })
    }
}

/// One Chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn eval(&self, script: &str) -> Result<Option<Value>, PageError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| PageError::Script(e.to_string()))?;
        Ok(result.value.filter(|v| !v.is_null()))
    }

    /// Evaluate a script that returns `JSON.stringify(...)` and decode it.
    fn eval_json<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, PageError> {
        let raw = self
            .eval(script)?
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| PageError::Script("script returned no JSON".to_string()))?;
        serde_json::from_str(&raw).map_err(|e| PageError::Script(e.to_string()))
    }
}

/// Quote a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn find_button_js(label: &str, action: &str) -> String {
    format!(
        r#"(function(label) {{
            label = label.toUpperCase();
            const button = Array.from(document.querySelectorAll('button')).find(
                b => b.getClientRects().length > 0 && (b.innerText || '').toUpperCase().includes(label)
            );
            {action}
        }})({label})"#,
        label = js_str(label),
        action = action,
    )
}

impl PageDriver for ChromePage {
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        let navigation_error = |e: anyhow::Error| PageError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };
        self.tab.navigate_to(url).map_err(navigation_error)?;
        self.tab.wait_until_navigated().map_err(navigation_error)?;
        Ok(())
    }

    fn wait_for_network_idle(&self, timeout: Duration, quiet: Duration) -> Result<(), PageError> {
        let started = Instant::now();
        let mut last_count: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            let (complete, count): (bool, u64) = self.eval_json(IDLE_PROBE_JS)?;

            if complete && last_count == Some(count) {
                if stable_since.elapsed() >= quiet {
                    debug!("Network idle after {:?} ({} resources)", started.elapsed(), count);
                    return Ok(());
                }
            } else {
                last_count = Some(count);
                stable_since = Instant::now();
            }

            if started.elapsed() >= timeout {
                return Err(PageError::IdleTimeout(timeout));
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn click(&self, selector: &str) -> Result<(), PageError> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|_| PageError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .map_err(|e| PageError::Browser(e.to_string()))?;
        Ok(())
    }

    fn is_button_visible(&self, label: &str) -> Result<bool, PageError> {
        let script = find_button_js(label, "return button !== undefined;");
        Ok(self.eval(&script)?.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn click_button(&self, label: &str) -> Result<(), PageError> {
        let script = find_button_js(
            label,
            "if (!button) { return false; } button.scrollIntoView({block: 'center'}); button.click(); return true;",
        );
        match self.eval(&script)?.and_then(|v| v.as_bool()) {
            Some(true) => Ok(()),
            _ => Err(PageError::ElementNotFound(format!("button \"{}\"", label))),
        }
    }

    fn attributes(&self, selector: &str, names: &[&str]) -> Result<Vec<Vec<Option<String>>>, PageError> {
        let names_json = serde_json::to_string(names).map_err(|e| PageError::Script(e.to_string()))?;
        let script = format!(
            r#"(function(selector, names) {{
                return JSON.stringify(Array.from(document.querySelectorAll(selector)).map(
                    el => names.map(n => el.getAttribute(n))
                ));
            }})({}, {})"#,
            js_str(selector),
            names_json,
        );
        self.eval_json(&script)
    }

    fn click_nth(&self, selector: &str, index: usize) -> Result<(), PageError> {
        let elements = self
            .tab
            .find_elements(selector)
            .map_err(|_| PageError::ElementNotFound(selector.to_string()))?;
        let element = elements
            .get(index)
            .ok_or_else(|| PageError::ElementNotFound(format!("{} [{}]", selector, index)))?;
        element
            .click()
            .map_err(|e| PageError::Browser(e.to_string()))?;
        Ok(())
    }

    fn html(&self) -> Result<String, PageError> {
        self.tab
            .get_content()
            .map_err(|e| PageError::Browser(e.to_string()))
    }

    fn title(&self) -> Result<String, PageError> {
        self.tab
            .get_title()
            .map_err(|e| PageError::Browser(e.to_string()))
    }

    fn inner_text(&self, root: &str, exclude: &[String]) -> Result<Option<String>, PageError> {
        let exclude_json = serde_json::to_string(exclude).map_err(|e| PageError::Script(e.to_string()))?;
        let script = format!(
            r#"(function(root, exclude) {{
                const element = document.querySelector(root);
                if (!element) {{ return null; }}
                const copy = element.cloneNode(true);
                exclude.forEach(sel => copy.querySelectorAll(sel).forEach(n => n.remove()));
                return copy.innerText;
            }})({}, {})"#,
            js_str(root),
            exclude_json,
        );
        Ok(self
            .eval(&script)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn tag_name_containing(&self, text: &str) -> Result<Option<String>, PageError> {
        let script = format!(
            r#"(function(needle) {{
                needle = needle.toLowerCase();
                const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
                let node;
                while ((node = walker.nextNode())) {{
                    const parent = node.parentElement;
                    if (!parent || ['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(parent.tagName)) {{ continue; }}
                    if (node.textContent.toLowerCase().includes(needle)) {{ return parent.tagName; }}
                }}
                return null;
            }})({})"#,
            js_str(text),
        );
        Ok(self
            .eval(&script)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn close(&mut self) -> Result<(), PageError> {
        self.tab
            .close(true)
            .map_err(|e| PageError::Browser(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(js_str(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(js_str("it's"), r#""it's""#);
    }

    #[test]
    fn test_find_button_js_embeds_label() {
        let script = find_button_js("LOAD MORE", "return true;");
        assert!(script.contains(r#"("LOAD MORE")"#));
        assert!(script.contains("return true;"));
    }

    #[test]
    fn test_find_button_js_counts_fixed_buttons_as_visible() {
        let script = find_button_js("LOAD MORE", "return true;");
        assert!(script.contains("b.getClientRects().length > 0"));
        assert!(!script.contains("offsetParent"));
    }
}
