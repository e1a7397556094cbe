//! A single page under test.
//!
//! `PageDriver` is the seam to the browser: a handful of primitives that the
//! headless Chrome tab in `browser` implements. `PageSession` builds the
//! readiness heuristics (banner dismissal, "load more" pagination, accordion
//! expansion) and content extraction on top of it.

use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::datalayer::{classify_scripts, Classification};
use crate::scanner::{MetaTag, UNKNOWN_TAG};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("Failed to open page: {0}")]
    Open(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {0:?} waiting for the network to go idle")]
    IdleTimeout(Duration),

    #[error("No element matches '{0}'")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

/// Browser primitives needed by a page session.
pub trait PageDriver {
    fn navigate(&mut self, url: &str) -> Result<(), PageError>;

    /// Block until no network activity has been seen for `quiet`, or fail
    /// with `IdleTimeout` after `timeout`.
    fn wait_for_network_idle(&self, timeout: Duration, quiet: Duration) -> Result<(), PageError>;

    fn pause(&self, duration: Duration);

    /// Click the first element matching a CSS selector.
    fn click(&self, selector: &str) -> Result<(), PageError>;

    /// Whether a visible `<button>` whose text contains `label` (case-insensitive) exists.
    fn is_button_visible(&self, label: &str) -> Result<bool, PageError>;

    /// Click the first visible `<button>` whose text contains `label`.
    fn click_button(&self, label: &str) -> Result<(), PageError>;

    /// For each element matching `selector`, the values of the named attributes.
    fn attributes(&self, selector: &str, names: &[&str]) -> Result<Vec<Vec<Option<String>>>, PageError>;

    /// Click the `index`-th element matching `selector`.
    fn click_nth(&self, selector: &str, index: usize) -> Result<(), PageError>;

    /// The current rendered DOM as HTML.
    fn html(&self) -> Result<String, PageError>;

    fn title(&self) -> Result<String, PageError>;

    /// `innerText` of a copy of the first `root` element with every `exclude`
    /// match removed. `None` if `root` is absent.
    fn inner_text(&self, root: &str, exclude: &[String]) -> Result<Option<String>, PageError>;

    /// Tag name of the innermost element whose text contains `text`
    /// (case-insensitive).
    fn tag_name_containing(&self, text: &str) -> Result<Option<String>, PageError>;

    fn close(&mut self) -> Result<(), PageError>;
}

/// Produces a fresh page (tab) per URL.
pub trait PageFactory {
    type Page: PageDriver;

    fn open_page(&self) -> Result<Self::Page, PageError>;
}

/// Why pagination expansion stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStop {
    /// The terminal ("see less") button appeared.
    TerminalButton,
    /// No "load more" button is visible.
    NoLoadMore,
    /// The configured click cap was reached.
    ClickLimit,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOutcome {
    pub clicks: usize,
    pub stopped_by: PaginationStop,
}

/// Meta tags with content, plus the document title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaSnapshot {
    pub tags: Vec<MetaTag>,
    pub title: Option<String>,
}

pub struct PageSession<'a, D: PageDriver> {
    driver: D,
    config: &'a AppConfig,
}

impl<'a, D: PageDriver> PageSession<'a, D> {
    pub fn new(driver: D, config: &'a AppConfig) -> Self {
        Self { driver, config }
    }

    pub fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        debug!("Navigating to {}", url);
        self.driver.navigate(url)
    }

    /// Wait for network idle. A timeout is returned to the caller to log; the
    /// page stays usable.
    pub fn wait_until_idle(&self) -> Result<(), PageError> {
        self.driver.wait_for_network_idle(
            self.config.browser.network_idle_timeout(),
            self.config.browser.network_idle_quiet(),
        )
    }

    /// Best-effort click on a cookie or popup banner.
    pub fn dismiss(&self, selector: &str) -> bool {
        match self.driver.click(selector) {
            Ok(()) => {
                debug!("Dismissed banner '{}'", selector);
                true
            }
            Err(e) => {
                debug!("Could not find or click '{}': {}", selector, e);
                false
            }
        }
    }

    /// Dismiss the configured cookie banner and popups. Returns how many were closed.
    pub fn dismiss_banners(&self) -> usize {
        let page = &self.config.page;
        std::iter::once(&page.cookie_selector)
            .chain(page.popup_selectors.iter())
            .filter(|s| !s.is_empty())
            .filter(|s| self.dismiss(s))
            .count()
    }

    /// Keep clicking "load more" until the terminal button shows up, the
    /// load-more button disappears, or the click cap is hit.
    pub fn expand_pagination(&self) -> PaginationOutcome {
        let pagination = &self.config.pagination;
        let mut clicks = 0;

        let stopped_by = loop {
            self.driver.pause(pagination.settle());

            match self.driver.is_button_visible(&pagination.terminal_label) {
                Ok(true) => {
                    debug!("'{}' button is visible, stopping", pagination.terminal_label);
                    break PaginationStop::TerminalButton;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Pagination check failed: {}", e);
                    break PaginationStop::Error;
                }
            }

            match self.driver.is_button_visible(&pagination.load_more_label) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("'{}' button is not visible anymore", pagination.load_more_label);
                    break PaginationStop::NoLoadMore;
                }
                Err(e) => {
                    warn!("Pagination check failed: {}", e);
                    break PaginationStop::Error;
                }
            }

            if clicks >= pagination.max_clicks {
                warn!("Stopping pagination after {} clicks", clicks);
                break PaginationStop::ClickLimit;
            }

            if let Err(e) = self.driver.click_button(&pagination.load_more_label) {
                warn!("Failed to click '{}': {}", pagination.load_more_label, e);
                break PaginationStop::Error;
            }
            clicks += 1;
            debug!("Clicked '{}' ({})", pagination.load_more_label, clicks);
        };

        PaginationOutcome { clicks, stopped_by }
    }

    /// Open every collapsed accordion section once. Returns the number opened.
    pub fn expand_all_collapsed_sections(&self) -> usize {
        let selector = &self.config.accordion.selector;
        let states = match self.driver.attributes(selector, &["aria-expanded", "data-state"]) {
            Ok(states) => states,
            Err(e) => {
                warn!("Could not read accordion state: {}", e);
                return 0;
            }
        };

        if states.is_empty() {
            debug!("No accordion found");
            return 0;
        }

        let mut opened = 0;
        for (index, attrs) in states.iter().enumerate() {
            let collapsed = matches!(
                attrs.as_slice(),
                [Some(expanded), Some(state)] if expanded == "false" && state == "closed"
            );
            if !collapsed {
                continue;
            }
            match self.driver.click_nth(selector, index) {
                Ok(()) => opened += 1,
                Err(e) => warn!("Failed to open accordion {}: {}", index, e),
            }
        }

        debug!("Opened {} of {} accordion sections", opened, states.len());
        opened
    }

    /// Page type from the analytics dataLayer in `<head>` scripts.
    pub fn classify_page(&self) -> Classification {
        let html = match self.driver.html() {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read page HTML for classification: {}", e);
                return Classification::NotFound;
            }
        };

        let classification = classify_scripts(&head_scripts(&html));
        match &classification {
            Classification::Found(page_type) => info!("Page type: {}", page_type),
            Classification::NotFound => debug!("Page type not found"),
            Classification::Malformed(e) => warn!("Page type script could not be parsed: {}", e),
        }
        classification
    }

    /// Visible text of the content root with reviews and non-visual nodes removed.
    pub fn extract_visible_text(&self) -> Result<Option<String>, PageError> {
        let page = &self.config.page;
        let text = self.driver.inner_text(&page.content_root, &page.excluded_selectors)?;
        match &text {
            Some(t) => debug!("Page content length: {}", t.chars().count()),
            None => warn!("No <{}> element on page", page.content_root),
        }
        Ok(text)
    }

    pub fn extract_meta_and_title(&self) -> Result<MetaSnapshot, PageError> {
        let html = self.driver.html()?;
        let tags = meta_tags(&html);
        debug!("Total meta tags with content: {}", tags.len());

        let title = match self.driver.title() {
            Ok(title) if !title.is_empty() => Some(title),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not read title: {}", e);
                None
            }
        };

        Ok(MetaSnapshot { tags, title })
    }

    /// Tag name of the element holding `text`, or `Unknown`.
    pub fn resolve_tag(&self, text: &str) -> String {
        match self.driver.tag_name_containing(text) {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                debug!("Could not find an element for {}", text);
                UNKNOWN_TAG.to_string()
            }
            Err(e) => {
                debug!("Tag lookup for {} failed: {}", text, e);
                UNKNOWN_TAG.to_string()
            }
        }
    }

    pub fn close(mut self) {
        if let Err(e) = self.driver.close() {
            debug!("Error closing page: {}", e);
        }
    }
}

/// Text of every `<script>` inside `<head>`.
pub fn head_scripts(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("head script") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect()
}

/// Every `<meta>` with a non-empty `content`, labelled by `name` or `property`.
pub fn meta_tags(html: &str) -> Vec<MetaTag> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("meta") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| {
            let attrs = el.value();
            let content = attrs.attr("content").filter(|c| !c.is_empty())?;
            let label = attrs
                .attr("name")
                .or_else(|| attrs.attr("property"))
                .or_else(|| attrs.attr("http-equiv"))
                .unwrap_or("meta");
            Some(MetaTag::new(label, content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &str = r#"<html><head>
        <title>Acme Anvils</title>
        <meta charset="utf-8">
        <meta name="description" content="Acme anvils for everyone">
        <meta property="og:title" content="Acme® Anvils">
        <meta name="robots" content="">
        <script>window.dataLayer.push({"page_data": {"page_type": "productListing"}});</script>
        </head><body><script>var notHead = "page_type";</script></body></html>"#;

    #[test]
    fn test_meta_tags() {
        let tags = meta_tags(HEAD);
        assert_eq!(
            tags,
            vec![
                MetaTag::new("description", "Acme anvils for everyone"),
                MetaTag::new("og:title", "Acme® Anvils"),
            ]
        );
    }

    #[test]
    fn test_head_scripts_only() {
        let scripts = head_scripts(HEAD);
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("productListing"));
    }
}
