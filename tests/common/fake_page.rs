//! Scripted in-memory `PageDriver` for exercising page sessions and the
//! runner without Chrome.

use brandmark::page::{PageDriver, PageError, PageFactory};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// What one fake URL serves.
#[derive(Debug, Clone, Default)]
pub struct FakePageSpec {
    pub head: String,
    pub title: String,
    /// `None` means the page has no content root.
    pub main_text: Option<String>,
    pub reviews_text: Option<String>,
    /// Text appended per "load more" click; one entry per available click.
    pub load_more_chunks: Vec<String>,
    /// Whether the terminal button shows once every chunk is loaded.
    pub terminal_when_done: bool,
    /// (aria-expanded, data-state, hidden text)
    pub accordions: Vec<(String, String, String)>,
    pub banners: Vec<String>,
    pub tag_name: Option<String>,
    pub fail_navigation: bool,
    pub fail_text: bool,
    pub idle_timeout: bool,
}

impl FakePageSpec {
    pub fn new(main_text: &str) -> Self {
        Self {
            main_text: Some(main_text.to_string()),
            tag_name: Some("P".to_string()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.head
            .push_str(&format!(r#"<meta name="{}" content="{}">"#, name, content));
        self
    }

    pub fn with_page_type(mut self, page_type: &str) -> Self {
        self.head.push_str(&format!(
            r#"<script>window.dataLayer = window.dataLayer || []; window.dataLayer.push({{"page_data": {{"page_type": "{}"}}}});</script>"#,
            page_type
        ));
        self
    }

    pub fn with_load_more(mut self, chunks: &[&str], terminal_when_done: bool) -> Self {
        self.load_more_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self.terminal_when_done = terminal_when_done;
        self
    }

    pub fn with_accordion(mut self, expanded: &str, state: &str, hidden_text: &str) -> Self {
        self.accordions
            .push((expanded.to_string(), state.to_string(), hidden_text.to_string()));
        self
    }

    pub fn with_reviews(mut self, text: &str) -> Self {
        self.reviews_text = Some(text.to_string());
        self
    }

    pub fn with_banner(mut self, selector: &str) -> Self {
        self.banners.push(selector.to_string());
        self
    }

    pub fn without_main(mut self) -> Self {
        self.main_text = None;
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_text(mut self) -> Self {
        self.fail_text = true;
        self
    }

    pub fn never_idle(mut self) -> Self {
        self.idle_timeout = true;
        self
    }

    fn html(&self) -> String {
        format!(
            "<html><head><title>{}</title>{}</head><body><main>{}</main></body></html>",
            self.title,
            self.head,
            self.main_text.clone().unwrap_or_default()
        )
    }
}

/// Serves `FakePage`s for a set of URLs and records what happened to them.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePageSpec>,
    events: Rc<RefCell<Vec<String>>>,
    fail_open: bool,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, spec: FakePageSpec) -> Self {
        self.pages.insert(url.to_string(), spec);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// A page already navigated to `url`, for driving a `PageSession` directly.
    pub fn open(&self, url: &str) -> FakePage {
        let mut page = self.open_page().expect("fake page opens");
        page.navigate(url).expect("fake page navigates");
        page
    }
}

impl PageFactory for FakeSite {
    type Page = FakePage;

    fn open_page(&self) -> Result<FakePage, PageError> {
        if self.fail_open {
            return Err(PageError::Open("browser went away".to_string()));
        }
        self.events.borrow_mut().push("open".to_string());
        Ok(FakePage {
            pages: self.pages.clone(),
            events: Rc::clone(&self.events),
            state: RefCell::new(None),
        })
    }
}

#[derive(Debug, Clone)]
struct LoadedPage {
    spec: FakePageSpec,
    text: String,
    chunks_loaded: usize,
}

pub struct FakePage {
    pages: HashMap<String, FakePageSpec>,
    events: Rc<RefCell<Vec<String>>>,
    state: RefCell<Option<LoadedPage>>,
}

impl FakePage {
    fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }

    fn with_loaded<T>(&self, f: impl FnOnce(&mut LoadedPage) -> Result<T, PageError>) -> Result<T, PageError> {
        let mut state = self.state.borrow_mut();
        match state.as_mut() {
            Some(loaded) => f(loaded),
            None => Err(PageError::Browser("no page loaded".to_string())),
        }
    }
}

impl PageDriver for FakePage {
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.record(format!("navigate {}", url));
        let spec = match self.pages.get(url) {
            Some(spec) if !spec.fail_navigation => spec.clone(),
            Some(_) => {
                return Err(PageError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                })
            }
            None => {
                return Err(PageError::Navigation {
                    url: url.to_string(),
                    reason: "404".to_string(),
                })
            }
        };
        *self.state.borrow_mut() = Some(LoadedPage {
            text: spec.main_text.clone().unwrap_or_default(),
            spec,
            chunks_loaded: 0,
        });
        Ok(())
    }

    fn wait_for_network_idle(&self, timeout: Duration, _quiet: Duration) -> Result<(), PageError> {
        self.with_loaded(|page| {
            if page.spec.idle_timeout {
                Err(PageError::IdleTimeout(timeout))
            } else {
                Ok(())
            }
        })
    }

    fn pause(&self, _duration: Duration) {}

    fn click(&self, selector: &str) -> Result<(), PageError> {
        let clicked = self.with_loaded(|page| {
            match page.spec.banners.iter().position(|b| b == selector) {
                Some(index) => {
                    page.spec.banners.remove(index);
                    Ok(())
                }
                None => Err(PageError::ElementNotFound(selector.to_string())),
            }
        });
        if clicked.is_ok() {
            self.record(format!("click {}", selector));
        }
        clicked
    }

    fn is_button_visible(&self, label: &str) -> Result<bool, PageError> {
        let label = label.to_uppercase();
        self.with_loaded(|page| {
            let remaining = page.spec.load_more_chunks.len() - page.chunks_loaded;
            Ok(match label.as_str() {
                "LOAD MORE" => remaining > 0,
                "SEE LESS" => remaining == 0 && page.spec.terminal_when_done && page.chunks_loaded > 0,
                _ => false,
            })
        })
    }

    fn click_button(&self, label: &str) -> Result<(), PageError> {
        self.with_loaded(|page| {
            let chunk = page
                .spec
                .load_more_chunks
                .get(page.chunks_loaded)
                .cloned()
                .ok_or_else(|| PageError::ElementNotFound(label.to_string()))?;
            page.text.push('\n');
            page.text.push_str(&chunk);
            page.chunks_loaded += 1;
            Ok(())
        })?;
        self.record(format!("click_button {}", label));
        Ok(())
    }

    fn attributes(&self, _selector: &str, names: &[&str]) -> Result<Vec<Vec<Option<String>>>, PageError> {
        self.with_loaded(|page| {
            Ok(page
                .spec
                .accordions
                .iter()
                .map(|(expanded, state, _)| {
                    names
                        .iter()
                        .map(|name| match *name {
                            "aria-expanded" => Some(expanded.clone()),
                            "data-state" => Some(state.clone()),
                            _ => None,
                        })
                        .collect()
                })
                .collect())
        })
    }

    fn click_nth(&self, selector: &str, index: usize) -> Result<(), PageError> {
        self.with_loaded(|page| {
            let accordion = page
                .spec
                .accordions
                .get_mut(index)
                .ok_or_else(|| PageError::ElementNotFound(format!("{} [{}]", selector, index)))?;
            accordion.0 = "true".to_string();
            accordion.1 = "open".to_string();
            let hidden = accordion.2.clone();
            page.text.push('\n');
            page.text.push_str(&hidden);
            Ok(())
        })?;
        self.record(format!("click_nth {}", index));
        Ok(())
    }

    fn html(&self) -> Result<String, PageError> {
        self.with_loaded(|page| Ok(page.spec.html()))
    }

    fn title(&self) -> Result<String, PageError> {
        self.with_loaded(|page| Ok(page.spec.title.clone()))
    }

    fn inner_text(&self, _root: &str, exclude: &[String]) -> Result<Option<String>, PageError> {
        self.with_loaded(|page| {
            if page.spec.fail_text {
                return Err(PageError::Script("Execution context was destroyed".to_string()));
            }
            if page.spec.main_text.is_none() {
                return Ok(None);
            }
            let mut text = page.text.clone();
            if let Some(reviews) = &page.spec.reviews_text {
                if !exclude.iter().any(|e| e == "section#reviews") {
                    text.push('\n');
                    text.push_str(reviews);
                }
            }
            Ok(Some(text))
        })
    }

    fn tag_name_containing(&self, text: &str) -> Result<Option<String>, PageError> {
        self.record(format!("tag_lookup {}", text));
        self.with_loaded(|page| Ok(page.spec.tag_name.clone()))
    }

    fn close(&mut self) -> Result<(), PageError> {
        self.record("close".to_string());
        *self.state.borrow_mut() = None;
        Ok(())
    }
}
