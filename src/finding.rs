/// The name/symbol pair being checked, e.g. `Acme` + `®`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandCheck {
    pub name: String,
    pub symbol: String,
}

impl BrandCheck {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    /// The compliant form, used as the "Check Data" column.
    pub fn check_data(&self) -> String {
        format!("{}{}", self.name, self.symbol)
    }

    /// Used to namespace report directories and file names.
    pub fn test_name(&self) -> String {
        format!("{}{}_missing_data", self.name, self.symbol)
    }
}

/// A page to check: the URL plus its path slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    pub url: String,
    pub slug: String,
}

impl PageTarget {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let slug = crate::urls::slug_from_url(&url);
        Self { url, slug }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    MetaContent,
    BodyContent,
}

impl Section {
    pub fn label(&self) -> &'static str {
        match self {
            Section::MetaContent => "Meta Content",
            Section::BodyContent => "Body Content",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One occurrence of the brand name without its symbol. One report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub url: String,
    pub page_slug: String,
    pub check_data: String,
    pub section: Section,
    pub tag_or_attribute: String,
    /// Character offset into the page's visible text. `None` for meta findings.
    pub position: Option<usize>,
    pub surrounding_text: String,
}

/// A hit in a `<meta>` content attribute or the document title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaHit {
    pub label: String,
    pub content: String,
}

/// A hit in the page's visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyHit {
    pub tag_name: String,
    pub position: usize,
    pub surrounding_text: String,
}

/// Stage at which a page could not be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Open,
    Navigate,
    ExtractText,
    ExtractMeta,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureStage::Open => "open",
            FailureStage::Navigate => "navigate",
            FailureStage::ExtractText => "extract text",
            FailureStage::ExtractMeta => "extract meta",
        };
        f.write_str(s)
    }
}

/// Result of checking a single page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Scanned {
        page_type: Option<String>,
        meta: Vec<MetaHit>,
        body: Vec<BodyHit>,
    },
    Failed {
        stage: FailureStage,
        error: String,
    },
}


/// Per-page status row, kept alongside findings so an unscannable page is
/// never mistaken for a clean one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStatus {
    pub url: String,
    pub page_slug: String,
    pub page_type: Option<String>,
    pub status: ScanStatus,
    pub findings: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Clean,
    Violations,
    Failed,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanStatus::Clean => "clean",
            ScanStatus::Violations => "violations",
            ScanStatus::Failed => "could not scan",
        };
        f.write_str(s)
    }
}

/// Append-only accumulator for a whole run.
#[derive(Debug, Default, Clone)]
pub struct FindingLog {
    findings: Vec<Finding>,
    pages: Vec<PageStatus>,
}

impl FindingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a page outcome into finding rows tagged with the page's URL and slug.
    /// Meta rows come before body rows, matching the report's ordering.
    pub fn record(&mut self, target: &PageTarget, check: &BrandCheck, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Scanned { page_type, meta, body } => {
                let count = meta.len() + body.len();
                let check_data = check.check_data();

                for hit in meta {
                    self.findings.push(Finding {
                        url: target.url.clone(),
                        page_slug: target.slug.clone(),
                        check_data: check_data.clone(),
                        section: Section::MetaContent,
                        tag_or_attribute: hit.label,
                        position: None,
                        surrounding_text: hit.content,
                    });
                }
                for hit in body {
                    self.findings.push(Finding {
                        url: target.url.clone(),
                        page_slug: target.slug.clone(),
                        check_data: check_data.clone(),
                        section: Section::BodyContent,
                        tag_or_attribute: hit.tag_name,
                        position: Some(hit.position),
                        surrounding_text: hit.surrounding_text,
                    });
                }

                self.pages.push(PageStatus {
                    url: target.url.clone(),
                    page_slug: target.slug.clone(),
                    page_type,
                    status: if count > 0 { ScanStatus::Violations } else { ScanStatus::Clean },
                    findings: count,
                    error: None,
                });
            }
            PageOutcome::Failed { stage, error } => {
                self.pages.push(PageStatus {
                    url: target.url.clone(),
                    page_slug: target.slug.clone(),
                    page_type: None,
                    status: ScanStatus::Failed,
                    findings: 0,
                    error: Some(format!("{}: {}", stage, error)),
                });
            }
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn pages(&self) -> &[PageStatus] {
        &self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.status == ScanStatus::Failed).count()
    }

    pub fn pages_with_violations(&self) -> usize {
        self.pages.iter().filter(|p| p.status == ScanStatus::Violations).count()
    }

    pub fn findings_for<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.url == url)
    }
}
