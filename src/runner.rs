//! Drives each page to readiness, scans it, and records the outcome.

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::finding::{BodyHit, BrandCheck, FailureStage, FindingLog, MetaHit, PageOutcome, PageTarget};
use crate::logger::RunLogger;
use crate::page::{PageDriver, PageFactory, PageSession};
use crate::scanner::{scan_body, scan_meta};

/// Exit code when no page has violations and every page was scanned.
pub const EXIT_CLEAN: i32 = 0;
/// Exit code when at least one finding was recorded.
pub const EXIT_VIOLATIONS: i32 = 1;
/// Exit code when nothing was found but some pages could not be scanned.
pub const EXIT_INCOMPLETE: i32 = 2;
/// Exit code when the run itself could not complete (bad input, config,
/// sitemap or report failure).
pub const EXIT_ERROR: i32 = 3;

pub struct CheckRunner<'a, F: PageFactory> {
    factory: &'a F,
    config: &'a AppConfig,
    check: &'a BrandCheck,
    logger: &'a RunLogger,
}

impl<'a, F: PageFactory> CheckRunner<'a, F> {
    pub fn new(factory: &'a F, config: &'a AppConfig, check: &'a BrandCheck, logger: &'a RunLogger) -> Self {
        Self {
            factory,
            config,
            check,
            logger,
        }
    }

    /// Check every target in order, appending outcomes to `log`.
    pub fn run(&self, targets: &[PageTarget], log: &mut FindingLog) {
        self.logger.start_progress(targets.len() as u64);

        for (index, target) in targets.iter().enumerate() {
            self.logger.log_page_start(index + 1, targets.len(), &target.url);

            let outcome = self.check_page(target);
            self.log_outcome(target, &outcome);
            log.record(target, self.check, outcome);

            self.logger.advance_progress();
        }

        self.logger.finish_progress(&format!(
            "Checked {} pages: {} findings, {} pages could not be scanned",
            targets.len(),
            log.findings().len(),
            log.failed_pages()
        ));
    }

    /// Open a fresh page, scan it, close it.
    pub fn check_page(&self, target: &PageTarget) -> PageOutcome {
        let driver = match self.factory.open_page() {
            Ok(driver) => driver,
            Err(e) => {
                return PageOutcome::Failed {
                    stage: FailureStage::Open,
                    error: e.to_string(),
                }
            }
        };

        let mut session = PageSession::new(driver, self.config);
        let outcome = self.scan_session(&mut session, target);
        session.close();
        outcome
    }

    fn scan_session<D: PageDriver>(&self, session: &mut PageSession<'_, D>, target: &PageTarget) -> PageOutcome {
        if let Err(e) = session.navigate(&target.url) {
            return PageOutcome::Failed {
                stage: FailureStage::Navigate,
                error: e.to_string(),
            };
        }
        if let Err(e) = session.wait_until_idle() {
            warn!("{}: {}", target.url, e);
        }

        let dismissed = session.dismiss_banners();
        if dismissed > 0 {
            debug!("Dismissed {} banners on {}", dismissed, target.url);
        }

        let page_type = session.classify_page().page_type().map(str::to_string);

        if self.config.page.is_listing(page_type.as_deref()) {
            let pagination = session.expand_pagination();
            info!(
                "Expanded listing {} with {} clicks ({:?})",
                target.url, pagination.clicks, pagination.stopped_by
            );
        }
        session.expand_all_collapsed_sections();

        // Expansion can trigger more requests.
        if let Err(e) = session.wait_until_idle() {
            debug!("{} after expansion: {}", target.url, e);
        }

        let text = match session.extract_visible_text() {
            Ok(text) => text.unwrap_or_default(),
            Err(e) => {
                return PageOutcome::Failed {
                    stage: FailureStage::ExtractText,
                    error: e.to_string(),
                }
            }
        };

        let body = scan_body(&text, self.check, self.config.scan.excerpt_radius, |matched| {
            Some(session.resolve_tag(matched))
        });

        let snapshot = match session.extract_meta_and_title() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return PageOutcome::Failed {
                    stage: FailureStage::ExtractMeta,
                    error: e.to_string(),
                }
            }
        };
        let meta = scan_meta(&snapshot.tags, snapshot.title.as_deref(), self.check);

        PageOutcome::Scanned { page_type, meta, body }
    }

    fn log_outcome(&self, target: &PageTarget, outcome: &PageOutcome) {
        match outcome {
            PageOutcome::Scanned { meta, body, .. } => {
                for message in assertion_messages(self.check, &target.url, meta, body) {
                    self.logger.warn(&message);
                }
                if !meta.is_empty() || !body.is_empty() {
                    self.logger.log_page_findings(&target.url, meta.len(), body.len());
                }
            }
            PageOutcome::Failed { error, .. } => self.logger.log_page_failed(&target.url, error),
        }
    }
}

/// The per-page check asserts that violations were located. These are the
/// messages for each part of the page where none were.
pub fn assertion_messages(check: &BrandCheck, url: &str, meta: &[MetaHit], body: &[BodyHit]) -> Vec<String> {
    let mut messages = Vec::new();
    if body.is_empty() {
        messages.push(format!(
            "No {} found on page data of {} without {}",
            check.name, url, check.symbol
        ));
    }
    if meta.is_empty() {
        messages.push(format!(
            "No {} found on meta data of {} without {}",
            check.name, url, check.symbol
        ));
    }
    messages
}

/// Process exit code for a finished run.
pub fn exit_code(log: &FindingLog) -> i32 {
    if !log.is_empty() {
        EXIT_VIOLATIONS
    } else if log.failed_pages() > 0 {
        EXIT_INCOMPLETE
    } else {
        EXIT_CLEAN
    }
}
