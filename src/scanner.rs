//! Brand-symbol scanning over extracted page text.
//!
//! Two checks:
//! - meta content and the document title, by exact substring
//! - visible body text, case-insensitively, where a match is rejected when the
//!   name is followed (after optional whitespace) by the symbol or by
//!   `<sup>symbol</sup>`
//!
//! The `regex` crate has no lookaround, so the trailing-symbol test is a second
//! anchored regex run against the text after each candidate.

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::debug;

use crate::finding::{BodyHit, BrandCheck, MetaHit};

pub const DEFAULT_EXCERPT_RADIUS: usize = 20;

/// Tag label used when the owning element of a body match can't be found.
pub const UNKNOWN_TAG: &str = "Unknown";

/// A `<meta>` tag's label (its `name`, else `property`) and `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    pub label: String,
    pub content: String,
}

impl MetaTag {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// True when `content` mentions the name but never in either accepted marked form.
pub fn is_missing_symbol(content: &str, check: &BrandCheck) -> bool {
    if check.name.is_empty() || !content.contains(&check.name) {
        return false;
    }
    let plain = format!("{}{}", check.name, check.symbol);
    let superscript = format!("{}<sup>{}</sup>", check.name, check.symbol);
    !content.contains(&plain) && !content.contains(&superscript)
}

/// Check every meta tag and the title. Title hits are labelled `title`.
pub fn scan_meta(tags: &[MetaTag], title: Option<&str>, check: &BrandCheck) -> Vec<MetaHit> {
    let mut hits = Vec::new();

    for tag in tags {
        if tag.content.is_empty() {
            continue;
        }
        if is_missing_symbol(&tag.content, check) {
            debug!("Found {} in meta '{}' without {}", check.name, tag.label, check.symbol);
            hits.push(MetaHit {
                label: tag.label.clone(),
                content: tag.content.clone(),
            });
        }
    }

    if let Some(title) = title.filter(|t| !t.is_empty()) {
        if is_missing_symbol(title, check) {
            debug!("Found {} in title without {}", check.name, check.symbol);
            hits.push(MetaHit {
                label: "title".to_string(),
                content: title.to_string(),
            });
        }
    }

    hits
}

/// A body match before tag resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    /// Character offset of the match start.
    pub position: usize,
    /// The matched text, in the page's own casing.
    pub matched: String,
    pub excerpt: String,
}

/// Compiled body scanner for one name/symbol pair.
#[derive(Debug, Clone)]
pub struct BodyScanner {
    name: Option<Regex>,
    marked_suffix: Regex,
    radius: usize,
}

impl BodyScanner {
    pub fn new(check: &BrandCheck, radius: usize) -> Result<Self, regex::Error> {
        let name = if check.name.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&regex::escape(&check.name))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        let symbol = regex::escape(&check.symbol);
        let marked_suffix = RegexBuilder::new(&format!(r"^\s*(?:<sup>{symbol}</sup>|{symbol})"))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            name,
            marked_suffix,
            radius,
        })
    }

    /// Every occurrence of the name not followed by an accepted symbol form.
    ///
    /// Scans left to right. A rejected candidate resumes the search one
    /// character after its start, an accepted one at its end.
    pub fn find(&self, text: &str) -> Vec<RawMatch> {
        let Some(name) = &self.name else {
            return Vec::new();
        };

        let mut matches = Vec::new();
        let mut pos = 0;
        // Running byte -> char offset conversion; matches only move forward.
        let mut counted_bytes = 0;
        let mut counted_chars = 0;

        while pos <= text.len() {
            let Some(m) = name.find_at(text, pos) else {
                break;
            };

            if self.marked_suffix.is_match(&text[m.end()..]) {
                let step = text[m.start()..].chars().next().map_or(1, char::len_utf8);
                pos = m.start() + step;
                continue;
            }

            counted_chars += text[counted_bytes..m.start()].chars().count();
            counted_bytes = m.start();

            matches.push(RawMatch {
                position: counted_chars,
                matched: m.as_str().to_string(),
                excerpt: self.excerpt(text, m.start(), m.end()),
            });
            pos = m.end();
        }

        matches
    }

    /// `radius` characters either side of the match, clamped to the text.
    fn excerpt(&self, text: &str, start: usize, end: usize) -> String {
        let from = if self.radius == 0 {
            start
        } else {
            text[..start]
                .char_indices()
                .rev()
                .take(self.radius)
                .last()
                .map_or(start, |(i, _)| i)
        };
        let to = text[end..]
            .char_indices()
            .nth(self.radius)
            .map_or(text.len(), |(i, _)| end + i);
        text[from..to].to_string()
    }
}

/// Scan visible text. `resolve_tag` maps matched text to the tag name of the
/// element containing it; it is called once per distinct matched text.
pub fn scan_body<F>(text: &str, check: &BrandCheck, radius: usize, mut resolve_tag: F) -> Vec<BodyHit>
where
    F: FnMut(&str) -> Option<String>,
{
    if text.is_empty() {
        return Vec::new();
    }

    let scanner = match BodyScanner::new(check, radius) {
        Ok(scanner) => scanner,
        Err(e) => {
            debug!("Could not build scanner for {}: {}", check.name, e);
            return Vec::new();
        }
    };

    let mut tags: HashMap<String, String> = HashMap::new();
    let hits: Vec<BodyHit> = scanner
        .find(text)
        .into_iter()
        .map(|m| {
            let tag_name = tags
                .entry(m.matched.clone())
                .or_insert_with(|| resolve_tag(&m.matched).unwrap_or_else(|| UNKNOWN_TAG.to_string()))
                .clone();
            debug!("Found {} at position {} without {}", check.name, m.position, check.symbol);
            BodyHit {
                tag_name,
                position: m.position,
                surrounding_text: m.excerpt,
            }
        })
        .collect();

    debug!("Total matches found for {}: {}", check.check_data(), hits.len());
    hits
}
