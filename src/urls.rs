//! Page discovery: sitemap crawling and manual URL lists.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SitemapConfig;

static LOC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[\s*(.*?)\s*\]\]>|(.*?))\s*</loc>").expect("Invalid <loc> regex")
});

static XML_ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#[xX][0-9a-fA-F]+);").expect("Invalid XML entity regex")
});

static SITEMAP_INDEX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<sitemapindex[\s>]").expect("Invalid <sitemapindex> regex")
});

/// `<loc>` values from one sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    /// True for a `<sitemapindex>`, whose locations are further sitemaps.
    pub is_index: bool,
    pub locations: Vec<String>,
}

pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let locations = LOC_REGEX
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| decode_xml_entities(m.as_str().trim()))
        .filter(|loc| !loc.is_empty())
        .collect();

    SitemapDocument {
        is_index: SITEMAP_INDEX_REGEX.is_match(xml),
        locations,
    }
}

fn decode_xml_entities(s: &str) -> String {
    XML_ENTITY_REGEX
        .replace_all(s, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .unwrap_or_else(|| entity[1..].parse())
                    .ok()
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// `sitemap.xml` under the given domain.
pub fn sitemap_url(domain: &str) -> Result<Url> {
    let base = parse_domain(domain)?;
    base.join("sitemap.xml")
        .with_context(|| format!("Failed to build sitemap URL for {}", domain))
}

/// Parse a domain as typed by a user, assuming https when no scheme is given.
pub fn parse_domain(domain: &str) -> Result<Url> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Domain cannot be empty"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme).with_context(|| format!("Invalid domain URL: {}", domain))?;
    if url.host_str().is_none() {
        return Err(anyhow!("Domain URL has no host: {}", domain));
    }
    Ok(url)
}

pub fn build_client(config: &SitemapConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch a sitemap and return every page URL in it, following
/// `<sitemapindex>` entries up to `max_depth` levels. Child sitemaps that fail
/// are logged and skipped; a failing root sitemap is an error.
pub async fn fetch_sitemap_urls(client: &reqwest::Client, sitemap: &Url, max_depth: usize) -> Result<Vec<String>> {
    let mut pages = Vec::new();
    let mut pending = vec![(sitemap.to_string(), 0usize)];
    let mut visited = HashSet::new();

    while let Some((location, depth)) = pending.pop() {
        if !visited.insert(location.clone()) {
            continue;
        }

        let xml = match fetch_text(client, &location).await {
            Ok(xml) => xml,
            Err(e) if depth > 0 => {
                warn!("Skipping child sitemap {}: {}", location, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let document = parse_sitemap(&xml);
        debug!(
            "Sitemap {} has {} locations (index: {})",
            location,
            document.locations.len(),
            document.is_index
        );

        if document.is_index {
            if depth >= max_depth {
                warn!("Not following sitemap index {} beyond depth {}", location, max_depth);
                continue;
            }
            // Reverse so children are visited in document order.
            for child in document.locations.into_iter().rev() {
                pending.push((child, depth + 1));
            }
        } else {
            pages.extend(document.locations);
        }
    }

    let pages = dedupe(pages);
    info!("Collected {} page URLs from {}", pages.len(), sitemap);
    Ok(pages)
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("Non-success status {} for {}", response.status(), url));
    }

    response
        .text()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))
}

/// Resolve user-supplied entries against the domain. Each entry is one URL
/// or path, taken whole. Absolute URLs are kept, paths are joined onto the
/// domain, blanks, comments and duplicates are dropped.
pub fn resolve_manual_urls<S: AsRef<str>>(domain: &str, entries: &[S]) -> Vec<String> {
    let base = match parse_domain(domain) {
        Ok(base) => Some(base),
        Err(e) => {
            warn!("{}; only absolute URLs will be used", e);
            None
        }
    };

    let mut resolved = Vec::new();
    let entries = entries
        .iter()
        .map(|e| e.as_ref().trim())
        .filter(|e| !e.is_empty() && !e.starts_with('#'));
    for entry in entries {
        let url = if entry.starts_with("http://") || entry.starts_with("https://") {
            Url::parse(entry).ok()
        } else {
            base.as_ref().and_then(|b| b.join(entry).ok())
        };

        match url {
            Some(url) => resolved.push(url.to_string()),
            None => warn!("Ignoring unusable URL entry: {}", entry),
        }
    }

    dedupe(resolved)
}

/// One entry per line; `#` starts a comment line.
pub fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Split a single typed answer such as `/products, /about` into entries.
pub fn split_comma_list(answer: &str) -> Vec<String> {
    answer
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// URL path without the leading `/`. Empty for the site root.
pub fn slug_from_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().trim_start_matches('/').to_string(),
        Err(_) => url.trim_start_matches('/').to_string(),
    }
}

/// Brand label used for report paths: `https://www.acme.com/` -> `ACME`.
pub fn brand_from_domain(domain: &str) -> String {
    let host = parse_domain(domain)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| domain.trim().to_string());

    host.trim_start_matches("www.")
        .split('.')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase()
}
