//! Configuration management for brandmark
//!
//! Configuration is loaded from `./config/brandmark.toml` (or `--config`).
//! The embedded template below is the only place defaults exist; when no file
//! is present the template itself is used.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/brandmark.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/brandmark.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than 0")]
    ZeroValue { field: String },

    #[error("Invalid CSS selector in '{field}': {selector}")]
    InvalidSelector { field: String, selector: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub page: PageConfig,
    pub pagination: PaginationConfig,
    pub accordion: AccordionConfig,
    pub scan: ScanConfig,
    pub sitemap: SitemapConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    #[serde(default)]
    pub chrome_path: String,
    pub window_width: u32,
    pub window_height: u32,
    pub navigation_timeout_secs: u64,
    pub network_idle_timeout_secs: u64,
    pub network_idle_quiet_ms: u64,
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn network_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.network_idle_timeout_secs)
    }

    pub fn network_idle_quiet(&self) -> Duration {
        Duration::from_millis(self.network_idle_quiet_ms)
    }

    /// Explicit Chrome binary: config first, then `CHROME_PATH`.
    pub fn chrome_binary(&self) -> Option<PathBuf> {
        if !self.chrome_path.is_empty() {
            return Some(PathBuf::from(&self.chrome_path));
        }
        std::env::var("CHROME_PATH").ok().filter(|p| !p.is_empty()).map(PathBuf::from)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    pub content_root: String,
    #[serde(default)]
    pub excluded_selectors: Vec<String>,
    #[serde(default)]
    pub cookie_selector: String,
    #[serde(default)]
    pub popup_selectors: Vec<String>,
    #[serde(default)]
    pub listing_page_types: Vec<String>,
}

impl PageConfig {
    pub fn is_listing(&self, page_type: Option<&str>) -> bool {
        page_type.is_some_and(|t| self.listing_page_types.iter().any(|l| l == t))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub load_more_label: String,
    pub terminal_label: String,
    pub settle_ms: u64,
    pub max_clicks: usize,
}

impl PaginationConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccordionConfig {
    pub selector: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub excerpt_radius: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SitemapConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_index_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub root_dir: String,
    pub sheet_name: String,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load `path` (or the default path), falling back to the embedded template
    /// when the file doesn't exist. An explicitly given path must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => match Self::load() {
                Err(ConfigError::FileNotFound(path)) => {
                    debug!("No configuration at {}, using built-in defaults", path.display());
                    Self::from_toml(DEFAULT_CONFIG)
                }
                other => other,
            },
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("browser.navigation_timeout_secs", self.browser.navigation_timeout_secs),
            ("browser.network_idle_timeout_secs", self.browser.network_idle_timeout_secs),
            ("sitemap.request_timeout_secs", self.sitemap.request_timeout_secs),
            ("scan.excerpt_radius", self.scan.excerpt_radius as u64),
            ("pagination.max_clicks", self.pagination.max_clicks as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::ZeroValue { field: field.to_string() });
            }
        }

        let required = [
            ("page.content_root", &self.page.content_root),
            ("pagination.load_more_label", &self.pagination.load_more_label),
            ("pagination.terminal_label", &self.pagination.terminal_label),
            ("accordion.selector", &self.accordion.selector),
            ("sitemap.user_agent", &self.sitemap.user_agent),
            ("report.root_dir", &self.report.root_dir),
            ("report.sheet_name", &self.report.sheet_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyRequired { field: field.to_string() });
            }
        }

        self.validate_selector("page.content_root", &self.page.content_root)?;
        self.validate_selector("accordion.selector", &self.accordion.selector)?;
        for (i, selector) in self.page.excluded_selectors.iter().enumerate() {
            self.validate_selector(&format!("page.excluded_selectors[{}]", i), selector)?;
        }
        if !self.page.cookie_selector.is_empty() {
            self.validate_selector("page.cookie_selector", &self.page.cookie_selector)?;
        }
        for (i, selector) in self.page.popup_selectors.iter().enumerate() {
            self.validate_selector(&format!("page.popup_selectors[{}]", i), selector)?;
        }

        Ok(())
    }

    fn validate_selector(&self, field: &str, selector: &str) -> Result<(), ConfigError> {
        scraper::Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
        })?;
        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok(), "Default config should validate: {:?}", config.validate().err());
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.page.content_root, "main");
        assert_eq!(config.scan.excerpt_radius, 20);
        assert_eq!(config.pagination.load_more_label, "LOAD MORE");
        assert_eq!(config.pagination.terminal_label, "SEE LESS");
        assert!(config.page.excluded_selectors.contains(&"section#reviews".to_string()));
        assert_eq!(config.report.sheet_name, "prod_data");
    }

    #[test]
    fn test_listing_page_types() {
        let config = AppConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert!(config.page.is_listing(Some("productListing")));
        assert!(config.page.is_listing(Some("articleListing")));
        assert!(!config.page.is_listing(Some("productDetail")));
        assert!(!config.page.is_listing(None));
    }

    #[test]
    fn test_zero_radius_rejected() {
        let content = DEFAULT_CONFIG.replace("excerpt_radius = 20", "excerpt_radius = 0");
        match AppConfig::from_toml(&content) {
            Err(ConfigError::ZeroValue { field }) => assert_eq!(field, "scan.excerpt_radius"),
            other => panic!("expected ZeroValue, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let content = DEFAULT_CONFIG.replace(r#"content_root = "main""#, r#"content_root = "main[""#);
        assert!(matches!(
            AppConfig::from_toml(&content),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let result = AppConfig::load_or_default(Some(Path::new("/nonexistent/brandmark.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_create_default_config_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("brandmark.toml");
        AppConfig::create_default_config_at(&path).unwrap();
        assert!(AppConfig::load_from_path(&path).is_ok());
    }
}
