#![allow(dead_code)]

pub mod fake_page;
pub mod fixtures;
pub mod wiremock_helpers;

use brandmark::config::{AppConfig, DEFAULT_CONFIG};

/// The shipped configuration.
pub fn default_config() -> AppConfig {
    AppConfig::from_toml(DEFAULT_CONFIG).expect("default config is valid")
}
