//! Check a website for brand name occurrences that are missing their
//! trademark symbol, and report them.

pub mod browser;
pub mod cli;
pub mod config;
pub mod datalayer;
pub mod finding;
pub mod logger;
pub mod page;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod scanner;
pub mod urls;

pub use config::AppConfig;
pub use finding::{BrandCheck, Finding, FindingLog, PageOutcome, PageTarget, ScanStatus, Section};
pub use page::{PageDriver, PageError, PageFactory, PageSession};
pub use runner::{exit_code, CheckRunner};
