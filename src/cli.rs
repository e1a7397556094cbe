use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "brandmark")]
#[command(about = "Crawl a website and report brand name occurrences missing their trademark symbol")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/brandmark.toml
    #[arg(long)]
    pub init: bool,

    /// Website to check, e.g. https://www.acme.com/
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Brand name to look for
    #[arg(short, long)]
    pub name: Option<String>,

    /// Symbol that must follow the name, e.g. ® or ™
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Run Chrome headless: Y or N (defaults to the config value)
    #[arg(long, value_name = "Y|N", value_parser = parse_yes_no)]
    pub headless: Option<bool>,

    /// Collect pages from the domain's sitemap.xml: Y or N
    #[arg(long, value_name = "Y|N", value_parser = parse_yes_no)]
    pub sitemap: Option<bool>,

    /// Page to check when not using the sitemap (repeatable; paths are joined onto the domain)
    #[arg(short, long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// File with one URL or path per line
    #[arg(long, value_name = "FILE")]
    pub urls_file: Option<PathBuf>,

    /// Root directory for reports (overrides config)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Configuration file (defaults to ./config/brandmark.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export execution logs to a file (specify file path)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Whether any manual page list was given on the command line.
    pub fn has_manual_urls(&self) -> bool {
        !self.urls.is_empty() || self.urls_file.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.init {
            return Ok(());
        }

        if let Some(d) = &self.domain {
            if d.trim().is_empty() {
                return Err("Domain cannot be empty".to_string());
            }
        }
        if let Some(n) = &self.name {
            if n.trim().is_empty() {
                return Err("Name cannot be empty".to_string());
            }
        }
        if let Some(s) = &self.symbol {
            if s.trim().is_empty() {
                return Err("Symbol cannot be empty".to_string());
            }
        }

        if self.sitemap == Some(true) && self.has_manual_urls() {
            return Err("--sitemap Y cannot be combined with --url or --urls-file".to_string());
        }

        Ok(())
    }
}

/// Accepts Y/N (and yes/no, any case).
pub fn parse_yes_no(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_uppercase().as_str() {
        "Y" | "YES" => Ok(true),
        "N" | "NO" => Ok(false),
        other => Err(format!("expected Y or N, got '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("Y"), Ok(true));
        assert_eq!(parse_yes_no("n"), Ok(false));
        assert_eq!(parse_yes_no(" yes "), Ok(true));
        assert!(parse_yes_no("maybe").is_err());
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "brandmark",
            "--domain",
            "https://www.acme.com/",
            "--name",
            "Acme",
            "--symbol",
            "®",
            "--headless",
            "N",
            "--sitemap",
            "n",
            "--url",
            "/products",
            "--url",
            "/about",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.domain.as_deref(), Some("https://www.acme.com/"));
        assert_eq!(cli.headless, Some(false));
        assert_eq!(cli.sitemap, Some(false));
        assert_eq!(cli.urls, vec!["/products", "/about"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_invalid_yes_no_rejected_by_parser() {
        assert!(Cli::try_parse_from(["brandmark", "--headless", "sometimes"]).is_err());
    }

    #[test]
    fn test_validate() {
        let cli = Cli {
            domain: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(cli.validate().is_err());

        let cli = Cli {
            sitemap: Some(true),
            urls: vec!["/a".to_string()],
            ..Default::default()
        };
        assert!(cli.validate().is_err());

        let cli = Cli {
            init: true,
            domain: Some(String::new()),
            ..Default::default()
        };
        assert!(cli.validate().is_ok());
    }
}
