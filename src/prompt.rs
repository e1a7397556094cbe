//! Interactive fallback for run inputs not given on the command line.

use anyhow::{anyhow, bail, Context, Result};
use std::io::{self, BufRead, IsTerminal, Write};

use crate::cli::{parse_yes_no, Cli};
use crate::config::AppConfig;
use crate::finding::BrandCheck;
use crate::urls::{read_url_file, split_comma_list};

/// Where the pages to check come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Sitemap,
    /// URLs or paths as entered; resolved against the domain later.
    Manual(Vec<String>),
}

/// Everything a run needs, after merging flags, config and answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub domain: String,
    pub check: BrandCheck,
    pub headless: bool,
    pub source: PageSource,
}

/// Asks questions on `output` and reads answers from `input`. When not
/// interactive every question fails immediately instead of blocking.
pub struct Prompter<R: BufRead, W: Write> {
    input: R,
    output: W,
    interactive: bool,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        let interactive = io::stdin().is_terminal();
        Self::new(io::stdin().lock(), io::stdout(), interactive)
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        Self {
            input,
            output,
            interactive,
        }
    }

    /// One line of input, trimmed. `flag` names the command-line alternative
    /// for the error raised when nobody can answer.
    pub fn ask(&mut self, question: &str, flag: &str) -> Result<String> {
        if !self.interactive {
            bail!("Missing {}: stdin is not a terminal, so it cannot be asked for", flag);
        }

        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("Failed to read stdin")?;
        if read == 0 {
            return Err(anyhow!("Input closed before answering: {}", question.trim()));
        }
        Ok(line.trim().to_string())
    }

    /// Ask until the answer is non-empty.
    pub fn ask_required(&mut self, question: &str, flag: &str) -> Result<String> {
        loop {
            let answer = self.ask(question, flag)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "A value is required.")?;
        }
    }

    /// Ask until the answer is Y or N.
    pub fn ask_yes_no(&mut self, question: &str, flag: &str) -> Result<bool> {
        loop {
            let answer = self.ask(question, flag)?;
            match parse_yes_no(&answer) {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.output, "Invalid input. Please choose the right key (Y/N).")?,
            }
        }
    }
}

/// Merge command-line values with answers to the questions they leave open.
///
/// Headless mode is only asked about interactively; otherwise the config
/// value is used. The page source defaults to the sitemap when no manual
/// list was given and nobody can be asked.
pub fn gather_inputs<R: BufRead, W: Write>(
    cli: &Cli,
    config: &AppConfig,
    prompter: &mut Prompter<R, W>,
) -> Result<RunInputs> {
    let domain = match &cli.domain {
        Some(d) => d.trim().to_string(),
        None => prompter.ask_required("Please write the PROD site Domain Link: ", "--domain")?,
    };
    let name = match &cli.name {
        Some(n) => n.trim().to_string(),
        None => prompter.ask_required("Enter Names to check: ", "--name")?,
    };
    let symbol = match &cli.symbol {
        Some(s) => s.trim().to_string(),
        None => prompter.ask_required("Enter symbol to check: ", "--symbol")?,
    };

    let headless = match cli.headless {
        Some(h) => h,
        None if prompter.interactive => {
            prompter.ask_yes_no("Do you want to run the test in Headless mode? (Y/N): ", "--headless")?
        }
        None => config.browser.headless,
    };

    let source = if cli.has_manual_urls() {
        let mut entries = cli.urls.clone();
        if let Some(path) = &cli.urls_file {
            entries.extend(read_url_file(path)?);
        }
        PageSource::Manual(entries)
    } else {
        let use_sitemap = match cli.sitemap {
            Some(s) => s,
            None if prompter.interactive => prompter.ask_yes_no(
                "Want to run test on all urls from sitemap.xml? (Y/N) [for No, just input list of Urls you want to test]: ",
                "--sitemap",
            )?,
            None => true,
        };
        if use_sitemap {
            PageSource::Sitemap
        } else {
            let answer = prompter.ask_required("Enter the URLs or paths to test, separated by commas: ", "--url")?;
            PageSource::Manual(split_comma_list(&answer))
        }
    };

    Ok(RunInputs {
        domain,
        check: BrandCheck::new(name, symbol),
        headless,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(answers: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new(), true)
    }

    fn config() -> AppConfig {
        AppConfig::from_toml(crate::config::DEFAULT_CONFIG).unwrap()
    }

    #[test]
    fn test_yes_no_reasks_until_valid() {
        let mut p = prompter("maybe\n\nn\n");
        assert!(!p.ask_yes_no("Headless? ", "--headless").unwrap());
        let shown = String::from_utf8(p.output.clone()).unwrap();
        assert_eq!(shown.matches("Invalid input").count(), 2);
    }

    #[test]
    fn test_eof_is_an_error() {
        let mut p = prompter("");
        assert!(p.ask_yes_no("Headless? ", "--headless").is_err());
    }

    #[test]
    fn test_non_interactive_fails_fast() {
        let mut p = Prompter::new(Cursor::new(Vec::new()), Vec::new(), false);
        let err = p.ask("Enter Names to check: ", "--name").unwrap_err();
        assert!(err.to_string().contains("--name"));
    }

    #[test]
    fn test_gather_inputs_interactive() {
        let cli = Cli::default();
        let mut p = prompter("https://www.acme.com/\nAcme\n®\nY\nN\n/products, /about\n");
        let inputs = gather_inputs(&cli, &config(), &mut p).unwrap();

        assert_eq!(inputs.domain, "https://www.acme.com/");
        assert_eq!(inputs.check, BrandCheck::new("Acme", "®"));
        assert!(inputs.headless);
        assert_eq!(inputs.source, PageSource::Manual(vec!["/products".to_string(), "/about".to_string()]));
    }

    #[test]
    fn test_gather_inputs_from_flags_never_prompts() {
        let cli = Cli {
            domain: Some("https://www.acme.com/".to_string()),
            name: Some("Acme".to_string()),
            symbol: Some("™".to_string()),
            urls: vec!["/a".to_string()],
            ..Default::default()
        };
        let mut p = Prompter::new(Cursor::new(Vec::new()), Vec::new(), false);
        let inputs = gather_inputs(&cli, &config(), &mut p).unwrap();

        assert_eq!(inputs.headless, config().browser.headless);
        assert_eq!(inputs.source, PageSource::Manual(vec!["/a".to_string()]));
    }

    #[test]
    fn test_gather_inputs_missing_name_non_interactive() {
        let cli = Cli {
            domain: Some("https://www.acme.com/".to_string()),
            ..Default::default()
        };
        let mut p = Prompter::new(Cursor::new(Vec::new()), Vec::new(), false);
        assert!(gather_inputs(&cli, &config(), &mut p).is_err());
    }
}
