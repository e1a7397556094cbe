use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use brandmark::browser::ChromeBrowser;
use brandmark::cli::Cli;
use brandmark::config::AppConfig;
use brandmark::finding::{FindingLog, PageTarget};
use brandmark::logger::{RunLogger, VerbosityLevel};
use brandmark::prompt::{gather_inputs, PageSource, Prompter, RunInputs};
use brandmark::report::{write_report, ReportContext};
use brandmark::runner::{exit_code, CheckRunner, EXIT_ERROR};
use brandmark::urls::{brand_from_domain, build_client, fetch_sitemap_urls, resolve_manual_urls, sitemap_url};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run brandmark again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(EXIT_ERROR);
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(EXIT_ERROR);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = AppConfig::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.tracing_directive())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path.clone()),
        None => RunLogger::new(verbosity),
    };
    if cli.no_progress {
        logger = logger.without_progress();
    }

    let inputs = {
        let mut prompter = Prompter::stdio();
        gather_inputs(&cli, &config, &mut prompter)?
    };

    let targets = collect_targets(&inputs, &config).await?;
    if targets.is_empty() {
        bail!("No pages to check for {}", inputs.domain);
    }

    let brand = brand_from_domain(&inputs.domain);
    logger.log_run_start(&inputs.domain, &inputs.check.check_data(), targets.len());

    let log = {
        let config = config.clone();
        let check = inputs.check.clone();
        let logger = logger.clone();
        let headless = inputs.headless;

        // headless_chrome blocks; keep it off the async workers.
        tokio::task::spawn_blocking(move || -> Result<FindingLog> {
            let browser = ChromeBrowser::launch(&config.browser, headless)?;
            let runner = CheckRunner::new(&browser, &config, &check, &logger);
            let mut log = FindingLog::new();
            runner.run(&targets, &mut log);
            Ok(log)
        })
        .await
        .context("Browser task failed")??
    };

    let root = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.report.root_dir));
    let ctx = ReportContext {
        brand: &brand,
        domain: &inputs.domain,
        check: &inputs.check,
        generated_at: Local::now(),
    };
    let output = write_report(&log, &ctx, &root, &config.report.sheet_name).context("Failed to write report")?;
    logger.log_report_written(&output.paths.base.display().to_string());
    if output.plain_html.is_none() {
        logger.info("No findings, HTML reports were not generated");
    }

    logger.print_final_summary(&log);

    if let Err(e) = logger.export_logs() {
        eprintln!("⚠️  Failed to export logs: {}", e);
    }

    Ok(exit_code(&log))
}

async fn collect_targets(inputs: &RunInputs, config: &AppConfig) -> Result<Vec<PageTarget>> {
    let urls = match &inputs.source {
        PageSource::Sitemap => {
            let client = build_client(&config.sitemap)?;
            let sitemap = sitemap_url(&inputs.domain)?;
            fetch_sitemap_urls(&client, &sitemap, config.sitemap.max_index_depth)
                .await
                .with_context(|| format!("Failed to read sitemap {}", sitemap))?
        }
        PageSource::Manual(entries) => resolve_manual_urls(&inputs.domain, entries),
    };

    Ok(urls.into_iter().map(PageTarget::new).collect())
}
