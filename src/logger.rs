use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::finding::FindingLog;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Only progress bar and final summary
    Summary = 1,  // Per-page progress (default)
    Detailed = 2, // Readiness steps and warnings
    Debug = 3,    // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default `tracing` filter directive for this verbosity.
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent => "error",
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "brandmark=info",
            VerbosityLevel::Debug => "brandmark=debug",
        }
    }
}

/// User-facing run output: timestamped lines, a progress bar over pages, and
/// an optional copy of every line in a log file.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<Mutex<Option<ProgressBar>>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
    show_progress: bool,
    started: Arc<Mutex<Option<Instant>>>,
    output_path: Arc<Mutex<Option<String>>>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(Mutex::new(None)),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
            show_progress: true,
            started: Arc::new(Mutex::new(None)),
            output_path: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    /// Disable the progress bar (e.g. for CI logs).
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are shown at every verbosity.
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", timestamp(), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print above the progress bar so it keeps its position.
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub fn start_progress(&self, total_pages: u64) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        if !self.show_progress {
            return;
        }

        let pb = ProgressBar::new(total_pages);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Starting...");

        if let Ok(mut guard) = self.progress_bar.lock() {
            *guard = Some(pb);
        }
    }

    pub fn update_progress(&self, message: &str) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(message.to_string());
            }
        }
    }

    pub fn advance_progress(&self) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.inc(1);
            }
        }
    }

    pub fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        self.info(final_message);
    }

    pub fn log_run_start(&self, domain: &str, check_data: &str, page_count: usize) {
        self.info(&format!(
            "Checking {} pages of {} for '{}'",
            page_count, domain, check_data
        ));
    }

    pub fn log_page_start(&self, index: usize, total: usize, url: &str) {
        self.update_progress(url);
        self.debug(&format!("[{}/{}] Opening {}", index, total, url));
    }

    pub fn log_page_findings(&self, url: &str, meta: usize, body: usize) {
        self.info(&format!(
            "{}: {} meta and {} body occurrences missing the symbol",
            url, meta, body
        ));
    }

    pub fn log_page_failed(&self, url: &str, error: &str) {
        self.error(&format!("Error processing {}: {}", url, error));
    }

    pub fn log_report_written(&self, path: &str) {
        if let Ok(mut output) = self.output_path.lock() {
            *output = Some(path.to_string());
        }
        self.info(&format!("Report written: {}", path));
    }

    pub fn print_final_summary(&self, log: &FindingLog) {
        println!("\n=== BRAND SYMBOL CHECK SUMMARY ===");

        if let Ok(started) = self.started.lock() {
            if let Some(start) = *started {
                println!("Duration: {:.2}s", start.elapsed().as_secs_f64());
            }
        }

        println!("Pages checked: {}", log.pages().len());
        println!("Pages with violations: {}", log.pages_with_violations());
        println!("Pages that could not be scanned: {}", log.failed_pages());
        println!("Findings: {}", log.findings().len());

        if let Ok(output) = self.output_path.lock() {
            if let Some(path) = output.as_ref() {
                println!("Report: {}", path);
            }
        }

        println!("==================================\n");
    }

    /// Export all collected log lines to the configured file
    pub fn export_logs(&self) -> std::io::Result<()> {
        let Some(ref log_file_path) = self.log_file_path else {
            return Ok(());
        };
        let Ok(buffer) = self.log_buffer.lock() else {
            return Ok(());
        };

        if let Some(parent) = Path::new(log_file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;

        for entry in buffer.iter() {
            writeln!(file, "{}", entry)?;
        }
        file.flush()
    }

    pub fn get_log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(VerbosityLevel::from_verbose_count(0), VerbosityLevel::Summary);
        assert_eq!(VerbosityLevel::from_verbose_count(1), VerbosityLevel::Detailed);
        assert_eq!(VerbosityLevel::from_verbose_count(5), VerbosityLevel::Debug);
    }

    #[test]
    fn test_log_buffer_respects_verbosity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let logger = RunLogger::with_log_file(VerbosityLevel::Summary, path.to_string_lossy().to_string());

        logger.info("shown");
        logger.debug("hidden");
        logger.error("always");
        assert_eq!(logger.get_log_count(), 2);

        logger.export_logs().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("INFO: shown"));
        assert!(content.contains("ERROR: always"));
        assert!(!content.contains("hidden"));
    }
}
