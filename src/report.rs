use anyhow::{Context, Result};
use askama::Template;
use chrono::{DateTime, Local};
use regex::Regex;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::finding::{BrandCheck, Finding, FindingLog, PageStatus, ScanStatus, Section};

pub const COLUMNS: [&str; 7] = [
    "URL",
    "Page Slug",
    "Check Data",
    "section",
    "Tag/Attribute",
    "Position",
    "Surrounding text",
];

const STATUS_COLUMNS: [&str; 6] = ["URL", "Page Slug", "Page Type", "Status", "Findings", "Error"];

const STATUS_SHEET_NAME: &str = "scan_status";

/// Where one run's report files go.
///
/// `{root}/{BRAND}_Report/test_on_{date}/{time}/{BRAND}_{test}_Report/` holds
/// one directory per output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub base: PathBuf,
    pub spreadsheet: PathBuf,
    pub plain_html: PathBuf,
    pub styled_html: PathBuf,
}

impl ReportPaths {
    pub fn new(root: &Path, brand: &str, test_name: &str, at: DateTime<Local>) -> Self {
        let brand = sanitize_component(brand);
        let test_name = sanitize_component(test_name);
        let base = root
            .join(format!("{}_Report", brand))
            .join(format!("test_on_{}", at.format("%Y-%m-%d")))
            .join(at.format("%H-%M-%S").to_string())
            .join(format!("{}_{}_Report", brand, test_name));

        let html_name = format!("{}_prod_{}_Report.html", brand, test_name);

        Self {
            spreadsheet: base
                .join(format!("{}_{}_excel_Report", brand, test_name))
                .join(format!("{}_symbol_check_test_report.xlsx", brand)),
            plain_html: base
                .join(format!("{}_{}_html_general_Report", brand, test_name))
                .join(&html_name),
            styled_html: base
                .join(format!("{}_{}Style_HTML_Report", brand, test_name))
                .join(&html_name),
            base,
        }
    }
}

/// Replace characters that cannot appear in a file name on common platforms.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Run details shown in report headers.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub brand: &'a str,
    pub domain: &'a str,
    pub check: &'a BrandCheck,
    pub generated_at: DateTime<Local>,
}

/// Files actually written. HTML paths are `None` when there was nothing to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutput {
    pub paths: ReportPaths,
    pub plain_html: Option<PathBuf>,
    pub styled_html: Option<PathBuf>,
}

/// Write the spreadsheet, and the two HTML tables when there are findings.
pub fn write_report(log: &FindingLog, ctx: &ReportContext<'_>, root: &Path, sheet_name: &str) -> Result<ReportOutput> {
    let test_name = ctx.check.test_name();
    let paths = ReportPaths::new(root, ctx.brand, &test_name, ctx.generated_at);
    debug!("Writing report for {} findings under {}", log.findings().len(), paths.base.display());

    write_spreadsheet(log, &paths.spreadsheet, sheet_name)?;
    info!("Spreadsheet written: {}", paths.spreadsheet.display());

    if log.is_empty() {
        info!("No findings for {}, skipping HTML reports", ctx.check.check_data());
        return Ok(ReportOutput {
            paths,
            plain_html: None,
            styled_html: None,
        });
    }

    let rows = report_rows(log.findings(), &ctx.check.name);

    let plain = PlainReportTemplate {
        title: format!("{} {}", ctx.brand, test_name),
        columns: &COLUMNS,
        rows: &rows,
    };
    write_file(&paths.plain_html, &plain.render()?)?;
    info!("HTML report written: {}", paths.plain_html.display());

    let failed_pages: Vec<FailedRow> = log
        .pages()
        .iter()
        .filter(|p| p.status == ScanStatus::Failed)
        .map(FailedRow::from)
        .collect();
    let styled = StyledReportTemplate {
        summary: ReportSummary::new(log, ctx, &test_name),
        columns: &COLUMNS,
        rows: &rows,
        failed_pages: &failed_pages,
    };
    write_file(&paths.styled_html, &styled.render()?)?;
    info!("Styled HTML report written: {}", paths.styled_html.display());

    Ok(ReportOutput {
        plain_html: Some(paths.plain_html.clone()),
        styled_html: Some(paths.styled_html.clone()),
        paths,
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_spreadsheet(log: &FindingLog, path: &Path, sheet_name: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
    }

    let header = Format::new().set_bold();
    let mut workbook = Workbook::new();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name)?;
        write_header(sheet, &COLUMNS, &header)?;

        for (i, finding) in log.findings().iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, &finding.url)?;
            sheet.write_string(row, 1, &finding.page_slug)?;
            sheet.write_string(row, 2, &finding.check_data)?;
            sheet.write_string(row, 3, finding.section.label())?;
            sheet.write_string(row, 4, &finding.tag_or_attribute)?;
            if let Some(position) = finding.position {
                sheet.write_number(row, 5, position as f64)?;
            }
            sheet.write_string(row, 6, &finding.surrounding_text)?;
        }
        sheet.set_column_width(0, 50)?;
        sheet.set_column_width(6, 60)?;
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(STATUS_SHEET_NAME)?;
        write_header(sheet, &STATUS_COLUMNS, &header)?;

        for (i, page) in log.pages().iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, &page.url)?;
            sheet.write_string(row, 1, &page.page_slug)?;
            sheet.write_string(row, 2, page.page_type.as_deref().unwrap_or_default())?;
            sheet.write_string(row, 3, page.status.to_string())?;
            sheet.write_number(row, 4, page.findings as f64)?;
            sheet.write_string(row, 5, page.error.as_deref().unwrap_or_default())?;
        }
        sheet.set_column_width(0, 50)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save spreadsheet {}", path.display()))?;
    Ok(())
}

fn write_header(sheet: &mut Worksheet, columns: &[&str], format: &Format) -> Result<()> {
    for (col, title) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, format)?;
    }
    Ok(())
}

/// A finding with every cell already formatted for the HTML tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub url: String,
    pub page_slug: String,
    pub check_data: String,
    pub section: String,
    pub tag_or_attribute: String,
    pub position: String,
    pub surrounding_text: String,
    pub row_class: String,
    pub excerpt: Vec<ExcerptSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptSegment {
    pub text: String,
    pub highlight: bool,
}

pub fn report_rows(findings: &[Finding], name: &str) -> Vec<ReportRow> {
    let highlighter = if name.is_empty() {
        None
    } else {
        Regex::new(&format!("(?i){}", regex::escape(name))).ok()
    };

    findings
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let section_class = match f.section {
                Section::MetaContent => "section-meta",
                Section::BodyContent => "section-body",
            };
            let row_class = if i % 2 == 1 {
                format!("{} striped", section_class)
            } else {
                section_class.to_string()
            };

            ReportRow {
                url: f.url.clone(),
                page_slug: f.page_slug.clone(),
                check_data: f.check_data.clone(),
                section: f.section.label().to_string(),
                tag_or_attribute: f.tag_or_attribute.clone(),
                position: f.position.map(|p| p.to_string()).unwrap_or_default(),
                surrounding_text: f.surrounding_text.clone(),
                row_class,
                excerpt: highlight_segments(&f.surrounding_text, highlighter.as_ref()),
            }
        })
        .collect()
}

/// Split `text` into plain and highlighted runs around each name match.
pub fn highlight_segments(text: &str, highlighter: Option<&Regex>) -> Vec<ExcerptSegment> {
    let Some(regex) = highlighter else {
        return vec![ExcerptSegment { text: text.to_string(), highlight: false }];
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for m in regex.find_iter(text) {
        if m.start() > last {
            segments.push(ExcerptSegment { text: text[last..m.start()].to_string(), highlight: false });
        }
        segments.push(ExcerptSegment { text: m.as_str().to_string(), highlight: true });
        last = m.end();
    }
    if last < text.len() {
        segments.push(ExcerptSegment { text: text[last..].to_string(), highlight: false });
    }
    segments
}

#[derive(Debug, Clone)]
struct FailedRow {
    url: String,
    error: String,
}

impl From<&PageStatus> for FailedRow {
    fn from(page: &PageStatus) -> Self {
        Self {
            url: page.url.clone(),
            error: page.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
struct ReportSummary {
    title: String,
    domain: String,
    check_data: String,
    generated_at: String,
    total_findings: usize,
    meta_findings: usize,
    body_findings: usize,
    pages_checked: usize,
    pages_with_violations: usize,
    pages_failed: usize,
}

impl ReportSummary {
    fn new(log: &FindingLog, ctx: &ReportContext<'_>, test_name: &str) -> Self {
        let meta_findings = log
            .findings()
            .iter()
            .filter(|f| f.section == Section::MetaContent)
            .count();

        Self {
            title: format!("{} {} Report", ctx.brand, test_name),
            domain: ctx.domain.to_string(),
            check_data: ctx.check.check_data(),
            generated_at: ctx.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            total_findings: log.findings().len(),
            meta_findings,
            body_findings: log.findings().len() - meta_findings,
            pages_checked: log.pages().len(),
            pages_with_violations: log.pages_with_violations(),
            pages_failed: log.failed_pages(),
        }
    }
}

#[derive(Template)]
#[template(path = "plain_report.html")]
struct PlainReportTemplate<'a> {
    title: String,
    columns: &'a [&'a str],
    rows: &'a [ReportRow],
}

#[derive(Template)]
#[template(path = "styled_report.html")]
struct StyledReportTemplate<'a> {
    summary: ReportSummary,
    columns: &'a [&'a str],
    rows: &'a [ReportRow],
    failed_pages: &'a [FailedRow],
}
