//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## compress / convert / resize
//!
//! ```text
//! photo.jpg → photo.webp
//!     Format: WEBP at 62% (Medium compression - Balanced)
//!     Size: 1.2 MB → 340.5 KB (71.7% smaller)
//!     Encodes: 6
//! ```
//!
//! ## info
//!
//! ```text
//! photo.jpg
//!     Dimensions: 4032x3024
//!     Format: JPEG
//!     Size: 1.2 MB
//!     Target range: 62 KB to 1229 KB (suggested 614 KB)
//! ```
//!
//! With `--json`, a single [`CompressSummary`] or [`InfoSummary`] object is
//! printed instead.

use crate::compress::CompressReport;
use crate::imaging::{Format, TargetAdvice, format_file_size, target_limits};
use crate::live::{LiveOutcome, Ticket};
use crate::source::SourceImage;
use serde::Serialize;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_label(format: Option<Format>) -> String {
    match format {
        Some(f) => f.to_string().to_uppercase(),
        None => "unknown".to_string(),
    }
}

fn display_name(source: &SourceImage) -> &str {
    source.name().unwrap_or("<stdin>")
}

// ============================================================================
// Compression results
// ============================================================================

/// Format the result of a compress, convert or resize command.
pub fn format_compress_report(
    report: &CompressReport,
    source: &SourceImage,
    output_name: &str,
) -> Vec<String> {
    let result = &report.result;
    let quality = if result.format().supports_quality() {
        format!(
            " at {} ({})",
            result.quality_used(),
            result.quality_used().label()
        )
    } else {
        " (lossless)".to_string()
    };

    let mut lines = vec![
        format!("{} → {}", display_name(source), output_name),
        format!("{}Format: {}{}", indent(1), format_label(Some(result.format())), quality),
    ];
    if report.original_size > 0 {
        lines.push(format!(
            "{}Size: {} → {} ({:.1}% smaller)",
            indent(1),
            format_file_size(report.original_size),
            report.size_label(),
            report.reduction_percent
        ));
    } else {
        lines.push(format!("{}Size: {}", indent(1), report.size_label()));
    }
    if report.attempts > 1 {
        lines.push(format!("{}Encodes: {}", indent(1), report.attempts));
    }
    lines
}

/// Guidance shown when no quality meets the requested size.
pub fn format_budget_unreachable(target_bytes: u64, smallest: Option<u64>) -> Vec<String> {
    let mut lines = vec![format!(
        "Could not reach {} at any quality.",
        format_file_size(target_bytes)
    )];
    match smallest {
        Some(size) => lines.push(format!(
            "{}Smallest possible at this size: {}. Try a larger target, or resize the image first.",
            indent(1),
            format_file_size(size)
        )),
        None => lines.push(format!(
            "{}Try a larger target, or resize the image first.",
            indent(1)
        )),
    }
    lines
}

pub fn format_advice(advice: &TargetAdvice) -> String {
    format!("Note: {advice}")
}

/// One line per accepted live result.
pub fn format_live_event(ticket: Ticket, outcome: &LiveOutcome) -> String {
    match outcome {
        Ok(report) => format!(
            "#{} {} {} at {} ({:.1}% smaller)",
            ticket.value(),
            format_label(Some(report.result.format())),
            report.size_label(),
            report.quality_used(),
            report.reduction_percent
        ),
        Err(e) => format!("#{} {}", ticket.value(), e),
    }
}

// ============================================================================
// info
// ============================================================================

pub fn format_info(source: &SourceImage) -> Vec<String> {
    let mut lines = vec![
        display_name(source).to_string(),
        format!("{}Dimensions: {}x{}", indent(1), source.width(), source.height()),
        format!("{}Format: {}", indent(1), format_label(source.format())),
        format!("{}Size: {}", indent(1), format_file_size(source.original_size())),
    ];
    let limits = target_limits(source.original_size());
    if limits.max_kb > 0 {
        lines.push(format!(
            "{}Target range: {} KB to {} KB (suggested {} KB)",
            indent(1),
            limits.min_kb,
            limits.max_kb,
            limits.default_kb
        ));
    }
    lines
}

// ============================================================================
// JSON summaries
// ============================================================================

/// Machine-readable result of a compress, convert or resize command.
#[derive(Debug, Serialize)]
pub struct CompressSummary {
    pub input: Option<String>,
    pub output: Option<String>,
    pub format: Format,
    pub quality: u32,
    pub width: u32,
    pub height: u32,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub reduction_percent: f64,
    pub attempts: u32,
}

impl CompressSummary {
    pub fn new(report: &CompressReport, source: &SourceImage, output: Option<String>) -> Self {
        Self {
            input: source.name().map(str::to_string),
            output,
            format: report.result.format(),
            quality: report.quality_used().value(),
            width: source.width(),
            height: source.height(),
            original_bytes: report.original_size,
            compressed_bytes: report.result.size_bytes(),
            reduction_percent: report.reduction_percent,
            attempts: report.attempts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InfoSummary {
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: Option<Format>,
    pub size_bytes: u64,
    pub target_min_kb: u64,
    pub target_max_kb: u64,
    pub target_default_kb: u64,
}

impl InfoSummary {
    pub fn new(source: &SourceImage) -> Self {
        let limits = target_limits(source.original_size());
        Self {
            name: source.name().map(str::to_string),
            width: source.width(),
            height: source.height(),
            format: source.format(),
            size_bytes: source.original_size(),
            target_min_kb: limits.min_kb,
            target_max_kb: limits.max_kb,
            target_default_kb: limits.default_kb,
        }
    }
}

// ============================================================================
// Printing
// ============================================================================

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_compress_report(report: &CompressReport, source: &SourceImage, output_name: &str) {
    print_lines(&format_compress_report(report, source, output_name));
}

pub fn print_info(source: &SourceImage) {
    print_lines(&format_info(source));
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
