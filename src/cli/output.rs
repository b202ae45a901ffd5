//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::device::CommitReport;
use crate::planner::{BatchResult, BatchStatus, ExecutionMode, Outcome};
use crate::reconciler::GetReport;

use super::commands::OutputFormat;
use super::runner::DeviceReport;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Batch row for table display.
#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Changed")]
    changed: usize,
    #[tabled(rename = "Unchanged")]
    unchanged: usize,
    #[tabled(rename = "Errors")]
    errors: usize,
    #[tabled(rename = "Status")]
    status: String,
}

/// Planned call row for table display.
#[derive(Tabled)]
struct CallRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Body")]
    digest: String,
}

/// Resource row for table display.
#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Columns")]
    columns: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the reports of a run.
    #[must_use]
    pub fn format_reports(&self, reports: &[DeviceReport]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(reports).unwrap_or_default(),
            OutputFormat::Text => reports.iter().map(Self::format_device_text).collect(),
        }
    }

    /// Formats one device report as text.
    fn format_device_text(report: &DeviceReport) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "\n{} {}", "Device".bold(), report.device);

        if report.batches.is_empty() && report.aborted.is_none() {
            let _ = writeln!(output, "   Nothing to do.");
        }

        if !report.batches.is_empty() {
            let rows: Vec<BatchRow> = report
                .batches
                .iter()
                .map(|b| BatchRow {
                    kind: b.kind.to_string(),
                    changed: b.count(Outcome::Changed),
                    unchanged: b.count(Outcome::Unchanged),
                    errors: b.count(Outcome::Error),
                    status: Self::format_status(b.status()),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        for batch in &report.batches {
            Self::write_batch_details(&mut output, batch);
        }

        if let Some(commit) = &report.commit {
            Self::write_commit(&mut output, commit);
        }

        if let Some(reason) = &report.aborted {
            let _ = writeln!(output, "\n{} Aborted: {reason}", "✗".red());
        } else if report.changed() {
            let _ = writeln!(output, "\n{} Changes made", "✓".green());
        } else {
            let _ = writeln!(output, "\n{} No changes required", "✓".green());
        }

        output
    }

    fn write_batch_details(output: &mut String, batch: &BatchResult) {
        if !batch.errors.is_empty() {
            let _ = writeln!(output, "\n{} {} errors:", "⚠".yellow(), batch.kind);
            for error in &batch.errors {
                let _ = writeln!(output, "   - {error}");
            }
        }

        for effect in &batch.side_effects {
            let _ = writeln!(output, "   * {effect}");
        }

        if batch.mode == ExecutionMode::Preview && !batch.calls.is_empty() {
            let _ = writeln!(output, "\n{} calls planned for {}:", "→".cyan(), batch.kind);
            let rows: Vec<CallRow> = batch
                .calls
                .iter()
                .enumerate()
                .map(|(i, call)| CallRow {
                    index: i + 1,
                    method: call.method.to_string(),
                    path: call.path.clone(),
                    digest: call.body_digest(),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }
    }

    fn write_commit(output: &mut String, commit: &CommitReport) {
        if commit.sent {
            let _ = writeln!(output, "\n{} Committed pending policies", "✓".green());
        } else {
            let _ = writeln!(output, "\n{} Would commit: {}", "→".cyan(), commit.call);
        }
    }

    /// Formats a standalone commit.
    #[must_use]
    pub fn format_commit(&self, commit: &CommitReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(commit).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                Self::write_commit(&mut output, commit);
                output
            }
        }
    }

    /// Formats a get report.
    #[must_use]
    pub fn format_get(&self, report: &GetReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("\n{} on {}\n", report.kind.to_string().bold(), report.device);

                if report.entries.is_empty() {
                    output.push_str("   No entries.\n");
                    return output;
                }

                let rows: Vec<EntryRow> = report
                    .entries
                    .iter()
                    .map(|(name, rows)| EntryRow {
                        name: name.clone(),
                        rows: rows.len(),
                        columns: Self::truncate(
                            &rows
                                .first()
                                .map(|r| r.keys().cloned().collect::<Vec<_>>().join(", "))
                                .unwrap_or_default(),
                            60,
                        ),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                let filter = if report.summary.filtered { " (filtered)" } else { "" };
                let _ = writeln!(
                    output,
                    "\n{} entries, {} distinct names{filter}",
                    report.summary.total, report.summary.distinct_keys
                );
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let errors: Vec<_> = result
                    .errors
                    .iter()
                    .map(|e| serde_json::json!({"field": e.field, "message": e.message}))
                    .collect();
                serde_json::to_string_pretty(&serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": errors,
                    "warnings": result.warnings,
                }))
                .unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Desired state is valid\n", "✓".green())
                } else {
                    let mut s = format!("{} Desired state is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(s, "   - {}: {}", error.field, error.message);
                    }
                    s
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a batch status with color.
    fn format_status(status: BatchStatus) -> String {
        match status {
            BatchStatus::Clean => "clean".green().to_string(),
            BatchStatus::Degraded => "degraded".yellow().to_string(),
            BatchStatus::Failed => "failed".red().to_string(),
            BatchStatus::Aborted => "aborted".red().bold().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }
}
