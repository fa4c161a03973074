/*!
 * Reporting functionality for snapfs
 *
 * Renders post-run summaries with the tabled library. Reports go to stderr
 * so machine output on stdout (diff JSON, audit log) stays clean.
 */

use std::collections::BTreeMap;
use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::compare::CompareResult;
use crate::patch::ApplyRecord;

/// Summary of a patch run
#[derive(Debug, Clone)]
pub struct PatchReport {
    /// Time taken to apply the diff
    pub duration: Duration,
    /// Changes applied
    pub total: usize,
    /// Count per audit status token
    pub status_counts: BTreeMap<String, usize>,
}

impl PatchReport {
    /// Build a report from the audit records of one patch run
    pub fn from_records(records: &[ApplyRecord], duration: Duration) -> Self {
        let mut status_counts = BTreeMap::new();
        for record in records {
            *status_counts.entry(record.status.to_string()).or_insert(0) += 1;
        }
        Self {
            duration,
            total: records.len(),
            status_counts,
        }
    }
}

/// Summary of a quick-compare run
#[derive(Debug, Clone)]
pub struct CompareReport {
    /// Time taken to scan and compare
    pub duration: Duration,
    /// The comparison outcome
    pub result: CompareResult,
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator for snapfs runs
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Print a patch summary to stderr
    pub fn print_patch_report(&self, report: &PatchReport) {
        eprintln!("\n{}", self.generate_patch_report(report));
    }

    /// Generate a patch summary string
    pub fn generate_patch_report(&self, report: &PatchReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.patch_console_report(report),
        }
    }

    /// Print a compare summary to stderr
    pub fn print_compare_report(&self, report: &CompareReport) {
        eprintln!("\n{}", self.generate_compare_report(report));
    }

    /// Generate a compare summary string
    pub fn generate_compare_report(&self, report: &CompareReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.compare_console_report(report),
        }
    }

    fn patch_console_report(&self, report: &PatchReport) -> String {
        #[derive(Tabled)]
        struct StatusRow {
            #[tabled(rename = "Status")]
            status: String,

            #[tabled(rename = "Count")]
            count: usize,
        }

        let rows: Vec<StatusRow> = report
            .status_counts
            .iter()
            .map(|(status, count)| StatusRow {
                status: status.clone(),
                count: *count,
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        format!(
            "✅  PATCH COMPLETE: {} changes in {:.4?}\n{}",
            report.total, report.duration, table
        )
    }

    fn compare_console_report(&self, report: &CompareReport) -> String {
        #[derive(Tabled)]
        struct FindingRow {
            #[tabled(rename = "Finding")]
            finding: String,

            #[tabled(rename = "Path")]
            path: String,
        }

        let result = &report.result;
        let mut rows = Vec::new();
        for path in &result.extra {
            rows.push(FindingRow {
                finding: "extra".to_string(),
                path: path.clone(),
            });
        }
        for path in &result.missing {
            rows.push(FindingRow {
                finding: "missing".to_string(),
                path: path.clone(),
            });
        }
        for mismatch in &result.different {
            rows.push(FindingRow {
                finding: "size differs".to_string(),
                path: format!(
                    "{} ({} -> {})",
                    mismatch.path, mismatch.recorded, mismatch.found
                ),
            });
        }

        let verdict = if result.is_clean() {
            format!("✅  TREE MATCHES SNAPSHOT ({:.4?})", report.duration)
        } else {
            format!(
                "⚠️  TREE DIFFERS: {} extra, {} missing, {} size mismatches ({:.4?})",
                result.extra.len(),
                result.missing.len(),
                result.different.len(),
                report.duration
            )
        };

        if rows.is_empty() {
            return verdict;
        }

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        format!("{}\n{}", verdict, table)
    }
}
