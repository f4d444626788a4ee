use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CANCELLED_BY_USER: &str = "Operation cancelled by user...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Disposition {
    #[default]
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

/// Snapshot of one batch. `complete` stays false until the batch reaches a
/// terminal state; earlier snapshots are partial.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub disposition: Disposition,
    pub complete: bool,
    pub cnt_found: usize,
    pub cnt_selected: usize,
    pub progress_converted: usize,
    pub progress_success: usize,
    pub progress_failed: usize,
    pub success: bool,
    pub is_system_error: bool,
    pub error: Option<String>,
    pub last_file_error: Option<String>,
    pub log_path: Option<PathBuf>,
    pub log_warning: Option<String>,
}

impl BatchReport {
    /// Human readable final report.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.disposition {
            Disposition::InProgress => {
                lines.push("Timestamping in progress...".to_string());
                return lines;
            }
            Disposition::Failed => {
                lines.push("Error:".to_string());
                lines.push(self.error.clone().unwrap_or_default());
            }
            Disposition::Cancelled => {
                lines.push(
                    self.error
                        .clone()
                        .unwrap_or_else(|| CANCELLED_BY_USER.to_string()),
                );
            }
            Disposition::Completed => {
                lines.push("Finished timestamping files".to_string());
                lines.push(format!("Files found: {}", self.cnt_found));
                if self.cnt_found != self.cnt_selected {
                    lines.push(format!(
                        "   of which {} were chosen for timestamping",
                        self.cnt_selected
                    ));
                }
                lines.push(format!("Files timestamped: {}", self.progress_success));
                if self.progress_failed > 0 {
                    lines.push(format!("Failed timestampings: {}", self.progress_failed));
                }
                if let Some(path) = &self.log_path {
                    lines.push(format!("Detailed report: {}", path.display()));
                }
            }
        }
        if let Some(warning) = &self.log_warning {
            lines.push(format!("Warning: {warning}"));
        }
        lines
    }
}

/// Collects counts and the final disposition of the running batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultAccumulator {
    report: BatchReport,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_found(&mut self, count: usize) {
        self.report.cnt_found = count;
    }

    pub fn record_selected(&mut self, count: usize) {
        self.report.cnt_selected = count;
    }

    pub fn record_file(&mut self, outcome: Result<(), &str>) {
        self.report.progress_converted += 1;
        match outcome {
            Ok(()) => self.report.progress_success += 1,
            Err(err) => {
                self.report.progress_failed += 1;
                self.report.last_file_error = Some(err.to_string());
            }
        }
    }

    pub fn set_log_path(&mut self, path: PathBuf) {
        self.report.log_path = Some(path);
    }

    pub fn set_log_warning(&mut self, warning: String) {
        self.report.log_warning = Some(warning);
    }

    /// Partial failures still count as a successful batch.
    pub fn finish_completed(&mut self) {
        self.finish(Disposition::Completed);
        self.report.success = true;
    }

    pub fn finish_cancelled(&mut self, reason: Option<String>) {
        self.finish(Disposition::Cancelled);
        self.report.success = false;
        self.report.is_system_error = false;
        self.report.error = Some(reason.unwrap_or_else(|| CANCELLED_BY_USER.to_string()));
    }

    pub fn finish_failed(&mut self, error: String) {
        self.finish(Disposition::Failed);
        self.report.success = false;
        self.report.is_system_error = true;
        self.report.error = Some(error);
    }

    fn finish(&mut self, disposition: Disposition) {
        self.report.disposition = disposition;
        self.report.complete = true;
    }

    pub fn snapshot(&self) -> BatchReport {
        self.report.clone()
    }
}
