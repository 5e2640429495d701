use crate::upload::{FileRow, FileStatus};

/// Inputs and dialogs that live only in the window.
#[derive(Default)]
pub struct UiState {
    pub launchpad_input: String,
    pub server_input: String,
    pub delete_input: String,
    /// File id awaiting confirmation in the delete dialog.
    pub pending_delete: Option<String>,
}

/// Per-status counts for the rows of the running batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub conflicts: usize,
}

impl BatchSummary {
    pub fn from_rows(rows: &[FileRow]) -> Self {
        let mut summary = Self {
            total: rows.len(),
            ..Self::default()
        };
        for row in rows {
            match row.status {
                FileStatus::DoneSuccess => summary.successful += 1,
                FileStatus::DoneError => summary.failed += 1,
                FileStatus::DoneCancelled => summary.cancelled += 1,
                FileStatus::ConflictPending => summary.conflicts += 1,
                _ => {}
            }
        }
        summary
    }

    pub fn finished(&self) -> usize {
        self.successful + self.failed + self.cancelled
    }

    pub fn progress_percentage(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.finished() as f32 / self.total as f32
        }
    }

    pub fn status_text(&self) -> String {
        let mut text = format!(
            "Progress: {}/{} files | ✅ Success: {} | ⏹ Cancelled: {} | ❌ Failed: {}",
            self.finished(),
            self.total,
            self.successful,
            self.cancelled,
            self.failed
        );
        if self.conflicts > 0 {
            text.push_str(&format!(" | ⚠ Waiting on you: {}", self.conflicts));
        }
        text
    }
}
