//! Run record building — turning a batch result into an immutable history
//! entry.

use crate::types::{BackupHistory, RunResult, RunStatus};
use uuid::Uuid;

/// Derive the run status from the batch outcome: everything succeeded →
/// success; nothing succeeded → failed (including a run that attempted
/// nothing); otherwise partial.
pub fn derive_status(result: &RunResult) -> RunStatus {
    if result.succeeded.is_empty() {
        RunStatus::Failed
    } else if result.failed_names.is_empty() && result.succeeded.len() == result.attempted {
        RunStatus::Success
    } else {
        RunStatus::Partial
    }
}

/// Deterministic human-readable failure summary, absent when everything
/// succeeded.
pub fn failure_summary(failed_names: &[String]) -> Option<String> {
    if failed_names.is_empty() {
        None
    } else {
        Some(format!("Failed: {}", failed_names.join(", ")))
    }
}

/// Build the history entry for a completed run. The entry is immutable once
/// created; `files_count` always equals `files.len()`.
pub fn build_history_entry(
    result: RunResult,
    completed_at: i64,
    scheduled_backup_id: Option<String>,
) -> BackupHistory {
    let status = derive_status(&result);
    let error_message = failure_summary(&result.failed_names);

    BackupHistory {
        id: Uuid::new_v4().to_string(),
        timestamp: completed_at,
        status,
        files_count: result.succeeded.len(),
        files: result.succeeded,
        error_message,
        scheduled_backup_id,
    }
}
