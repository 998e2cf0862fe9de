//! Domain model for the backup engine.
//!
//! These are the shapes hosts see and the shapes the persistence layer
//! stores: credentials, schedules, selected files, per-file upload records,
//! run history entries, and the app-state aggregate. All timestamps are
//! epoch milliseconds.

use serde::{Deserialize, Serialize};

/// Telegram credentials: bot token plus destination chat id. Singleton,
/// overwritten on update, deleted on full reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

/// How often a schedule is meant to fire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    Daily,
    Weekly,
    Custom,
}

/// A backup schedule definition. Execution is triggered by an external
/// scheduler facility; this engine only stores and validates the definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSchedule {
    pub id: String,
    pub name: String,
    pub frequency: ScheduleFrequency,
    /// Wall-clock slot in `HH:mm`.
    pub time: String,
    /// Folder paths covered by this schedule.
    pub folders: Vec<String>,
    pub backup_new_only: bool,
    pub enabled: bool,
    pub created_at: i64,
    #[serde(default)]
    pub last_run: Option<i64>,
}

/// Media kind of a selected or uploaded file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    /// Folders are not leaf-transferable; they must be expanded upstream or
    /// they fail per-file with an unsupported-type error.
    Folder,
}

/// One candidate file as produced by the host's media enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFile {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

/// One file as recorded after a successful upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// SHA-256 hex of the uploaded bytes. Recorded for duplicate detection;
    /// never compared by this engine.
    pub hash: String,
    pub uploaded_at: i64,
    #[serde(default)]
    pub remote_message_id: Option<String>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Partial,
}

/// One immutable history entry per completed run, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHistory {
    pub id: String,
    pub timestamp: i64,
    pub status: RunStatus,
    /// Count of *successful* uploads; always equals `files.len()`.
    pub files_count: usize,
    pub files: Vec<BackupFile>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Set when the run was triggered on behalf of a schedule.
    #[serde(default)]
    pub scheduled_backup_id: Option<String>,
}

/// Aggregate outcome of one batch upload, before it is turned into a
/// history entry. Invariant: `attempted == succeeded.len() + failed_names.len()`.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub attempted: usize,
    pub succeeded: Vec<BackupFile>,
    pub failed_names: Vec<String>,
}

/// Advisory progress notification emitted after each file completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
    #[serde(default)]
    pub current_file: Option<String>,
}

impl UploadProgress {
    pub fn new(completed: usize, total: usize, current_file: Option<String>) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            completed,
            total,
            percentage,
            current_file,
        }
    }
}

/// The aggregate root: loaded once from storage, mutated only through the
/// engine's named operations, exposed to hosts as cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub credentials: Option<Credentials>,
    pub is_setup: bool,
    pub is_connected: bool,
    #[serde(default)]
    pub last_backup_time: Option<i64>,
    pub total_files_uploaded: u64,
    pub schedules: Vec<BackupSchedule>,
    pub backup_history: Vec<BackupHistory>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            credentials: None,
            is_setup: false,
            is_connected: false,
            last_backup_time: None,
            total_files_uploaded: 0,
            schedules: Vec::new(),
            backup_history: Vec::new(),
        }
    }
}
