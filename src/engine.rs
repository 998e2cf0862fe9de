//! # Backup Engine
//!
//! The aggregate root hosts embed. All application state (credentials,
//! schedules, history, counters) lives here, loaded once from the
//! [`KeyValueStore`] at construction and mutated only through the named
//! operations below. Every mutation persists before touching memory, so a
//! storage failure leaves the in-memory aggregate unchanged and a restart
//! re-derives state from the persisted layer.
//!
//! Wrap the engine in [`BackupEngineState`] (`Arc<Mutex<_>>`) so mutating
//! operations are serialized with respect to each other.

use crate::error::BackupError;
use crate::history;
use crate::remote::RemoteStore;
use crate::schedules::{self, ScheduleDraft};
use crate::storage::{keys, KeyValueStore};
use crate::types::{
    AppState, BackupHistory, BackupSchedule, Credentials, SelectedFile,
};
use crate::uploader::{self, CancelFlag, ProgressSink};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tgvault_telegram::types::{TgChat, TgUser};

/// Thread-safe engine handle for hosts.
pub type BackupEngineState = Arc<Mutex<BackupEngine>>;

/// The central backup engine.
pub struct BackupEngine {
    storage: Box<dyn KeyValueStore>,
    state: AppState,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl BackupEngine {
    /// Load the aggregate from storage.
    pub fn new(storage: Box<dyn KeyValueStore>) -> Result<Self, BackupError> {
        let mut engine = Self {
            storage,
            state: AppState::default(),
        };
        engine.reload()?;
        Ok(engine)
    }

    /// Load and wrap in the shared handle.
    pub fn shared(storage: Box<dyn KeyValueStore>) -> Result<BackupEngineState, BackupError> {
        Ok(Arc::new(Mutex::new(Self::new(storage)?)))
    }

    /// Re-derive the in-memory aggregate from the persisted layer.
    pub fn reload(&mut self) -> Result<(), BackupError> {
        let bot_token = self.storage.get(keys::BOT_TOKEN)?;
        let chat_id = self.storage.get(keys::CHAT_ID)?;
        let credentials = match (bot_token, chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(Credentials { bot_token, chat_id }),
            _ => None,
        };

        let schedules = self.read_json_key::<Vec<BackupSchedule>>(keys::SCHEDULES)?;
        let backup_history = self.read_json_key::<Vec<BackupHistory>>(keys::HISTORY)?;
        let last_backup_time = self
            .storage
            .get(keys::LAST_BACKUP_TIME)?
            .and_then(|raw| raw.parse::<i64>().ok());
        let total_files_uploaded = self
            .storage
            .get(keys::TOTAL_FILES_UPLOADED)?
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);

        self.state = AppState {
            is_setup: credentials.is_some(),
            credentials,
            is_connected: false,
            last_backup_time,
            total_files_uploaded,
            schedules,
            backup_history,
        };
        debug!(
            "State loaded: setup={}, {} schedules, {} history entries",
            self.state.is_setup,
            self.state.schedules.len(),
            self.state.backup_history.len()
        );
        Ok(())
    }

    fn read_json_key<T: serde::de::DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, BackupError> {
        match self.storage.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| BackupError::Storage(format!("parse {key}: {e}"))),
            None => Ok(T::default()),
        }
    }

    fn write_json_key<T: serde::Serialize>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), BackupError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| BackupError::Storage(format!("serialize {key}: {e}")))?;
        self.storage.set(key, &raw)
    }

    // ── Observable state ────────────────────────────────────────────

    /// Read-only snapshot of the aggregate.
    pub fn snapshot(&self) -> AppState {
        self.state.clone()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.state.credentials.as_ref()
    }

    pub fn is_setup(&self) -> bool {
        self.state.is_setup
    }

    // ── Credentials & connectivity ──────────────────────────────────

    /// Set or clear the credential singleton. Persists before updating
    /// memory; clearing also drops the connectivity flag.
    pub fn set_credentials(
        &mut self,
        credentials: Option<Credentials>,
    ) -> Result<(), BackupError> {
        match credentials {
            Some(credentials) => {
                if credentials.bot_token.trim().is_empty() || credentials.chat_id.trim().is_empty()
                {
                    return Err(BackupError::Validation(
                        "Please enter both Bot Token and Chat ID".to_string(),
                    ));
                }
                self.storage.set(keys::BOT_TOKEN, &credentials.bot_token)?;
                self.storage.set(keys::CHAT_ID, &credentials.chat_id)?;
                info!("Credentials updated");
                self.state.credentials = Some(credentials);
                self.state.is_setup = true;
            }
            None => {
                self.storage.delete_many(&[keys::BOT_TOKEN, keys::CHAT_ID])?;
                info!("Credentials cleared");
                self.state.credentials = None;
                self.state.is_setup = false;
                self.state.is_connected = false;
            }
        }
        Ok(())
    }

    /// Memory-only connectivity flag, owned by the host's reachability
    /// signals and the validation flow below.
    pub fn set_connected(&mut self, connected: bool) {
        self.state.is_connected = connected;
    }

    /// Validate the bot identity and destination chat. Sets the
    /// connectivity flag on success, clears it on failure.
    pub async fn test_connection(
        &mut self,
        store: &dyn RemoteStore,
    ) -> Result<(TgUser, TgChat), BackupError> {
        let outcome = async {
            let user = store.validate_identity().await?;
            let chat = store.validate_destination().await?;
            Ok((user, chat))
        }
        .await;

        match &outcome {
            Ok((user, _)) => {
                info!(
                    "Connection test passed: @{}",
                    user.username.as_deref().unwrap_or("unknown")
                );
                self.state.is_connected = true;
            }
            Err(e) => {
                warn!("Connection test failed: {e}");
                self.state.is_connected = false;
            }
        }
        outcome
    }

    // ── Schedule manager ────────────────────────────────────────────

    /// Create a schedule from a draft: validates, assigns a fresh id,
    /// persists the whole collection, then updates memory.
    pub fn add_schedule(&mut self, draft: ScheduleDraft) -> Result<BackupSchedule, BackupError> {
        let schedule = schedules::build_schedule(draft, now_ms())?;
        let mut updated = self.state.schedules.clone();
        updated.push(schedule.clone());
        self.write_json_key(keys::SCHEDULES, &updated)?;
        self.state.schedules = updated;
        info!("Schedule '{}' created ({})", schedule.name, schedule.id);
        Ok(schedule)
    }

    /// Replace an existing schedule record wholesale.
    pub fn update_schedule(&mut self, schedule: BackupSchedule) -> Result<(), BackupError> {
        schedules::validate_schedule(&schedule)?;
        let mut updated = self.state.schedules.clone();
        let slot = updated
            .iter_mut()
            .find(|s| s.id == schedule.id)
            .ok_or_else(|| BackupError::NotFound(schedule.id.clone()))?;
        *slot = schedule;
        self.write_json_key(keys::SCHEDULES, &updated)?;
        self.state.schedules = updated;
        Ok(())
    }

    /// Flip a schedule's enabled flag.
    pub fn toggle_schedule(&mut self, id: &str) -> Result<BackupSchedule, BackupError> {
        let mut updated = self.state.schedules.clone();
        let slot = updated
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;
        slot.enabled = !slot.enabled;
        let toggled = slot.clone();
        self.write_json_key(keys::SCHEDULES, &updated)?;
        self.state.schedules = updated;
        info!("Schedule '{}' enabled={}", toggled.name, toggled.enabled);
        Ok(toggled)
    }

    /// Remove a schedule by id. Deleting a missing id is a no-op.
    pub fn delete_schedule(&mut self, id: &str) -> Result<(), BackupError> {
        if !self.state.schedules.iter().any(|s| s.id == id) {
            debug!("Delete of missing schedule '{id}' ignored");
            return Ok(());
        }
        let updated: Vec<BackupSchedule> = self
            .state
            .schedules
            .iter()
            .filter(|s| s.id != id)
            .cloned()
            .collect();
        self.write_json_key(keys::SCHEDULES, &updated)?;
        self.state.schedules = updated;
        info!("Schedule '{id}' deleted");
        Ok(())
    }

    // ── Backup runs ─────────────────────────────────────────────────

    /// Run a batch upload over the selection and record the outcome.
    ///
    /// Preconditions fail before any transfer and leave history and
    /// counters untouched. Per-file failures are folded into the run
    /// result; the returned history entry is the newly recorded one. When
    /// `scheduled_backup_id` is given, the entry is linked to that schedule
    /// and the schedule's `last_run` is stamped.
    pub async fn run_backup(
        &mut self,
        store: &dyn RemoteStore,
        selection: &[SelectedFile],
        scheduled_backup_id: Option<&str>,
        on_progress: Option<ProgressSink<'_>>,
        cancel: &CancelFlag,
    ) -> Result<BackupHistory, BackupError> {
        if self.state.credentials.is_none() {
            return Err(BackupError::NoCredentials);
        }
        if selection.is_empty() {
            return Err(BackupError::EmptySelection);
        }

        info!("Backup run started: {} files selected", selection.len());
        let result = uploader::run_uploads(store, selection, on_progress, cancel).await;
        let completed_at = now_ms();
        let entry = history::build_history_entry(
            result,
            completed_at,
            scheduled_backup_id.map(str::to_string),
        );
        self.commit_run(entry, completed_at, scheduled_backup_id)
    }

    /// Persist the run outcome (history, counters, hashes, schedule stamp),
    /// then update the in-memory aggregate.
    fn commit_run(
        &mut self,
        entry: BackupHistory,
        completed_at: i64,
        scheduled_backup_id: Option<&str>,
    ) -> Result<BackupHistory, BackupError> {
        let new_total = self.state.total_files_uploaded + entry.files_count as u64;

        // Newest first.
        let mut new_history = Vec::with_capacity(self.state.backup_history.len() + 1);
        new_history.push(entry.clone());
        new_history.extend(self.state.backup_history.iter().cloned());

        let mut new_hashes = self.file_hashes()?;
        for file in &entry.files {
            if !file.hash.is_empty() {
                new_hashes.insert(file.path.clone(), file.hash.clone());
            }
        }

        let new_schedules = scheduled_backup_id.and_then(|id| {
            let mut updated = self.state.schedules.clone();
            match updated.iter_mut().find(|s| s.id == id) {
                Some(schedule) => {
                    schedule.last_run = Some(completed_at);
                    Some(updated)
                }
                None => {
                    warn!("Run referenced unknown schedule '{id}'");
                    None
                }
            }
        });

        self.write_json_key(keys::HISTORY, &new_history)?;
        self.storage
            .set(keys::TOTAL_FILES_UPLOADED, &new_total.to_string())?;
        self.storage
            .set(keys::LAST_BACKUP_TIME, &completed_at.to_string())?;
        self.write_json_key(keys::FILE_HASHES, &new_hashes)?;
        if let Some(schedules) = &new_schedules {
            self.write_json_key(keys::SCHEDULES, schedules)?;
        }

        self.state.backup_history = new_history;
        self.state.total_files_uploaded = new_total;
        self.state.last_backup_time = Some(completed_at);
        if let Some(schedules) = new_schedules {
            self.state.schedules = schedules;
        }

        match &entry.error_message {
            Some(summary) => info!(
                "Backup run recorded: {:?}, {} uploaded ({summary})",
                entry.status, entry.files_count
            ),
            None => info!(
                "Backup run recorded: {:?}, {} uploaded",
                entry.status, entry.files_count
            ),
        }
        Ok(entry)
    }

    /// The persisted path → SHA-256 map. Recorded after every run, never
    /// compared by the engine.
    pub fn file_hashes(&self) -> Result<HashMap<String, String>, BackupError> {
        self.read_json_key(keys::FILE_HASHES)
    }

    // ── Reset ───────────────────────────────────────────────────────

    /// Delete every engine-owned key and reset memory to the initial state.
    pub fn clear_all_data(&mut self) -> Result<(), BackupError> {
        self.storage.delete_many(&keys::ALL)?;
        self.state = AppState::default();
        info!("All data cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn engine() -> BackupEngine {
        BackupEngine::new(Box::new(MemoryStore::new())).unwrap()
    }

    fn credentials() -> Credentials {
        Credentials {
            bot_token: "123456:ABC".into(),
            chat_id: "-100123".into(),
        }
    }

    #[test]
    fn fresh_engine_is_blank() {
        let engine = engine();
        let state = engine.snapshot();
        assert!(!state.is_setup);
        assert!(state.credentials.is_none());
        assert_eq!(state.total_files_uploaded, 0);
        assert!(state.backup_history.is_empty());
    }

    #[test]
    fn set_credentials_updates_setup_flag() {
        let mut engine = engine();
        engine.set_credentials(Some(credentials())).unwrap();
        assert!(engine.is_setup());
        assert_eq!(engine.credentials().unwrap().chat_id, "-100123");

        engine.set_credentials(None).unwrap();
        assert!(!engine.is_setup());
        assert!(engine.credentials().is_none());
    }

    #[test]
    fn blank_credentials_rejected() {
        let mut engine = engine();
        let result = engine.set_credentials(Some(Credentials {
            bot_token: "  ".into(),
            chat_id: "x".into(),
        }));
        assert!(matches!(result, Err(BackupError::Validation(_))));
        assert!(!engine.is_setup());
    }

    #[test]
    fn schedule_crud_roundtrip() {
        let mut engine = engine();
        let created = engine
            .add_schedule(ScheduleDraft {
                name: "Nightly".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(engine.snapshot().schedules.len(), 1);

        let mut edited = created.clone();
        edited.name = "Nightly photos".into();
        engine.update_schedule(edited).unwrap();
        assert_eq!(engine.snapshot().schedules[0].name, "Nightly photos");

        let toggled = engine.toggle_schedule(&created.id).unwrap();
        assert!(!toggled.enabled);

        engine.delete_schedule(&created.id).unwrap();
        assert!(engine.snapshot().schedules.is_empty());
        // Idempotent delete.
        engine.delete_schedule(&created.id).unwrap();
    }

    #[test]
    fn schedule_ops_on_missing_id() {
        let mut engine = engine();
        assert!(matches!(
            engine.toggle_schedule("nope"),
            Err(BackupError::NotFound(_))
        ));
        let ghost = schedules::build_schedule(
            ScheduleDraft {
                name: "Ghost".into(),
                ..Default::default()
            },
            0,
        )
        .unwrap();
        assert!(matches!(
            engine.update_schedule(ghost),
            Err(BackupError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn shared_handle_serializes_operations() {
        let state = BackupEngine::shared(Box::new(MemoryStore::new())).unwrap();
        let mut guard = state.lock().await;
        guard.set_credentials(Some(credentials())).unwrap();
        assert!(guard.is_setup());
    }

    #[test]
    fn clear_all_data_resets_everything() {
        let mut engine = engine();
        engine.set_credentials(Some(credentials())).unwrap();
        engine
            .add_schedule(ScheduleDraft {
                name: "Nightly".into(),
                ..Default::default()
            })
            .unwrap();

        engine.clear_all_data().unwrap();
        let state = engine.snapshot();
        assert!(!state.is_setup);
        assert!(state.schedules.is_empty());

        engine.reload().unwrap();
        assert!(!engine.is_setup());
        assert!(engine.snapshot().schedules.is_empty());
    }
}
