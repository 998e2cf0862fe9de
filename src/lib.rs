//! # TgVault – Telegram backup engine
//!
//! A library for backing up user-selected media files to a Telegram chat via
//! the Bot API, with per-file outcome tracking, run history, schedules, and
//! cumulative statistics. There is no CLI or UI surface here: a host
//! application enumerates candidate files, owns navigation, and embeds a
//! [`BackupEngine`] behind the shared [`BackupEngineState`] handle.
//!
//! ## Features
//!
//! - **Batch uploads** – strictly sequential, continue-on-error; one bad
//!   file never sinks the batch, and every selected file ends up counted as
//!   either succeeded or failed
//! - **Run history** – one immutable entry per run (success / failed /
//!   partial), newest first, with a deterministic failure summary
//! - **Statistics** – monotonic total-uploads counter and last-attempt
//!   timestamp
//! - **Schedules** – validated CRUD over schedule definitions plus next-run
//!   computation; firing them is the host scheduler's job
//! - **Write-through persistence** – every mutation lands in the
//!   [`storage::KeyValueStore`] before the in-memory aggregate changes
//! - **Pluggable remote store** – the Telegram client hides behind the
//!   [`remote::RemoteStore`] trait, so tests (and other chat backends) can
//!   stand in for the wire

pub mod engine;
pub mod error;
pub mod history;
pub mod remote;
pub mod schedules;
pub mod storage;
pub mod types;
pub mod uploader;

pub use engine::{BackupEngine, BackupEngineState};
pub use error::BackupError;
pub use remote::{RemoteStore, StoredObject, TelegramStore};
pub use schedules::ScheduleDraft;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use types::{
    AppState, BackupFile, BackupHistory, BackupSchedule, Credentials, MediaKind, RunResult,
    RunStatus, ScheduleFrequency, SelectedFile, UploadProgress,
};
pub use uploader::CancelFlag;

// Re-export the wire crate so hosts can configure the client directly.
pub use tgvault_telegram as telegram;
