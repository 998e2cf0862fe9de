//! # TgVault – Telegram Bot API client
//!
//! The wire-level half of the backup engine: everything that talks HTTP to
//! `api.telegram.org` lives here.
//!
//! ## Features
//!
//! - **Validation** – `getMe` for bot identity, `getChat` for the backup
//!   destination
//! - **Uploads** – multipart `sendPhoto` / `sendVideo` / `sendDocument`
//!   dispatch, with optional byte-level progress via a chunked stream body
//! - **Messaging** – plain-text notifications via `sendMessage`
//! - **Resilience** – request timeout, exponential backoff on transient
//!   failures, `retry_after` handling on 429, minimum-interval rate limiting

pub mod client;
pub mod files;
pub mod types;

pub use client::{ByteProgress, TelegramClient};
pub use files::FileUpload;
