//! Remote store seam — the trait the uploader drives, and its Telegram
//! implementation.
//!
//! Keeping the seam as a trait lets tests run the full orchestration against
//! an in-memory fake, and lets hosts swap in a different chat-based backend
//! without touching the engine.

use crate::error::BackupError;
use crate::types::{Credentials, SelectedFile};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tgvault_telegram::files::guess_mime_type;
use tgvault_telegram::types::{ChatId, TelegramConfig, TgChat, TgUser};
use tgvault_telegram::{ByteProgress, FileUpload, TelegramClient};

/// What the remote store hands back for a successfully transferred file.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Opaque reference to the file in the remote chat.
    pub remote_message_id: String,
    /// SHA-256 hex of the transferred bytes.
    pub sha256: String,
}

/// A chat-based storage backend: validates credentials and destination,
/// transfers single files by media kind.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn validate_identity(&self) -> Result<TgUser, BackupError>;
    async fn validate_destination(&self) -> Result<TgChat, BackupError>;
    async fn upload_photo(&self, file: &SelectedFile) -> Result<StoredObject, BackupError>;
    async fn upload_video(&self, file: &SelectedFile) -> Result<StoredObject, BackupError>;
    async fn upload_document(&self, file: &SelectedFile) -> Result<StoredObject, BackupError>;
}

/// [`RemoteStore`] over the Telegram Bot API.
pub struct TelegramStore {
    client: TelegramClient,
    chat_id: ChatId,
    on_bytes: Option<ByteProgress>,
}

impl std::fmt::Debug for TelegramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramStore")
            .field("client", &self.client)
            .field("chat_id", &self.chat_id)
            .field("on_bytes", &self.on_bytes.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl TelegramStore {
    pub fn new(credentials: &Credentials) -> Result<Self, BackupError> {
        let config = TelegramConfig {
            token: credentials.bot_token.clone(),
            ..Default::default()
        };
        let client = TelegramClient::new(&config).map_err(BackupError::Auth)?;
        Ok(Self {
            client,
            chat_id: ChatId::parse(&credentials.chat_id),
            on_bytes: None,
        })
    }

    /// Attach a byte-level progress callback forwarded to every upload.
    pub fn with_byte_progress(mut self, on_bytes: ByteProgress) -> Self {
        self.on_bytes = Some(on_bytes);
        self
    }

    async fn upload(
        &self,
        file: &SelectedFile,
        field_name: &str,
        caption_prefix: &str,
    ) -> Result<StoredObject, BackupError> {
        let data = tokio::fs::read(&file.path).await.map_err(|e| BackupError::Transfer {
            name: file.name.clone(),
            message: format!("read {}: {e}", file.path),
        })?;
        let sha256 = hex::encode(Sha256::digest(&data));

        let upload = FileUpload {
            field_name: field_name.to_string(),
            file_name: file.name.clone(),
            mime_type: guess_mime_type(&file.name).to_string(),
            data,
        };
        let caption = format!("{caption_prefix} {}", file.name);

        let message = self
            .client
            .upload_file(&self.chat_id, upload, Some(&caption), self.on_bytes.clone())
            .await
            .map_err(|message| BackupError::Transfer {
                name: file.name.clone(),
                message,
            })?;

        Ok(StoredObject {
            remote_message_id: message.message_id.to_string(),
            sha256,
        })
    }
}

#[async_trait]
impl RemoteStore for TelegramStore {
    async fn validate_identity(&self) -> Result<TgUser, BackupError> {
        self.client.get_me().await.map_err(BackupError::Auth)
    }

    async fn validate_destination(&self) -> Result<TgChat, BackupError> {
        self.client
            .get_chat(&self.chat_id)
            .await
            .map_err(BackupError::Destination)
    }

    async fn upload_photo(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
        self.upload(file, "photo", "📸").await
    }

    async fn upload_video(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
        self.upload(file, "video", "🎬").await
    }

    async fn upload_document(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
        self.upload(file, "document", "📄").await
    }
}
