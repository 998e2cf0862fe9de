//! Low-level HTTP client for the Telegram Bot API.
//!
//! Handles authentication (bearer token in URL), retries, rate limiting,
//! multipart uploads, and error mapping.

use crate::files::{self, FileUpload};
use crate::types::*;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Chunk size for streamed uploads with byte-progress reporting.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Callback receiving cumulative `(sent, total)` bytes during an upload.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Low-level Telegram Bot API HTTP client.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    max_retries: u32,
    rate_limit_ms: u64,
    /// Timestamp of the last request (for rate limiting).
    last_request_ms: Arc<AtomicU64>,
}

impl TelegramClient {
    /// Create a new client from a [`TelegramConfig`].
    pub fn new(config: &TelegramConfig) -> Result<Self, String> {
        if config.token.is_empty() {
            return Err("Bot token must not be empty".into());
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("HTTP client build error: {e}"))?;

        Ok(Self {
            http,
            token: config.token.clone(),
            api_base: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            max_retries: config.max_retries,
            rate_limit_ms: config.rate_limit_ms,
            last_request_ms: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Build the full URL for a Bot API method.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Enforce rate limiting between requests.
    async fn rate_limit(&self) {
        if self.rate_limit_ms == 0 {
            return;
        }
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let last = self.last_request_ms.load(Ordering::Relaxed);
        if last > 0 {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.rate_limit_ms {
                let wait = self.rate_limit_ms - elapsed;
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
        }
        let updated = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_request_ms.store(updated, Ordering::Relaxed);
    }

    /// Call a Bot API method with a JSON body and parse the response.
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<R, String> {
        self.rate_limit().await;
        let url = self.method_url(method);
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                debug!(
                    "Telegram API retry {}/{} for {} after {:?}",
                    attempt, self.max_retries, method, backoff
                );
                tokio::time::sleep(backoff).await;
            }

            let resp = self.http.post(&url).json(params).send().await;
            match resp {
                Ok(r) => {
                    let status = r.status();
                    let body = r
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("{{\"ok\":false,\"description\":\"{e}\"}}"));

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        // Parse retry_after if possible
                        if let Ok(api_resp) =
                            serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                        {
                            if let Some(params) = &api_resp.parameters {
                                if let Some(retry_after) = params.retry_after {
                                    let wait = Duration::from_secs(retry_after as u64);
                                    warn!(
                                        "Telegram rate limited, waiting {:?} (attempt {})",
                                        wait, attempt
                                    );
                                    tokio::time::sleep(wait).await;
                                    continue;
                                }
                            }
                        }
                        last_err = format!("Rate limited (429): {body}");
                        continue;
                    }

                    let api_resp: ApiResponse<R> = serde_json::from_str(&body).map_err(|e| {
                        format!("Failed to parse Telegram response for {method}: {e}\nBody: {body}")
                    })?;

                    if api_resp.ok {
                        return api_resp
                            .result
                            .ok_or_else(|| format!("Telegram {method}: ok=true but no result"));
                    }

                    let desc = api_resp
                        .description
                        .unwrap_or_else(|| "Unknown error".into());
                    let code = api_resp.error_code.unwrap_or(0);

                    // Don't retry client errors (4xx) other than 429.
                    if (400..500).contains(&code) && code != 429 {
                        return Err(format!("Telegram API error {code}: {desc}"));
                    }

                    last_err = format!("Telegram API error {code}: {desc}");
                }
                Err(e) => {
                    last_err = format!("HTTP request to {} failed: {e}", method);
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(last_err);
                }
            }
        }

        Err(format!(
            "All {} retries exhausted for {}: {}",
            self.max_retries, method, last_err
        ))
    }

    /// Call a Bot API method with no parameters.
    pub async fn call_no_params<R: DeserializeOwned>(&self, method: &str) -> Result<R, String> {
        let empty: serde_json::Value = serde_json::json!({});
        self.call(method, &empty).await
    }

    /// Call a Bot API method with multipart form data (for file uploads).
    /// Not retried: the form body can only be sent once.
    pub async fn call_multipart<R: DeserializeOwned>(
        &self,
        method: &str,
        form: multipart::Form,
    ) -> Result<R, String> {
        self.rate_limit().await;
        let url = self.method_url(method);

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Multipart upload to {method} failed: {e}"))?;

        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("{{\"ok\":false,\"description\":\"{e}\"}}"));

        let api_resp: ApiResponse<R> = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response for {method}: {e}"))?;

        if api_resp.ok {
            api_resp
                .result
                .ok_or_else(|| format!("Telegram {method}: ok=true but no result"))
        } else {
            let desc = api_resp
                .description
                .unwrap_or_else(|| "Unknown error".into());
            let code = api_resp.error_code.unwrap_or(0);
            Err(format!("Telegram API error {code}: {desc}"))
        }
    }

    /// Get the bot's own user via getMe.
    pub async fn get_me(&self) -> Result<TgUser, String> {
        self.call_no_params("getMe").await
    }

    /// Get chat info via getChat.
    pub async fn get_chat(&self, chat_id: &ChatId) -> Result<TgChat, String> {
        self.call("getChat", &serde_json::json!({ "chat_id": chat_id }))
            .await
    }

    /// Send a plain-text message to a chat.
    pub async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<TgMessage, String> {
        self.call(
            "sendMessage",
            &serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }),
        )
        .await
    }

    /// Upload a file, dispatching on the upload's field name (photo, video,
    /// document). With a progress callback the payload is sent as a chunked
    /// stream and the callback receives cumulative `(sent, total)` bytes.
    pub async fn upload_file(
        &self,
        chat_id: &ChatId,
        upload: FileUpload,
        caption: Option<&str>,
        on_progress: Option<ByteProgress>,
    ) -> Result<TgMessage, String> {
        let method = files::upload_method_for_field(&upload.field_name).to_string();

        let form = match on_progress {
            None => files::build_upload_form(chat_id, &upload, caption)?,
            Some(cb) => {
                let total = upload.data.len() as u64;
                let sent = Arc::new(AtomicU64::new(0));
                let chunks: Vec<Bytes> = upload
                    .data
                    .chunks(UPLOAD_CHUNK_BYTES)
                    .map(Bytes::copy_from_slice)
                    .collect();
                let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
                    let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed)
                        + chunk.len() as u64;
                    cb(done.min(total), total);
                    Ok::<Bytes, std::io::Error>(chunk)
                }));

                let part = multipart::Part::stream_with_length(
                    reqwest::Body::wrap_stream(stream),
                    total,
                )
                .file_name(upload.file_name.clone())
                .mime_str(&upload.mime_type)
                .map_err(|e| format!("Invalid MIME type: {e}"))?;

                let mut form = multipart::Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part(upload.field_name.clone(), part);
                if let Some(c) = caption {
                    form = form.text("caption", c.to_string());
                }
                form
            }
        };

        self.call_multipart(&method, form).await
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the token (masked for logging).
    pub fn masked_token(&self) -> String {
        if self.token.len() > 10 {
            format!(
                "{}...{}",
                &self.token[..5],
                &self.token[self.token.len() - 4..]
            )
        } else {
            "***".to_string()
        }
    }
}
