//! Batch upload orchestration.
//!
//! Transfers a selection strictly sequentially, continuing past individual
//! failures: one bad file never sinks the batch. Every selected file ends up
//! either in `succeeded` or in `failed_names`, so
//! `attempted == succeeded.len() + failed_names.len()` always holds. The
//! orchestrator performs no persistence; recording the run is the caller's
//! job.

use crate::error::BackupError;
use crate::remote::RemoteStore;
use crate::types::{BackupFile, MediaKind, RunResult, SelectedFile, UploadProgress};
use chrono::Utc;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked between files only. An in-flight
/// transfer is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Callback receiving an [`UploadProgress`] after each file completes.
pub type ProgressSink<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

/// Upload each selected file in order, dispatching on its media kind.
/// Folders are not leaf-transferable and fail per-file.
pub async fn run_uploads(
    store: &dyn RemoteStore,
    selection: &[SelectedFile],
    on_progress: Option<ProgressSink<'_>>,
    cancel: &CancelFlag,
) -> RunResult {
    let total = selection.len();
    let mut result = RunResult::default();

    for (index, file) in selection.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                "Batch cancelled after {}/{} files; keeping completed uploads",
                index, total
            );
            break;
        }

        result.attempted += 1;
        let outcome = match file.kind {
            MediaKind::Photo => store.upload_photo(file).await,
            MediaKind::Video => store.upload_video(file).await,
            MediaKind::Document => store.upload_document(file).await,
            MediaKind::Folder => Err(BackupError::UnsupportedType {
                name: file.name.clone(),
            }),
        };

        match outcome {
            Ok(stored) => {
                debug!(
                    "Uploaded '{}' as message {}",
                    file.name, stored.remote_message_id
                );
                result.succeeded.push(BackupFile {
                    id: file.id.clone(),
                    name: file.name.clone(),
                    path: file.path.clone(),
                    size: file.size,
                    kind: file.kind,
                    hash: stored.sha256,
                    uploaded_at: Utc::now().timestamp_millis(),
                    remote_message_id: Some(stored.remote_message_id),
                });
            }
            Err(e) => {
                warn!("Upload of '{}' failed: {e}", file.name);
                result.failed_names.push(file.name.clone());
            }
        }

        if let Some(sink) = on_progress {
            sink(UploadProgress::new(
                index + 1,
                total,
                Some(file.name.clone()),
            ));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StoredObject;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tgvault_telegram::types::{ChatType, TgChat, TgUser};

    struct FakeStore {
        fail: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new(fail: &[&str]) -> Self {
            Self {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn attempt(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
            self.calls.lock().unwrap().push(file.name.clone());
            if self.fail.contains(&file.name) {
                Err(BackupError::Transfer {
                    name: file.name.clone(),
                    message: "connection reset".into(),
                })
            } else {
                Ok(StoredObject {
                    remote_message_id: format!("msg-{}", file.id),
                    sha256: "ab".repeat(32),
                })
            }
        }
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn validate_identity(&self) -> Result<TgUser, BackupError> {
            Ok(TgUser {
                id: 1,
                is_bot: true,
                first_name: "VaultBot".into(),
                last_name: None,
                username: Some("vault_bot".into()),
                can_join_groups: None,
                can_read_all_group_messages: None,
            })
        }

        async fn validate_destination(&self) -> Result<TgChat, BackupError> {
            Ok(TgChat {
                id: -100,
                chat_type: ChatType::Private,
                title: None,
                username: None,
                first_name: None,
                last_name: None,
            })
        }

        async fn upload_photo(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
            self.attempt(file)
        }

        async fn upload_video(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
            self.attempt(file)
        }

        async fn upload_document(&self, file: &SelectedFile) -> Result<StoredObject, BackupError> {
            self.attempt(file)
        }
    }

    fn selected(name: &str, kind: MediaKind) -> SelectedFile {
        SelectedFile {
            id: format!("id-{name}"),
            name: name.to_string(),
            path: format!("/media/{name}"),
            size: 1024,
            kind,
        }
    }

    #[tokio::test]
    async fn continues_past_failures() {
        let store = FakeStore::new(&["b.mp4"]);
        let selection = vec![
            selected("a.jpg", MediaKind::Photo),
            selected("b.mp4", MediaKind::Video),
            selected("c.pdf", MediaKind::Document),
        ];

        let result = run_uploads(&store, &selection, None, &CancelFlag::new()).await;

        assert_eq!(result.attempted, 3);
        assert_eq!(result.failed_names, vec!["b.mp4"]);
        let names: Vec<&str> = result.succeeded.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "c.pdf"]);
        // All three transfer calls were made despite the middle failure.
        assert_eq!(store.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn conservation_holds() {
        let store = FakeStore::new(&["a.jpg", "c.pdf"]);
        let selection = vec![
            selected("a.jpg", MediaKind::Photo),
            selected("b.mp4", MediaKind::Video),
            selected("c.pdf", MediaKind::Document),
            selected("d", MediaKind::Folder),
        ];

        let result = run_uploads(&store, &selection, None, &CancelFlag::new()).await;

        assert_eq!(
            result.attempted,
            result.succeeded.len() + result.failed_names.len()
        );
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.failed_names, vec!["a.jpg", "c.pdf", "d"]);
    }

    #[tokio::test]
    async fn folders_fail_without_transfer_call() {
        let store = FakeStore::new(&[]);
        let selection = vec![selected("dcim", MediaKind::Folder)];

        let result = run_uploads(&store, &selection, None, &CancelFlag::new()).await;

        assert_eq!(result.attempted, 1);
        assert_eq!(result.failed_names, vec!["dcim"]);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_emitted_per_file() {
        let store = FakeStore::new(&["b.mp4"]);
        let selection = vec![
            selected("a.jpg", MediaKind::Photo),
            selected("b.mp4", MediaKind::Video),
        ];
        let seen: Mutex<Vec<UploadProgress>> = Mutex::new(Vec::new());
        let sink = |p: UploadProgress| seen.lock().unwrap().push(p);

        run_uploads(&store, &selection, Some(&sink), &CancelFlag::new()).await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].completed, 1);
        assert_eq!(seen[0].percentage, 50);
        assert_eq!(seen[0].current_file.as_deref(), Some("a.jpg"));
        // Failures still emit progress.
        assert_eq!(seen[1].completed, 2);
        assert_eq!(seen[1].percentage, 100);
    }

    #[tokio::test]
    async fn cancellation_checked_between_files() {
        let store = FakeStore::new(&[]);
        let selection = vec![
            selected("a.jpg", MediaKind::Photo),
            selected("b.mp4", MediaKind::Video),
            selected("c.pdf", MediaKind::Document),
        ];
        let cancel = CancelFlag::new();
        let cancel_in_sink = cancel.clone();
        let sink = move |_p: UploadProgress| cancel_in_sink.cancel();

        let result = run_uploads(&store, &selection, Some(&sink), &cancel).await;

        // First file completed, flag tripped, remaining files never attempted.
        assert_eq!(result.attempted, 1);
        assert_eq!(result.succeeded.len(), 1);
        assert!(result.failed_names.is_empty());
        assert_eq!(store.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn uploaded_files_keep_selection_metadata() {
        let store = FakeStore::new(&[]);
        let selection = vec![selected("a.jpg", MediaKind::Photo)];

        let result = run_uploads(&store, &selection, None, &CancelFlag::new()).await;

        let file = &result.succeeded[0];
        assert_eq!(file.id, "id-a.jpg");
        assert_eq!(file.path, "/media/a.jpg");
        assert_eq!(file.size, 1024);
        assert_eq!(file.kind, MediaKind::Photo);
        assert_eq!(file.remote_message_id.as_deref(), Some("msg-id-a.jpg"));
        assert!(!file.hash.is_empty());
        assert!(file.uploaded_at > 0);
    }
}
