//! Chunked upload reassembly
//!
//! A recording arrives as a sequence of binary fragments sharing a
//! caller-supplied upload id. Fragments are appended to the backing file in
//! arrival order; the supplied index is bookkeeping only and a gap produces
//! a diagnostic, not a reorder. The caller owns ordering and must never
//! reuse an upload id after finalizing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AppError, Result};

use super::store::{RecordingKind, RecordingStore};

/// Result of one `append_chunk` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Fragment stored, upload still open
    Accepted {
        upload_id: String,
        index: Option<u64>,
    },
    /// Final fragment stored, upload session consumed
    Finalized { file_name: String, file_url: String },
}

struct UploadSession {
    path: PathBuf,
    file_name: String,
    next_index: u64,
}

/// Reassembles chunked uploads into files in the recording store
pub struct ChunkAssembler {
    store: Arc<RecordingStore>,
    sessions: RwLock<HashMap<String, UploadSession>>,
}

impl ChunkAssembler {
    pub fn new(store: Arc<RecordingStore>) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append one fragment to the upload identified by `upload_id`,
    /// creating the backing file on the first call and consuming the
    /// session when `is_last` is set.
    #[allow(clippy::too_many_arguments)]
    pub async fn append_chunk(
        &self,
        kind: RecordingKind,
        upload_id: &str,
        label: Option<&str>,
        original_name: Option<&str>,
        bytes: Bytes,
        index: Option<u64>,
        is_last: bool,
    ) -> Result<ChunkOutcome> {
        if upload_id.trim().is_empty() {
            return Err(AppError::BadRequest("Missing uploadId".to_string()));
        }
        if bytes.is_empty() {
            return Err(AppError::BadRequest(
                "No recording chunk received".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(upload_id) {
            Some(session) => {
                if let Some(index) = index {
                    if index != session.next_index {
                        warn!(
                            upload_id,
                            expected = session.next_index,
                            got = index,
                            "chunk index discontinuity, appending in arrival order"
                        );
                    }
                    session.next_index = index + 1;
                } else {
                    session.next_index += 1;
                }

                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(&session.path)
                    .await?;
                file.write_all(&bytes).await?;
                file.flush().await?;
            }
            None => {
                let file_name = self.store.derive_file_name(label, original_name);
                let path = self.store.file_path(kind, &file_name)?;
                tokio::fs::write(&path, &bytes).await?;
                info!(upload_id, file = %file_name, "chunk upload session opened");
                sessions.insert(
                    upload_id.to_string(),
                    UploadSession {
                        path,
                        file_name,
                        next_index: index.map(|i| i + 1).unwrap_or(1),
                    },
                );
            }
        }

        if is_last {
            // The session is consumed; reusing the id afterwards silently
            // starts a fresh file.
            if let Some(session) = sessions.remove(upload_id) {
                info!(upload_id, file = %session.file_name, "chunk upload finalized");
                return Ok(ChunkOutcome::Finalized {
                    file_url: self.store.public_url(kind, &session.file_name),
                    file_name: session.file_name,
                });
            }
        }

        Ok(ChunkOutcome::Accepted {
            upload_id: upload_id.to_string(),
            index,
        })
    }

    /// Number of uploads currently in flight
    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assembler() -> (TempDir, ChunkAssembler) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordingStore::new(dir.path()));
        (dir, ChunkAssembler::new(store))
    }

    #[tokio::test]
    async fn test_fragments_concatenate_in_arrival_order() {
        let (_dir, assembler) = assembler();
        assembler.store.ensure_dirs().await.unwrap();

        for (i, chunk) in ["AAA", "BBB"].iter().enumerate() {
            let outcome = assembler
                .append_chunk(
                    RecordingKind::Screen,
                    "upload-1",
                    Some("alice"),
                    Some("clip.webm"),
                    Bytes::from_static(chunk.as_bytes()),
                    Some(i as u64),
                    false,
                )
                .await
                .unwrap();
            assert_eq!(
                outcome,
                ChunkOutcome::Accepted {
                    upload_id: "upload-1".to_string(),
                    index: Some(i as u64),
                }
            );
        }

        let outcome = assembler
            .append_chunk(
                RecordingKind::Screen,
                "upload-1",
                Some("alice"),
                Some("clip.webm"),
                Bytes::from_static(b"CCC"),
                Some(2),
                true,
            )
            .await
            .unwrap();

        let ChunkOutcome::Finalized {
            file_name,
            file_url,
        } = outcome
        else {
            panic!("expected finalized outcome");
        };
        assert!(file_url.starts_with("/recordings/screen/"));

        let path = assembler
            .store
            .file_path(RecordingKind::Screen, &file_name)
            .unwrap();
        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"AAABBBCCC");
        assert_eq!(assembler.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_out_of_order_indexes_still_append_in_arrival_order() {
        let (_dir, assembler) = assembler();
        assembler.store.ensure_dirs().await.unwrap();

        assembler
            .append_chunk(
                RecordingKind::Screen,
                "u",
                None,
                None,
                Bytes::from_static(b"first"),
                Some(0),
                false,
            )
            .await
            .unwrap();
        // Arrives with a stale index; bytes still land after "first"
        let outcome = assembler
            .append_chunk(
                RecordingKind::Screen,
                "u",
                None,
                None,
                Bytes::from_static(b"second"),
                Some(7),
                true,
            )
            .await
            .unwrap();

        let ChunkOutcome::Finalized { file_name, .. } = outcome else {
            panic!("expected finalized outcome");
        };
        let path = assembler
            .store
            .file_path(RecordingKind::Screen, &file_name)
            .unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"firstsecond");
    }

    #[tokio::test]
    async fn test_reused_upload_id_starts_fresh_session() {
        let (_dir, assembler) = assembler();
        assembler.store.ensure_dirs().await.unwrap();

        let first = assembler
            .append_chunk(
                RecordingKind::Screen,
                "u",
                Some("a"),
                None,
                Bytes::from_static(b"one"),
                None,
                true,
            )
            .await
            .unwrap();
        // Make sure the derived names differ even within one millisecond
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = assembler
            .append_chunk(
                RecordingKind::Screen,
                "u",
                Some("a"),
                None,
                Bytes::from_static(b"two"),
                None,
                true,
            )
            .await
            .unwrap();

        let (ChunkOutcome::Finalized { file_name: f1, .. }, ChunkOutcome::Finalized { file_name: f2, .. }) =
            (first, second)
        else {
            panic!("expected finalized outcomes");
        };
        assert_ne!(f1, f2);
        let p2 = assembler
            .store
            .file_path(RecordingKind::Screen, &f2)
            .unwrap();
        assert_eq!(tokio::fs::read(&p2).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_rejects_missing_upload_id_and_empty_chunk() {
        let (_dir, assembler) = assembler();
        assembler.store.ensure_dirs().await.unwrap();

        let err = assembler
            .append_chunk(
                RecordingKind::Screen,
                "  ",
                None,
                None,
                Bytes::from_static(b"x"),
                None,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = assembler
            .append_chunk(
                RecordingKind::Screen,
                "u",
                None,
                None,
                Bytes::new(),
                None,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(assembler.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_independent_uploads_do_not_interfere() {
        let (_dir, assembler) = assembler();
        assembler.store.ensure_dirs().await.unwrap();

        assembler
            .append_chunk(
                RecordingKind::Screen,
                "a",
                Some("one"),
                None,
                Bytes::from_static(b"AA"),
                Some(0),
                false,
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assembler
            .append_chunk(
                RecordingKind::Camera,
                "b",
                Some("two"),
                None,
                Bytes::from_static(b"BB"),
                Some(0),
                false,
            )
            .await
            .unwrap();
        assert_eq!(assembler.open_sessions().await, 2);

        let a = assembler
            .append_chunk(
                RecordingKind::Screen,
                "a",
                None,
                None,
                Bytes::from_static(b"aa"),
                Some(1),
                true,
            )
            .await
            .unwrap();
        let b = assembler
            .append_chunk(
                RecordingKind::Camera,
                "b",
                None,
                None,
                Bytes::from_static(b"bb"),
                Some(1),
                true,
            )
            .await
            .unwrap();

        let (ChunkOutcome::Finalized { file_name: fa, .. }, ChunkOutcome::Finalized { file_name: fb, .. }) =
            (a, b)
        else {
            panic!("expected finalized outcomes");
        };
        let pa = assembler
            .store
            .file_path(RecordingKind::Screen, &fa)
            .unwrap();
        let pb = assembler
            .store
            .file_path(RecordingKind::Camera, &fb)
            .unwrap();
        assert_eq!(tokio::fs::read(&pa).await.unwrap(), b"AAaa");
        assert_eq!(tokio::fs::read(&pb).await.unwrap(), b"BBbb");
    }
}
