//! Transcode job manager
//!
//! Hands a finalized recording to an external converter and tracks the
//! job until it finishes. Jobs are independent subprocesses; each record
//! sits behind its own lock so updating one never blocks polling another.
//! Records live in memory for the process lifetime.

pub mod ffmpeg;
pub mod job;

pub use job::{JobStatus, TranscodeJob};

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TranscodeConfig;
use crate::recordings::{RecordingKind, RecordingStore};

use ffmpeg::Progress;

/// Lines of converter stderr kept for the failure message
const STDERR_TAIL_LINES: usize = 8;

pub struct TranscodeManager {
    config: TranscodeConfig,
    store: Arc<RecordingStore>,
    jobs: RwLock<HashMap<String, Arc<RwLock<TranscodeJob>>>>,
}

impl TranscodeManager {
    pub fn new(config: TranscodeConfig, store: Arc<RecordingStore>) -> Self {
        Self {
            config,
            store,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Queue a conversion of a stored recording and return the fresh job
    /// record immediately; the subprocess runs in the background.
    pub async fn start_job(
        self: &Arc<Self>,
        kind: RecordingKind,
        file_name: &str,
    ) -> crate::Result<TranscodeJob> {
        let source = self.store.file_path(kind, file_name)?;
        let source_url = self.store.public_url(kind, file_name);

        let output_name = self
            .store
            .converted_name(file_name)
            .unwrap_or_else(|| format!("{}-converted.mp4", file_name));
        let output = self.store.file_path(kind, &output_name)?;
        let mp4_url = self.store.public_url(kind, &output_name);

        let job_id = Uuid::new_v4().to_string();
        let job = TranscodeJob::new(job_id.clone(), source_url);
        let handle = Arc::new(RwLock::new(job.clone()));
        self.jobs.write().await.insert(job_id.clone(), handle.clone());

        info!(job_id, source = %source.display(), "transcode job started");
        let config = self.config.clone();
        tokio::spawn(async move {
            run_conversion(config, source, output, mp4_url, handle).await;
        });

        Ok(job)
    }

    /// Snapshot of a job record
    pub async fn status(&self, job_id: &str) -> Option<TranscodeJob> {
        let handle = self.jobs.read().await.get(job_id).cloned()?;
        let job = handle.read().await.clone();
        Some(job)
    }
}

/// Drive one conversion subprocess to completion, feeding progress into
/// the shared job record
async fn run_conversion(
    config: TranscodeConfig,
    source: PathBuf,
    output: PathBuf,
    mp4_url: String,
    handle: Arc<RwLock<TranscodeJob>>,
) {
    let duration = ffmpeg::probe_duration(&config.ffprobe, &source).await;
    if duration.is_none() {
        info!(
            source = %source.display(),
            "no usable duration, progress reporting disabled"
        );
    }

    let mut child = match ffmpeg::conversion_command(&config, &source, &output).spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to launch {}: {}", config.ffmpeg, e);
            handle
                .write()
                .await
                .mark_failed(format!("Failed to launch {}: {}", config.ffmpeg, e));
            return;
        }
    };

    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(collect_tail(stderr)));

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match ffmpeg::parse_progress_line(&line) {
                Some(Progress::Elapsed(elapsed)) => {
                    if let Some(duration) = duration {
                        let percent = ffmpeg::percent(elapsed, duration);
                        handle.write().await.set_progress(percent);
                    }
                }
                Some(Progress::End) | None => {}
            }
        }
    }

    let status = child.wait().await;
    let stderr_tail = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    match status {
        Ok(status) if status.success() => {
            info!(output = %output.display(), "conversion finished");
            handle.write().await.mark_done(mp4_url);
            // The converted output replaces the source; a failed delete
            // only costs disk until the retention sweep catches it.
            if let Err(e) = tokio::fs::remove_file(&source).await {
                warn!("Failed to delete converted source {}: {}", source.display(), e);
            }
        }
        Ok(status) => {
            let message = if stderr_tail.is_empty() {
                format!("Conversion failed with {}", status)
            } else {
                stderr_tail.join("\n")
            };
            warn!(source = %source.display(), "conversion failed: {}", message);
            handle.write().await.mark_failed(message);
        }
        Err(e) => {
            warn!("Failed to wait for conversion: {}", e);
            handle
                .write()
                .await
                .mark_failed(format!("Failed to wait for conversion: {}", e));
        }
    }
}

/// Keep the last few lines of a stream
async fn collect_tail<R: AsyncRead + Unpin>(reader: R) -> Vec<String> {
    let mut lines = BufReader::new(reader).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() >= STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Stub converter configuration: `true`/`false` stand in for ffmpeg so
    /// the lifecycle runs without real media tooling
    fn manager_with(ffmpeg: &str) -> (TempDir, Arc<TranscodeManager>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordingStore::new(dir.path()));
        let config = TranscodeConfig {
            ffmpeg: ffmpeg.to_string(),
            ffprobe: "false".to_string(),
            preset: "veryfast".to_string(),
        };
        (dir, Arc::new(TranscodeManager::new(config, store)))
    }

    async fn wait_terminal(manager: &TranscodeManager, job_id: &str) -> TranscodeJob {
        for _ in 0..200 {
            let job = manager.status(job_id).await.expect("job exists");
            if job.status != JobStatus::Processing {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    #[tokio::test]
    async fn test_successful_job_completes_and_removes_source() {
        let (_dir, manager) = manager_with("true");
        manager.store.ensure_dirs().await.unwrap();
        let source = manager
            .store
            .file_path(RecordingKind::Screen, "recording-a-1.webm")
            .unwrap();
        tokio::fs::write(&source, b"fake media").await.unwrap();

        let job = manager
            .start_job(RecordingKind::Screen, "recording-a-1.webm")
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0);

        let job = wait_terminal(&manager, &job.job_id).await;
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.progress, 100);
        assert_eq!(
            job.mp4_url.as_deref(),
            Some("/recordings/screen/recording-a-1.mp4")
        );
        assert!(job.error.is_none());
        assert!(!source.exists(), "source should be deleted after success");
    }

    #[tokio::test]
    async fn test_failed_job_keeps_source_and_reports_error() {
        let (_dir, manager) = manager_with("false");
        manager.store.ensure_dirs().await.unwrap();
        let source = manager
            .store
            .file_path(RecordingKind::Screen, "recording-b-1.webm")
            .unwrap();
        tokio::fs::write(&source, b"fake media").await.unwrap();

        let job = manager
            .start_job(RecordingKind::Screen, "recording-b-1.webm")
            .await
            .unwrap();
        let job = wait_terminal(&manager, &job.job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.mp4_url.is_none());
        assert!(job.error.is_some());
        assert!(source.exists(), "failed conversion must leave the source");
    }

    #[tokio::test]
    async fn test_unlaunchable_converter_fails_job() {
        let (_dir, manager) = manager_with("/nonexistent/ffmpeg-binary");
        manager.store.ensure_dirs().await.unwrap();
        let source = manager
            .store
            .file_path(RecordingKind::Camera, "recording-c-1.webm")
            .unwrap();
        tokio::fs::write(&source, b"fake media").await.unwrap();

        let job = manager
            .start_job(RecordingKind::Camera, "recording-c-1.webm")
            .await
            .unwrap();
        let job = wait_terminal(&manager, &job.job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap_or("").contains("Failed to launch"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (_dir, manager) = manager_with("true");
        assert!(manager.status("no-such-job").await.is_none());
    }

    #[tokio::test]
    async fn test_jobs_are_independent() {
        let (_dir, manager) = manager_with("true");
        manager.store.ensure_dirs().await.unwrap();

        let mut ids = Vec::new();
        for name in ["recording-x-1.webm", "recording-y-1.webm"] {
            let source = manager
                .store
                .file_path(RecordingKind::Screen, name)
                .unwrap();
            tokio::fs::write(&source, b"fake").await.unwrap();
            let job = manager
                .start_job(RecordingKind::Screen, name)
                .await
                .unwrap();
            ids.push(job.job_id);
        }

        for id in &ids {
            let job = wait_terminal(&manager, id).await;
            assert_eq!(job.status, JobStatus::Done);
        }
    }
}
