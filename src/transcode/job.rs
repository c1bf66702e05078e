//! Transcode job records

use serde::{Deserialize, Serialize};

/// Lifecycle of one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Failed,
}

/// Status-poll view of one conversion. Held in memory for the process
/// lifetime; immutable once the status leaves `Processing`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub job_id: String,
    pub status: JobStatus,
    /// 0-100; 100 is reserved for the terminal `Done` state
    pub progress: u8,
    pub source_url: String,
    pub mp4_url: Option<String>,
    pub error: Option<String>,
}

impl TranscodeJob {
    pub fn new(job_id: String, source_url: String) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            progress: 0,
            source_url,
            mp4_url: None,
            error: None,
        }
    }

    /// Advance progress. Regressions are ignored so polled progress is
    /// monotonically non-decreasing, and values are capped below 100 until
    /// `mark_done` because 100 must coincide with `Done`.
    pub fn set_progress(&mut self, percent: u8) {
        if self.status != JobStatus::Processing {
            return;
        }
        let capped = percent.min(99);
        if capped > self.progress {
            self.progress = capped;
        }
    }

    pub fn mark_done(&mut self, mp4_url: String) {
        if self.status != JobStatus::Processing {
            return;
        }
        self.status = JobStatus::Done;
        self.progress = 100;
        self.mp4_url = Some(mp4_url);
    }

    pub fn mark_failed(&mut self, error: String) {
        if self.status != JobStatus::Processing {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error);
    }
}
