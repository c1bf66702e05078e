//! On-disk recording store: kinds, paths and file naming

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;

use crate::error::{AppError, Result};

/// Default extension when the uploader supplies none
const DEFAULT_EXTENSION: &str = ".webm";

/// Extension length cap, dot included
const MAX_EXTENSION_LEN: usize = 10;

/// The closed set of recording sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingKind {
    Screen,
    Camera,
}

impl RecordingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingKind::Screen => "screen",
            RecordingKind::Camera => "camera",
        }
    }

    pub fn all() -> [RecordingKind; 2] {
        [RecordingKind::Screen, RecordingKind::Camera]
    }
}

impl fmt::Display for RecordingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordingKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "screen" => Ok(RecordingKind::Screen),
            "camera" => Ok(RecordingKind::Camera),
            other => Err(AppError::BadRequest(format!(
                "Unknown recording kind: {}",
                other
            ))),
        }
    }
}

/// Path and naming authority for stored recordings
#[derive(Debug, Clone)]
pub struct RecordingStore {
    root: PathBuf,
}

impl RecordingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Recordings root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the per-kind directory tree
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for kind in RecordingKind::all() {
            tokio::fs::create_dir_all(self.dir(kind)).await?;
        }
        Ok(())
    }

    /// Directory holding one kind's recordings
    pub fn dir(&self, kind: RecordingKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    /// Absolute path of a stored file, rejecting traversal attempts
    pub fn file_path(&self, kind: RecordingKind, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(AppError::BadRequest(format!(
                "Invalid recording name: {}",
                file_name
            )));
        }
        Ok(self.dir(kind).join(file_name))
    }

    /// Public URL a stored file is served under
    pub fn public_url(&self, kind: RecordingKind, file_name: &str) -> String {
        format!("/recordings/{}/{}", kind, file_name)
    }

    /// Derive a fresh recording file name from the uploader's label and
    /// original file name: sanitized label plus a millisecond UTC timestamp
    pub fn derive_file_name(&self, label: Option<&str>, original_name: Option<&str>) -> String {
        let label = sanitize_label(label);
        let extension = sanitize_extension(original_name);
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        format!("recording-{}-{}{}", label, timestamp, extension)
    }

    /// Name of the converted sibling of a stored recording, or `None` when
    /// the file already carries the distribution extension
    pub fn converted_name(&self, file_name: &str) -> Option<String> {
        let path = Path::new(file_name);
        if path.extension().is_some_and(|ext| ext == "mp4") {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        Some(format!("{}.mp4", stem))
    }
}

/// Lowercase, `[a-z0-9-_]` only, never empty
fn sanitize_label(label: Option<&str>) -> String {
    let cleaned: String = label
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

/// Extension of the uploaded file, dot included, capped and cleaned
fn sanitize_extension(original_name: Option<&str>) -> String {
    let ext: String = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    ext.chars().take(MAX_EXTENSION_LEN).collect()
}
