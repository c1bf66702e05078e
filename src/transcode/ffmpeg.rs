//! ffmpeg/ffprobe plumbing
//!
//! The conversion runs as an external subprocess emitting key=value
//! progress records on stdout (`-progress pipe:1`). Only the elapsed-time
//! keys and the terminal `progress=end` record are interpreted; everything
//! else is ignored.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::TranscodeConfig;

/// One parsed progress record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Transcoded media time in seconds
    Elapsed(f64),
    /// The encoder reported completion
    End,
}

/// Parse a single `key=value` line from the progress stream.
///
/// ffmpeg reports `out_time_ms` in microseconds, same as `out_time_us`
/// (a long-standing quirk); early records may carry large negative
/// values before the first timestamp is known.
pub fn parse_progress_line(line: &str) -> Option<Progress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => {
            let micros: i64 = value.trim().parse().ok()?;
            Some(Progress::Elapsed(micros as f64 / 1_000_000.0))
        }
        "out_time" => parse_clock_time(value.trim()).map(Progress::Elapsed),
        "progress" if value.trim() == "end" => Some(Progress::End),
        _ => None,
    }
}

/// `HH:MM:SS.frac` to seconds
fn parse_clock_time(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Percentage of `duration` covered by `elapsed`, clamped to 0-100
pub fn percent(elapsed: f64, duration: f64) -> u8 {
    if !duration.is_finite() || duration <= 0.0 || !elapsed.is_finite() {
        return 0;
    }
    (elapsed / duration * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Best-effort duration probe; anything unusable yields `None` and the
/// conversion simply runs without percentage reporting
pub async fn probe_duration(ffprobe: &str, source: &Path) -> Option<f64> {
    let output = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(source)
        .stdin(Stdio::null())
        .output()
        .await;

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!(
                "Duration probe of {} exited with {}",
                source.display(),
                output.status
            );
            return None;
        }
        Err(e) => {
            tracing::debug!("Duration probe of {} failed: {}", source.display(), e);
            return None;
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Build the conversion command: H.264/AAC MP4 with the moov atom up
/// front for immediate playback, progress records on stdout
pub fn conversion_command(config: &TranscodeConfig, source: &Path, output: &Path) -> Command {
    let mut command = Command::new(&config.ffmpeg);
    command
        .arg("-y")
        .arg("-i")
        .arg(source)
        .arg("-c:v")
        .arg("libx264")
        .arg("-preset")
        .arg(&config.preset)
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg("-c:a")
        .arg("aac")
        .arg("-movflags")
        .arg("+faststart")
        .arg("-progress")
        .arg("pipe:1")
        .arg("-nostats")
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}
