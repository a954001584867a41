//! Cover image selection for synced videos.
//!
//! A cover either comes from the manifest's thumbnail URL or is a frame
//! extracted from the video with ffmpeg. Cover failures never fail the
//! sync; they are recorded per file as a reason string.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

/// Policy for choosing a video's cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStrategy {
    /// Manifest thumbnail when unique, frame extraction as fallback.
    Auto,
    Manifest,
    Frame,
}

impl From<&str> for CoverStrategy {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "manifest" => CoverStrategy::Manifest,
            "frame" => CoverStrategy::Frame,
            "auto" => CoverStrategy::Auto,
            other => {
                warn!(strategy = other, "Unknown cover strategy, defaulting to auto");
                CoverStrategy::Auto
            }
        }
    }
}

/// Download the manifest thumbnail to `out_path`, writing a temp file
/// first so a failed download never leaves a truncated cover behind.
pub async fn download_thumbnail(
    url: &str,
    out_path: &Path,
    overwrite: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if out_path.exists() && !overwrite {
        return Ok(());
    }
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0")
        .build()?;

    let mut last_err: Option<reqwest::Error> = None;
    for attempt in 1..=2u8 {
        match fetch_bytes(&client, url).await {
            Ok(bytes) => {
                let tmp = out_path.with_extension("png.tmp");
                std::fs::write(&tmp, &bytes)?;
                std::fs::rename(&tmp, out_path)?;
                debug!(url, attempt, "Thumbnail downloaded");
                return Ok(());
            }
            Err(e) => {
                debug!(url, attempt, error = %e, "Thumbnail download attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(format!("thumbnail download failed: {}", last_err.unwrap()).into())
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Ask ffprobe for the container duration. Best effort: any failure
/// (missing binary, unparsable output) yields `None`.
pub async fn probe_video_duration_seconds(video_path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=nw=1:nk=1",
        ])
        .arg(video_path)
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

/// Extract a single frame near `prefer_seconds` into `out_path`.
///
/// The timestamp is clamped to half the video's duration when known, and
/// falls back to the first frame if the preferred one cannot be decoded.
/// Returns whether a cover now exists; never errors.
pub async fn extract_cover_frame(
    video_path: &Path,
    out_path: &Path,
    overwrite: bool,
    prefer_seconds: f64,
) -> bool {
    if out_path.exists() && !overwrite {
        return true;
    }
    if let Some(parent) = out_path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
    }

    let mut ts = prefer_seconds;
    if let Some(duration) = probe_video_duration_seconds(video_path).await {
        if duration > 0.0 {
            ts = prefer_seconds.min((duration / 2.0).max(0.0));
        }
    }

    // ffmpeg infers the output format from the extension, so the temp
    // name has to keep a real image suffix.
    let tmp_out = out_path.with_extension("tmp.png");
    for attempt_ts in [ts, 0.0] {
        let status = Command::new("ffmpeg")
            .args(["-y", "-hide_banner", "-loglevel", "error", "-ss"])
            .arg(attempt_ts.to_string())
            .arg("-i")
            .arg(video_path)
            .args(["-frames:v", "1"])
            .arg(&tmp_out)
            .stdin(Stdio::null())
            .status()
            .await;

        if matches!(status, Ok(s) if s.success()) && tmp_out.exists() {
            if std::fs::rename(&tmp_out, out_path).is_ok() {
                return true;
            }
        }
    }
    let _ = std::fs::remove_file(&tmp_out);
    false
}
