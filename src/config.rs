use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Fixed development source root of the downloader, used when no source
/// root is given on the command line.
pub const DEFAULT_SOURCE_ROOT: &str = r"D:\Development\sora-ai-video-downloader-python\videos";
pub const DEFAULT_DATE: &str = "latest";
pub const DEFAULT_LIMIT: &str = "0";
pub const DEFAULT_DAILY_TIMES: &str = "15";
pub const DEFAULT_COVER_STRATEGY: &str = "auto";
pub const DEFAULT_COVER_FRAME_SECONDS: &str = "5";

/// Handoff artifact between the three steps. Not user-configurable:
/// every collaborator is pointed at this same path.
pub const RECORD_FILE: &str = "videos/.sync_last.json";

/// Where synced videos land, so the uploader scripts can find them.
pub const TARGET_DIR: &str = "videos";

/// Fully resolved per-run configuration.
///
/// The runner performs no validation of these values: a non-numeric
/// `limit` or an unknown `cover_strategy` is handed to the collaborator
/// uninterpreted, which owns its own validation and error signaling.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub date: String,
    pub limit: String,
    pub daily_times: String,
    pub source_root: PathBuf,
    pub cover_strategy: String,
    pub cover_frame_seconds: String,
    pub record_file: PathBuf,
    pub target_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            date: DEFAULT_DATE.to_string(),
            limit: DEFAULT_LIMIT.to_string(),
            daily_times: DEFAULT_DAILY_TIMES.to_string(),
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            cover_strategy: DEFAULT_COVER_STRATEGY.to_string(),
            cover_frame_seconds: DEFAULT_COVER_FRAME_SECONDS.to_string(),
            record_file: PathBuf::from(RECORD_FILE),
            target_dir: PathBuf::from(TARGET_DIR),
        }
    }
}

fn or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

impl RunnerConfig {
    /// Resolve positional inputs against the documented defaults. Absent
    /// and empty-string values are equivalent.
    pub fn resolve(
        date: Option<&str>,
        limit: Option<&str>,
        daily_times: Option<&str>,
        source_root: Option<&str>,
        cover_strategy: Option<&str>,
        cover_frame_seconds: Option<&str>,
    ) -> Self {
        RunnerConfig {
            date: or_default(date, DEFAULT_DATE),
            limit: or_default(limit, DEFAULT_LIMIT),
            daily_times: or_default(daily_times, DEFAULT_DAILY_TIMES),
            source_root: PathBuf::from(or_default(source_root, DEFAULT_SOURCE_ROOT)),
            cover_strategy: or_default(cover_strategy, DEFAULT_COVER_STRATEGY),
            cover_frame_seconds: or_default(cover_frame_seconds, DEFAULT_COVER_FRAME_SECONDS),
            record_file: PathBuf::from(RECORD_FILE),
            target_dir: PathBuf::from(TARGET_DIR),
        }
    }

    pub fn record_file(&self) -> &Path {
        &self.record_file
    }

    pub fn trace_loaded(&self) {
        info!(
            date = %self.date,
            limit = %self.limit,
            daily_times = %self.daily_times,
            source_root = %self.source_root.display(),
            cover_strategy = %self.cover_strategy,
            "Resolved runner configuration"
        );
        debug!(?self, "Runner configuration (full debug)");
    }
}
