//! The sync record: the one artifact handed from step to step.
//!
//! Written by the sync step with overwrite semantics (a new run replaces
//! the previous record), read by upload, and consumed by cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// One synced video and its companion artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedFile {
    pub name: String,
    pub asset_id: String,
    pub mp4: PathBuf,
    pub txt: PathBuf,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub thumbnail_file: Option<PathBuf>,
    #[serde(default)]
    pub cover_source: Option<String>,
    #[serde(default)]
    pub cover_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub created_at: String,
    pub source_dir: PathBuf,
    pub source_mode: String,
    pub video_variant: String,
    pub target_dir: PathBuf,
    pub synced_count: usize,
    pub synced_files: Vec<SyncedFile>,
}

impl SyncRecord {
    pub fn new(
        source_dir: PathBuf,
        source_mode: &str,
        video_variant: &str,
        target_dir: PathBuf,
        synced_files: Vec<SyncedFile>,
    ) -> Self {
        SyncRecord {
            created_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            source_dir,
            source_mode: source_mode.to_string(),
            video_variant: video_variant.to_string(),
            target_dir,
            synced_count: synced_files.len(),
            synced_files,
        }
    }

    /// Write the record, replacing any previous one.
    pub fn store(&self, record_file: &Path) -> io::Result<()> {
        if let Some(parent) = record_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(record_file, json)
    }

    pub fn load(record_file: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = fs::read_to_string(record_file)
            .map_err(|e| format!("cannot read record {}: {e}", record_file.display()))?;
        let record: SyncRecord = serde_json::from_str(&content)
            .map_err(|e| format!("malformed record {}: {e}", record_file.display()))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_then_load_round_trips_and_overwrites() {
        let dir = tempdir().unwrap();
        let record_file = dir.path().join("videos/.sync_last.json");

        let first = SyncRecord::new(
            PathBuf::from("/src/20250101"),
            "daily",
            "all",
            PathBuf::from("videos"),
            vec![SyncedFile {
                name: "a.mp4".into(),
                asset_id: "a".into(),
                mp4: PathBuf::from("videos/a.mp4"),
                txt: PathBuf::from("videos/a.txt"),
                title: "a".into(),
                thumbnail_url: None,
                thumbnail_file: None,
                cover_source: None,
                cover_reason: None,
            }],
        );
        first.store(&record_file).unwrap();

        let second = SyncRecord::new(
            PathBuf::from("/src/20250102"),
            "daily",
            "all",
            PathBuf::from("videos"),
            vec![],
        );
        second.store(&record_file).unwrap();

        let loaded = SyncRecord::load(&record_file).unwrap();
        assert_eq!(loaded.source_dir, PathBuf::from("/src/20250102"));
        assert_eq!(loaded.synced_count, 0);
        assert!(loaded.synced_files.is_empty());
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let record_file = dir.path().join(".sync_last.json");
        std::fs::write(&record_file, "{not json").unwrap();
        assert!(SyncRecord::load(&record_file).is_err());
    }
}
