//! In-process cleanup collaborator: removes the files enumerated by the
//! sync record, then the record itself.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::contract::{CleanReport, Cleaner, StepError};
use crate::record::SyncRecord;

pub struct NativeCleaner;

impl NativeCleaner {
    pub fn new() -> Self {
        NativeCleaner
    }
}

impl Default for NativeCleaner {
    fn default() -> Self {
        NativeCleaner::new()
    }
}

fn remove_if_exists(path: &Path, removed: &mut usize) -> Result<(), StepError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(file = %path.display(), "Removed");
            *removed += 1;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("removing {} failed: {e}", path.display()).into()),
    }
}

#[async_trait]
impl Cleaner for NativeCleaner {
    async fn clean(&self, record_file: &Path) -> Result<CleanReport, StepError> {
        if !record_file.exists() {
            // Nothing was synced, nothing to clean. Keeps a re-run on an
            // empty source from erroring out.
            info!(record = %record_file.display(), "No sync record, nothing to clean");
            return Ok(CleanReport::default());
        }

        let record = SyncRecord::load(record_file)?;
        let mut removed = 0usize;
        for file in &record.synced_files {
            remove_if_exists(&file.mp4, &mut removed)?;
            remove_if_exists(&file.txt, &mut removed)?;
            if let Some(cover) = &file.thumbnail_file {
                remove_if_exists(cover, &mut removed)?;
            }
        }

        // The record is consumed: it described exactly this batch.
        fs::remove_file(record_file)
            .map_err(|e| format!("removing record {} failed: {e}", record_file.display()))?;
        info!(removed_files = removed, "Cleanup complete, record consumed");

        Ok(CleanReport {
            removed_files: removed,
        })
    }
}
