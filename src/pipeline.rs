//! The runner: a fixed Sync -> Upload -> Cleanup sequence with one
//! genuine branch, driven by collaborator outcomes.
//!
//! Steps are strictly sequential; each one blocks until its collaborator
//! finishes. No timeouts and no internal retries: a failed upload leaves
//! the record and synced files on disk so that re-invoking the whole
//! runner picks up where this run left off without re-syncing.

use std::fmt;

use tracing::{error, info};

use crate::config::RunnerConfig;
use crate::contract::{CleanReport, Cleaner, StepError, SyncReport, Syncer, UploadOutcome, Uploader};

/// Which step failed. Every variant terminates the pipeline.
#[derive(Debug)]
pub enum PipelineError {
    Sync(StepError),
    /// Retry-safe: the record and synced files were left in place.
    Upload(StepError),
    Cleanup(StepError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Sync(e) => write!(f, "sync step failed: {e}"),
            PipelineError::Upload(e) => {
                write!(f, "upload step failed (synced files kept for retry): {e}")
            }
            PipelineError::Cleanup(e) => write!(f, "cleanup step failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Summary of a completed run, printed by the CLI.
#[derive(Debug)]
pub struct PipelineReport {
    pub sync: SyncReport,
    pub upload: UploadOutcome,
    pub cleanup: CleanReport,
}

pub async fn run_pipeline(
    config: &RunnerConfig,
    syncer: &dyn Syncer,
    uploader: &dyn Uploader,
    cleaner: &dyn Cleaner,
) -> Result<PipelineReport, PipelineError> {
    info!(source_root = %config.source_root.display(), "[SYNC] Starting sync step");
    let sync_report = match syncer.sync(config).await {
        Ok(report) => {
            info!(synced_count = ?report.synced_count, "[SYNC] Sync step succeeded");
            report
        }
        Err(e) => {
            error!(error = %e, "[SYNC][ERROR] Sync step failed, aborting pipeline");
            return Err(PipelineError::Sync(e));
        }
    };

    info!(
        record_file = %config.record_file.display(),
        daily_times = %config.daily_times,
        "[UPLOAD] Starting upload step"
    );
    let upload_outcome = match uploader.upload(&config.record_file, &config.daily_times).await {
        Ok(UploadOutcome::Uploaded) => {
            info!("[UPLOAD] Upload step succeeded");
            UploadOutcome::Uploaded
        }
        Ok(UploadOutcome::NothingToUpload) => {
            // Not a failure: quota exhausted or empty record. Cleanup
            // still runs to clear the stale record.
            info!("[UPLOAD] Nothing to upload, continuing to cleanup");
            UploadOutcome::NothingToUpload
        }
        Err(e) => {
            error!(
                error = %e,
                "[UPLOAD][ERROR] Upload step failed; record and synced files kept for retry"
            );
            return Err(PipelineError::Upload(e));
        }
    };

    info!(record_file = %config.record_file.display(), "[CLEANUP] Starting cleanup step");
    let clean_report = match cleaner.clean(&config.record_file).await {
        Ok(report) => {
            info!(removed_files = report.removed_files, "[CLEANUP] Cleanup step succeeded");
            report
        }
        Err(e) => {
            error!(error = %e, "[CLEANUP][ERROR] Cleanup step failed");
            return Err(PipelineError::Cleanup(e));
        }
    };

    Ok(PipelineReport {
        sync: sync_report,
        upload: upload_outcome,
        cleanup: clean_report,
    })
}
