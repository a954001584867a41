//! Collaborator interfaces for the three pipeline steps.
//!
//! Each step (sync, upload, cleanup) sits behind one trait with a single
//! operation. Production implementations either run in-process
//! ([`crate::sync::NativeSyncer`], [`crate::cleanup::NativeCleaner`]) or
//! shell out to an external program ([`crate::process`]); tests use the
//! mockall mocks exported behind the `test-export-mocks` feature.
//!
//! External-process outcomes are mapped into named variants here so the
//! runner never branches on raw exit-code integers.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::config::RunnerConfig;

/// Uniform error type for collaborator operations.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// What the sync step did, read back for reporting.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Number of files the record says were synced this run. `None` when
    /// the collaborator is an external process whose record we treat as
    /// opaque.
    pub synced_count: Option<usize>,
}

/// The upload step's three-way outcome. A generic failure is the `Err`
/// arm of the operation, not a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// At least one file from the record was uploaded.
    Uploaded,
    /// Nothing was eligible: quota already exhausted or empty record.
    /// Success-adjacent, still followed by cleanup.
    NothingToUpload,
}

#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub removed_files: usize,
}

/// Sync step: populate the target directory and (re)write the sync
/// record enumerating what changed in this run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Syncer: Send + Sync {
    async fn sync(&self, config: &RunnerConfig) -> Result<SyncReport, StepError>;
}

/// Upload step: read the record and publish its files, bounded by the
/// daily quota. Must not mutate the record.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        record_file: &Path,
        daily_times: &str,
    ) -> Result<UploadOutcome, StepError>;
}

/// Cleanup step: the only consumer allowed to treat the record's
/// contents as deletable.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Cleaner: Send + Sync {
    async fn clean(&self, record_file: &Path) -> Result<CleanReport, StepError>;
}
