//! External-process adapters for the three collaborators.
//!
//! These reproduce the exact argument surface each external program
//! expects and translate exit codes into the tagged outcomes the runner
//! branches on. Child stdio is inherited so collaborator output reaches
//! the operator unchanged.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::contract::{
    CleanReport, Cleaner, StepError, SyncReport, Syncer, UploadOutcome, Uploader,
};

/// Exit code the upload program uses for "no files were eligible".
const EXIT_NOTHING_TO_UPLOAD: i32 = 2;

/// An external program plus its leading arguments, e.g.
/// `python sync_sora_daily_videos.py`.
#[derive(Debug, Clone)]
pub struct CollaboratorCommand {
    program: String,
    base_args: Vec<String>,
}

impl CollaboratorCommand {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        CollaboratorCommand {
            program: program.into(),
            base_args,
        }
    }

    /// Split a whitespace-separated command line. The first token is the
    /// program, the rest are leading arguments.
    pub fn parse(command_line: &str) -> Result<Self, StepError> {
        let mut tokens = command_line.split_whitespace().map(str::to_string);
        let program = tokens
            .next()
            .ok_or_else(|| StepError::from("empty collaborator command"))?;
        Ok(CollaboratorCommand {
            program,
            base_args: tokens.collect(),
        })
    }

    /// Run the program with extra arguments appended and wait for it to
    /// finish. Returns the exit code; a child killed by a signal has
    /// none and is mapped to an error.
    async fn run(&self, extra_args: &[&str]) -> Result<i32, StepError> {
        debug!(program = %self.program, args = ?extra_args, "Spawning collaborator");
        let status = Command::new(&self.program)
            .args(&self.base_args)
            .args(extra_args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| format!("failed to launch {}: {e}", self.program))?;

        status
            .code()
            .ok_or_else(|| StepError::from(format!("{} terminated by signal", self.program)))
    }
}

/// Sync as an external program, e.g. the Python downloader-sync script.
pub struct ProcessSyncer {
    command: CollaboratorCommand,
}

impl ProcessSyncer {
    pub fn new(command: CollaboratorCommand) -> Self {
        ProcessSyncer { command }
    }
}

#[async_trait]
impl Syncer for ProcessSyncer {
    async fn sync(&self, config: &RunnerConfig) -> Result<SyncReport, StepError> {
        let source_root = config.source_root.display().to_string();
        let record_file = config.record_file.display().to_string();
        let code = self
            .command
            .run(&[
                "--source-root",
                &source_root,
                "--date",
                &config.date,
                "--limit",
                &config.limit,
                "--overwrite",
                "--record-file",
                &record_file,
                "--cover-strategy",
                &config.cover_strategy,
                "--cover-frame-seconds",
                &config.cover_frame_seconds,
            ])
            .await?;

        if code == 0 {
            info!(program = %self.command.program, "Sync collaborator exited cleanly");
            // The record is the collaborator's; leave it opaque.
            Ok(SyncReport { synced_count: None })
        } else {
            Err(format!("sync program exited with code {code}").into())
        }
    }
}

/// Upload as an external program. The one collaborator with a
/// distinguished sentinel exit code.
pub struct ProcessUploader {
    command: CollaboratorCommand,
}

impl ProcessUploader {
    pub fn new(command: CollaboratorCommand) -> Self {
        ProcessUploader { command }
    }
}

#[async_trait]
impl Uploader for ProcessUploader {
    async fn upload(
        &self,
        record_file: &Path,
        daily_times: &str,
    ) -> Result<UploadOutcome, StepError> {
        let record_file = record_file.display().to_string();
        let code = self
            .command
            .run(&["--record-file", &record_file, "--daily-times", daily_times])
            .await?;

        match code {
            0 => Ok(UploadOutcome::Uploaded),
            EXIT_NOTHING_TO_UPLOAD => Ok(UploadOutcome::NothingToUpload),
            other => Err(format!("upload program exited with code {other}").into()),
        }
    }
}

/// Cleanup as an external program.
pub struct ProcessCleaner {
    command: CollaboratorCommand,
}

impl ProcessCleaner {
    pub fn new(command: CollaboratorCommand) -> Self {
        ProcessCleaner { command }
    }
}

#[async_trait]
impl Cleaner for ProcessCleaner {
    async fn clean(&self, record_file: &Path) -> Result<CleanReport, StepError> {
        let record_file = record_file.display().to_string();
        let code = self.command.run(&["--record-file", &record_file]).await?;

        if code == 0 {
            Ok(CleanReport::default())
        } else {
            Err(format!("cleanup program exited with code {code}").into())
        }
    }
}
