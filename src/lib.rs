pub mod cleanup;
pub mod config;
pub mod contract;
pub mod cover;
pub mod pipeline;
pub mod process;
pub mod record;
pub mod sync;

use anyhow::Result;
use clap::Parser;

use crate::cleanup::NativeCleaner;
use crate::config::RunnerConfig;
use crate::contract::{Cleaner, Syncer};
use crate::pipeline::{run_pipeline, PipelineReport};
use crate::process::{CollaboratorCommand, ProcessCleaner, ProcessSyncer, ProcessUploader};
use crate::sync::{NativeSyncer, VideoVariant};

/// Upload stays an external program: the platform protocol lives in the
/// social-auto-upload scripts, not here.
pub const DEFAULT_UPLOAD_CMD: &str = "python upload_from_record.py";

/// CLI for sora-sync: sync daily downloads, upload under a quota, clean up.
#[derive(Parser)]
#[clap(
    name = "sora-sync",
    version,
    about = "Sync daily Sora downloader outputs, upload them under a daily quota, then clean up"
)]
pub struct Cli {
    /// Date folder YYYYMMDD, 'latest', or root/flat/. for flat source-root mode
    pub date: Option<String>,
    /// Only sync the first N videos (0 = all)
    pub limit: Option<String>,
    /// Maximum uploads permitted per day
    pub daily_times: Option<String>,
    /// Root folder of the downloader outputs
    pub source_root: Option<String>,
    /// Cover strategy: auto, manifest or frame
    pub cover_strategy: Option<String>,
    /// Timestamp in seconds for frame-extracted covers
    pub cover_frame_seconds: Option<String>,

    /// Upload program; gets --record-file and --daily-times appended
    #[clap(long, default_value = DEFAULT_UPLOAD_CMD)]
    pub upload_cmd: String,
    /// External sync program instead of the built-in syncer
    #[clap(long)]
    pub sync_cmd: Option<String>,
    /// External cleanup program instead of the built-in cleaner
    #[clap(long)]
    pub cleanup_cmd: Option<String>,
    /// Video variant for the built-in syncer: all, main_only or wm_only
    #[clap(long, default_value = "all")]
    pub video_variant: String,
}

/// Extracted async CLI entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<PipelineReport> {
    tracing::info!("trace_initialised");

    let config = RunnerConfig::resolve(
        cli.date.as_deref(),
        cli.limit.as_deref(),
        cli.daily_times.as_deref(),
        cli.source_root.as_deref(),
        cli.cover_strategy.as_deref(),
        cli.cover_frame_seconds.as_deref(),
    );
    config.trace_loaded();

    let syncer: Box<dyn Syncer> = match &cli.sync_cmd {
        Some(cmd) => Box::new(ProcessSyncer::new(
            CollaboratorCommand::parse(cmd).map_err(|e| anyhow::anyhow!(e))?,
        )),
        None => Box::new(NativeSyncer::new(VideoVariant::from(
            cli.video_variant.as_str(),
        ))),
    };
    let uploader = ProcessUploader::new(
        CollaboratorCommand::parse(&cli.upload_cmd).map_err(|e| anyhow::anyhow!(e))?,
    );
    let cleaner: Box<dyn Cleaner> = match &cli.cleanup_cmd {
        Some(cmd) => Box::new(ProcessCleaner::new(
            CollaboratorCommand::parse(cmd).map_err(|e| anyhow::anyhow!(e))?,
        )),
        None => Box::new(NativeCleaner::new()),
    };

    println!("Pipeline starting...");
    match run_pipeline(&config, syncer.as_ref(), &uploader, cleaner.as_ref()).await {
        Ok(report) => {
            println!("Pipeline complete.\nReport:");
            println!("{report:#?}");
            Ok(report)
        }
        Err(e) => {
            eprintln!("[ERROR] Pipeline failed: {e}");
            Err(e.into())
        }
    }
}
