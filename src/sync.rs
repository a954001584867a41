//! In-process sync collaborator: copies the downloader's daily output
//! into the upload staging directory, writes title sidecars and covers,
//! and records what changed for the upload and cleanup steps.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::contract::{StepError, SyncReport, Syncer};
use crate::cover::{download_thumbnail, extract_cover_frame, CoverStrategy};
use crate::record::{SyncRecord, SyncedFile};

const MANIFEST_FILE: &str = "manifest.latest.json";

/// Which mp4 variant to sync. Files named `*_wm.mp4` carry a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoVariant {
    All,
    MainOnly,
    WmOnly,
}

impl From<&str> for VideoVariant {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "main_only" => VideoVariant::MainOnly,
            "wm_only" => VideoVariant::WmOnly,
            "all" => VideoVariant::All,
            other => {
                warn!(variant = other, "Unknown video variant, defaulting to all");
                VideoVariant::All
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// A `YYYYMMDD` folder under the source root.
    Daily,
    /// The source root itself holds the mp4 files.
    Flat,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Daily => "daily",
            SourceMode::Flat => "flat",
        }
    }
}

/// One entry of the downloader's `manifest.latest.json`. Unknown fields
/// are ignored; missing ones default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    asset_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    candidates: Vec<String>,
}

fn is_wm_video(path: &Path) -> bool {
    stem(path).to_lowercase().ends_with("_wm")
}

fn stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Asset id for a video file: the stem with any `_wm` suffix stripped.
fn normalized_asset_id(path: &Path) -> String {
    let stem = stem(path);
    if stem.to_lowercase().ends_with("_wm") {
        stem[..stem.len() - 3].to_string()
    } else {
        stem
    }
}

fn is_daily_dir_name(name: &str) -> bool {
    name.len() == 8 && name.chars().all(|c| c.is_ascii_digit())
}

fn list_syncable_videos(source_dir: &Path, variant: VideoVariant) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(source_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| e.eq_ignore_ascii_case("mp4"))
                    .unwrap_or(false)
        })
        .filter(|p| match variant {
            VideoVariant::All => true,
            VideoVariant::MainOnly => !is_wm_video(p),
            VideoVariant::WmOnly => is_wm_video(p),
        })
        .collect()
}

fn daily_dirs(source_root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(source_root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .map(|n| is_daily_dir_name(&n.to_string_lossy()))
                    .unwrap_or(false)
        })
        .collect();
    // Newest first: YYYYMMDD names sort lexicographically.
    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    dirs
}

/// Pick the directory to sync from. `latest` prefers the newest daily
/// folder, falling back to flat source-root mode when the root itself
/// holds syncable videos; `root`/`flat`/`.` force flat mode; anything
/// else is taken as a literal date folder name.
pub fn resolve_source_dir(
    source_root: &Path,
    date: &str,
    variant: VideoVariant,
) -> Result<(PathBuf, SourceMode), StepError> {
    let date_value = date.trim();
    let date_lower = date_value.to_lowercase();

    if date_lower.is_empty() || date_lower == "latest" {
        let dirs = daily_dirs(source_root);
        if let Some(newest) = dirs.into_iter().next() {
            return Ok((newest, SourceMode::Daily));
        }
        if !list_syncable_videos(source_root, variant).is_empty() {
            return Ok((source_root.to_path_buf(), SourceMode::Flat));
        }
        return Err(format!(
            "no daily folders like YYYYMMDD under {} and no syncable videos at the root; \
             run the downloader first, or pass date=root for flat source-root mode",
            source_root.display()
        )
        .into());
    }

    if matches!(date_lower.as_str(), "root" | "flat" | ".") {
        if list_syncable_videos(source_root, variant).is_empty() {
            return Err(format!(
                "no syncable videos under source root {}; run the downloader first \
                 or switch the video variant",
                source_root.display()
            )
            .into());
        }
        return Ok((source_root.to_path_buf(), SourceMode::Flat));
    }

    let source_dir = source_root.join(date_value);
    if source_dir.is_dir() {
        return Ok((source_dir, SourceMode::Daily));
    }
    Err(format!(
        "date folder not found: {}; use date=latest, or date=root for flat mode",
        source_dir.display()
    )
    .into())
}

fn pick_thumbnail_url(entry: &ManifestEntry) -> String {
    let url = entry.thumbnail.trim();
    if !url.is_empty() {
        return url.to_string();
    }
    entry
        .candidates
        .iter()
        .find(|c| c.contains("thumbnail") && c.starts_with("http"))
        .cloned()
        .unwrap_or_default()
}

struct ManifestIndex {
    entries: Vec<ManifestEntry>,
    by_asset: HashMap<String, ManifestEntry>,
    /// The manifest sometimes reuses one thumbnail URL across assets;
    /// those duplicates are untrustworthy as covers.
    thumb_counts: HashMap<String, usize>,
}

fn load_manifest_index(manifest_path: &Path) -> ManifestIndex {
    let entries: Vec<ManifestEntry> = match fs::read_to_string(manifest_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %manifest_path.display(), error = %e, "Ignoring unreadable manifest");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    };

    let mut by_asset: HashMap<String, ManifestEntry> = HashMap::new();
    for entry in &entries {
        if !entry.asset_id.is_empty() {
            by_asset.insert(entry.asset_id.clone(), entry.clone());
        }
    }

    let mut thumb_counts: HashMap<String, usize> = HashMap::new();
    for entry in by_asset.values() {
        let url = pick_thumbnail_url(entry);
        if !url.is_empty() {
            *thumb_counts.entry(url).or_insert(0) += 1;
        }
    }

    ManifestIndex {
        entries,
        by_asset,
        thumb_counts,
    }
}

fn candidate_names_for_asset(asset_id: &str, variant: VideoVariant) -> Vec<String> {
    match variant {
        VideoVariant::WmOnly => vec![format!("{asset_id}_wm.mp4")],
        VideoVariant::MainOnly => vec![format!("{asset_id}.mp4")],
        VideoVariant::All => vec![format!("{asset_id}.mp4"), format!("{asset_id}_wm.mp4")],
    }
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Order the videos to sync. Daily folders are already one day's worth,
/// so plain name order suffices; flat mode prioritises the manifest's
/// asset order (newest assets first) and backfills by mtime.
fn ordered_source_videos(
    source_dir: &Path,
    manifest: &ManifestIndex,
    limit: usize,
    variant: VideoVariant,
    mode: SourceMode,
) -> Vec<PathBuf> {
    let files = list_syncable_videos(source_dir, variant);
    if files.is_empty() {
        return Vec::new();
    }

    let mut selected: Vec<PathBuf>;
    match mode {
        SourceMode::Flat => {
            let by_name: HashMap<String, PathBuf> = files
                .iter()
                .filter_map(|p| p.file_name().map(|n| (n.to_string_lossy().into_owned(), p.clone())))
                .collect();
            let mut used_names: HashSet<String> = HashSet::new();
            let mut seen_assets: HashSet<String> = HashSet::new();
            selected = Vec::new();

            for entry in &manifest.entries {
                let asset_id = entry.asset_id.trim();
                if asset_id.is_empty() || !seen_assets.insert(asset_id.to_string()) {
                    continue;
                }
                for name in candidate_names_for_asset(asset_id, variant) {
                    if used_names.contains(&name) {
                        continue;
                    }
                    if let Some(path) = by_name.get(&name) {
                        selected.push(path.clone());
                        used_names.insert(name);
                    }
                }
            }

            let mut remaining: Vec<PathBuf> = files
                .into_iter()
                .filter(|p| {
                    p.file_name()
                        .map(|n| !used_names.contains(n.to_string_lossy().as_ref()))
                        .unwrap_or(true)
                })
                .collect();
            remaining.sort_by_key(|p| std::cmp::Reverse(mtime(p)));
            selected.extend(remaining);
        }
        SourceMode::Daily => {
            selected = files;
            selected.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
        }
    }

    if limit > 0 {
        selected.truncate(limit);
    }
    selected
}

fn title_for_file(video_path: &Path, manifest: &ManifestIndex) -> String {
    let asset_id = normalized_asset_id(video_path);
    match manifest.by_asset.get(&asset_id) {
        Some(entry) if !entry.title.trim().is_empty() => entry
            .title
            .replace('\r', " ")
            .replace('\n', " ")
            .trim()
            .to_string(),
        _ => asset_id,
    }
}

/// Sync collaborator running in-process instead of shelling out to the
/// downloader repo's script.
pub struct NativeSyncer {
    video_variant: VideoVariant,
    overwrite: bool,
}

impl NativeSyncer {
    pub fn new(video_variant: VideoVariant) -> Self {
        // The orchestration contract always syncs with overwrite on, so
        // a re-run replaces the prior record instead of appending.
        NativeSyncer {
            video_variant,
            overwrite: true,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    async fn pick_cover(
        &self,
        strategy: CoverStrategy,
        dst: &Path,
        cover_path: &Path,
        thumbnail_url: &str,
        duplicate_thumb: bool,
        frame_seconds: f64,
    ) -> (Option<PathBuf>, Option<String>, Option<String>) {
        let mut cover_reason: Option<String> = None;

        if matches!(strategy, CoverStrategy::Manifest | CoverStrategy::Auto) {
            if thumbnail_url.is_empty() {
                cover_reason = Some("no_thumbnail_url".into());
            } else if duplicate_thumb {
                cover_reason = Some("thumbnail_url_duplicated_in_manifest".into());
            } else {
                match download_thumbnail(thumbnail_url, cover_path, self.overwrite).await {
                    Ok(()) => {
                        return (
                            Some(cover_path.to_path_buf()),
                            Some("manifest".into()),
                            cover_reason,
                        )
                    }
                    Err(e) => cover_reason = Some(format!("thumbnail_download_failed: {e}")),
                }
            }
            if strategy == CoverStrategy::Manifest {
                return (None, None, cover_reason);
            }
        }

        if extract_cover_frame(dst, cover_path, self.overwrite, frame_seconds).await {
            let reason = cover_reason.or_else(|| Some("cover_strategy_frame".into()));
            return (Some(cover_path.to_path_buf()), Some("frame".into()), reason);
        }
        let reason = cover_reason.or_else(|| Some("frame_extract_failed".into()));
        (None, None, reason)
    }
}

impl Default for NativeSyncer {
    fn default() -> Self {
        NativeSyncer::new(VideoVariant::All)
    }
}

#[async_trait]
impl Syncer for NativeSyncer {
    async fn sync(&self, config: &RunnerConfig) -> Result<SyncReport, StepError> {
        // Validation of the raw string inputs happens here, in the
        // collaborator, never in the runner.
        let limit: usize = config
            .limit
            .parse()
            .map_err(|_| format!("limit must be an integer, got {:?}", config.limit))?;
        let frame_seconds: f64 = config.cover_frame_seconds.parse().map_err(|_| {
            format!(
                "cover-frame-seconds must be a number, got {:?}",
                config.cover_frame_seconds
            )
        })?;
        let strategy = CoverStrategy::from(config.cover_strategy.as_str());

        let (source_dir, mode) =
            resolve_source_dir(&config.source_root, &config.date, self.video_variant)?;
        info!(
            source_dir = %source_dir.display(),
            source_mode = mode.as_str(),
            target_dir = %config.target_dir.display(),
            "Syncing videos"
        );

        let manifest = load_manifest_index(&source_dir.join(MANIFEST_FILE));
        let files = ordered_source_videos(&source_dir, &manifest, limit, self.video_variant, mode);

        fs::create_dir_all(&config.target_dir)
            .map_err(|e| format!("cannot create target dir: {e}"))?;
        let mut synced: Vec<SyncedFile> = Vec::new();

        for src in files {
            let Some(file_name) = src.file_name() else {
                continue;
            };
            let dst = config.target_dir.join(file_name);
            if dst.exists() && !self.overwrite {
                continue;
            }

            fs::copy(&src, &dst)
                .map_err(|e| format!("copy {} failed: {e}", src.display()))?;

            let title = title_for_file(&src, &manifest);
            let txt_path = dst.with_extension("txt");
            fs::write(&txt_path, format!("{title}\n#sora\n"))
                .map_err(|e| format!("writing {} failed: {e}", txt_path.display()))?;

            let asset_id = normalized_asset_id(&src);
            let thumbnail_url = manifest
                .by_asset
                .get(&asset_id)
                .map(pick_thumbnail_url)
                .unwrap_or_default();
            let duplicate_thumb = !thumbnail_url.is_empty()
                && manifest.thumb_counts.get(&thumbnail_url).copied().unwrap_or(0) > 1;

            // Covers keep the mp4 stem so upload scripts auto-detect them.
            let cover_path = config.target_dir.join(format!("{}.png", stem(&src)));
            let (thumbnail_file, cover_source, cover_reason) = self
                .pick_cover(
                    strategy,
                    &dst,
                    &cover_path,
                    &thumbnail_url,
                    duplicate_thumb,
                    frame_seconds,
                )
                .await;
            if let Some(cover) = &thumbnail_file {
                info!(cover = %cover.display(), source = cover_source.as_deref().unwrap_or(""), "Cover ready");
            }

            info!(file = %file_name.to_string_lossy(), "Synced video");
            synced.push(SyncedFile {
                name: file_name.to_string_lossy().into_owned(),
                asset_id,
                mp4: dst,
                txt: txt_path,
                title,
                thumbnail_url: (!thumbnail_url.is_empty()).then_some(thumbnail_url),
                thumbnail_file,
                cover_source,
                cover_reason,
            });
        }

        let synced_count = synced.len();
        let record = SyncRecord::new(
            source_dir,
            mode.as_str(),
            match self.video_variant {
                VideoVariant::All => "all",
                VideoVariant::MainOnly => "main_only",
                VideoVariant::WmOnly => "wm_only",
            },
            config.target_dir.clone(),
            synced,
        );
        record
            .store(&config.record_file)
            .map_err(|e| format!("writing record failed: {e}"))?;
        info!(record = %config.record_file.display(), synced_count, "Sync record written");

        Ok(SyncReport {
            synced_count: Some(synced_count),
        })
    }
}
