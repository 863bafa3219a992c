//! Pipeline orchestrator.
//!
//! For every video under a root directory, in order: fetch missing
//! subtitles, classify and edit the container's subtitle tracks, then
//! normalize the language codes of the produced files. Per-item failures are
//! counted in the [`RunSummary`]; only rejected credentials make the run
//! fail.

mod summary;

pub use summary::{ImportReport, RunSummary};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use subkeeper_av::{
    ContainerEditor, ExtractTarget, RemuxOutcome, ToolRegistry, TrackClassifier,
};
use subkeeper_common::paths::{is_video_file, parse_language_suffix, precheck};
use subkeeper_common::{LanguageCodeMap, Presence};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::arr::create_client;
use crate::config::{ArrConfig, Config};
use crate::normalize::normalize_video;
use crate::opensubtitles::{missing_languages, OpenSubtitlesClient};

/// Switches for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Inspect and report only; nothing is downloaded, written or renamed.
    pub dry_run: bool,
    pub download: bool,
    pub extract: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            download: true,
            extract: true,
        }
    }
}

/// Everything a run needs, built once from the configuration.
#[derive(Debug)]
pub struct RunContext {
    wanted: Vec<String>,
    map: LanguageCodeMap,
    classifier: TrackClassifier,
    editor: ContainerEditor,
    client: Option<OpenSubtitlesClient>,
    /// Set once the client was dropped mid-run; missing languages then
    /// count as failed.
    retrieval_lost: bool,
    options: RunOptions,
}

impl RunContext {
    /// Build a context with the system tools and, when configured, an
    /// OpenSubtitles client.
    pub fn from_config(config: &Config, options: RunOptions) -> Result<Self> {
        let editor = ContainerEditor::system(ToolRegistry::discover(&config.tools));

        let wants_download = options.download && config.subtitles.download && !options.dry_run;
        let client = if !wants_download {
            None
        } else if config.opensubtitles.is_complete() {
            Some(
                OpenSubtitlesClient::new(&config.opensubtitles)
                    .context("Failed to create OpenSubtitles client")?,
            )
        } else {
            info!("OpenSubtitles credentials not configured, downloads disabled");
            None
        };

        Self::new(config, editor, client, options)
    }

    pub fn new(
        config: &Config,
        editor: ContainerEditor,
        client: Option<OpenSubtitlesClient>,
        mut options: RunOptions,
    ) -> Result<Self> {
        options.download &= config.subtitles.download;
        options.extract &= config.subtitles.extract;

        let map = config.language_map()?;
        let wanted = config.wanted_languages();
        let classifier = TrackClassifier::new(
            map.expand_wanted(wanted.iter().map(String::as_str)),
            &config.subtitles.remove_track_patterns,
        )
        .context("Invalid remove_track_patterns")?;

        Ok(Self {
            wanted,
            map,
            classifier,
            editor,
            client,
            retrieval_lost: false,
            options,
        })
    }

    pub fn classifier(&self) -> &TrackClassifier {
        &self.classifier
    }

    /// Process every video under `root` (or `root` itself if it is a video).
    pub async fn run(&mut self, root: &Path) -> RunSummary {
        let mut summary = RunSummary::default();

        self.start_retrieval(&mut summary).await;

        let videos = find_videos(root);
        info!("Found {} video(s) under {:?}", videos.len(), root);
        for video in &videos {
            self.process_video(video, &mut summary).await;
        }

        self.finish_retrieval().await;

        info!(
            videos = summary.videos_seen,
            extracted = summary.tracks_extracted,
            removed = summary.tracks_removed,
            downloaded = summary.downloads.total_downloaded(),
            "Run complete"
        );
        summary
    }

    /// Retrieval, then track editing, then normalization for one video.
    pub async fn process_video(&mut self, video: &Path, summary: &mut RunSummary) {
        summary.videos_seen += 1;
        info!("Processing {:?}", video);

        if self.options.download {
            self.retrieve(video, summary).await;
        }

        let mut partial = Vec::new();
        if self.options.extract {
            partial = self.edit_tracks(video, summary).await;
        }

        if self.options.dry_run {
            return;
        }
        // Output of a failed extraction keeps its name so nothing mistakes it
        // for a finished subtitle.
        match normalize_video(video, &self.map, &partial) {
            Ok(report) => summary.add_normalize(&report),
            Err(e) => warn!("Failed to normalize subtitles of {:?}: {}", video, e),
        }
    }

    async fn start_retrieval(&mut self, summary: &mut RunSummary) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        match client.authenticate().await {
            Ok(state) => debug!("OpenSubtitles session: {:?}", state),
            Err(e) if e.is_unauthorized() => {
                error!("OpenSubtitles login failed, downloads disabled: {}", e);
                summary.auth_failed = true;
                self.drop_client();
            }
            Err(e) => {
                warn!("OpenSubtitles unavailable, downloads disabled for this run: {}", e);
                self.drop_client();
            }
        }
    }

    fn drop_client(&mut self) {
        self.client = None;
        self.retrieval_lost = true;
    }

    async fn finish_retrieval(&mut self) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        if let Err(e) = client.logout().await {
            warn!("OpenSubtitles logout failed: {}", e);
        }
    }

    async fn retrieve(&mut self, video: &Path, summary: &mut RunSummary) {
        if self.options.dry_run {
            let missing = missing_languages(video, &self.wanted, &mut summary.downloads);
            if !missing.is_empty() {
                info!("[dry run] would search {:?} for {:?}", missing, video);
            }
            return;
        }

        let Some(client) = self.client.as_mut() else {
            if self.retrieval_lost {
                let missing = missing_languages(video, &self.wanted, &mut summary.downloads);
                if !missing.is_empty() {
                    debug!("OpenSubtitles unavailable, {:?} not fetched for {:?}", missing, video);
                    summary.downloads.failed += missing.len();
                }
            }
            return;
        };
        if let Err(e) = client
            .fetch_missing(video, &self.wanted, &mut summary.downloads)
            .await
        {
            error!("OpenSubtitles rejected the credentials, downloads disabled: {}", e);
            summary.auth_failed = true;
            self.drop_client();
        }
    }

    /// Extract and remux. Returns the targets of a failed extraction.
    async fn edit_tracks(&self, video: &Path, summary: &mut RunSummary) -> Vec<PathBuf> {
        let info = match self.editor.identify(video).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Skipping {:?}: {}", video, e);
                summary.videos_skipped += 1;
                return Vec::new();
            }
        };

        let classification = self.classifier.classify(video, &info.tracks);
        let (targets, present): (Vec<ExtractTarget>, Vec<ExtractTarget>) = classification
            .extract_targets()
            .iter()
            .cloned()
            .partition(|t| !self.already_on_disk(t));
        for target in &present {
            info!(
                "{:?} already exists, not extracting track {}",
                target.output, target.track_id
            );
        }
        summary.extract_already_present += present.len();
        let remove_ids = classification.remove_ids();

        if self.options.dry_run {
            for (id, disposition) in &classification.dispositions {
                info!("[dry run] track {}: {:?}", id, disposition);
            }
            return Vec::new();
        }

        let mut failed = Vec::new();
        if !targets.is_empty() {
            match self.editor.extract(video, &targets).await {
                Ok(()) => summary.tracks_extracted += targets.len(),
                Err(e) => {
                    warn!("Extraction from {:?} failed: {}", video, e);
                    summary.extraction_failures += 1;
                    failed = targets.into_iter().map(|t| t.output).collect();
                }
            }
        }

        match self.editor.remux(video, &remove_ids).await {
            Ok(RemuxOutcome::Remuxed { removed }) => summary.tracks_removed += removed.len(),
            Ok(RemuxOutcome::Skipped) => {}
            Err(e) => {
                warn!("Remux of {:?} failed, original kept: {}", video, e);
                summary.remux_failures += 1;
            }
        }
        failed
    }

    /// The target, or the name the normalizer would give it, exists.
    fn already_on_disk(&self, target: &ExtractTarget) -> bool {
        if precheck(&target.output) == Presence::AlreadyPresent {
            return true;
        }
        let Some(two) = self.map.get(&target.language) else {
            return false;
        };
        let Some(suffix) = target
            .output
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_language_suffix)
        else {
            return false;
        };
        precheck(&target.output.with_file_name(suffix.with_code(two))) == Presence::AlreadyPresent
    }
}

/// Hand `path` to the configured arr and wait for the import.
pub async fn import_into(arr: &ArrConfig, path: &Path) -> ImportReport {
    let client = create_client(arr);
    let outcome = client.import(path).await.map_err(|e| format!("{e:#}"));
    match &outcome {
        Ok(o) if o.is_success() => info!("{} imported {:?}", client.name(), path),
        Ok(o) => warn!("{} import of {:?} did not complete: {:?}", client.name(), path, o),
        Err(e) => warn!("{} import of {:?} failed: {}", client.name(), path, e),
    }
    ImportReport {
        arr: arr.name.clone(),
        outcome,
    }
}

/// Videos under `root`, sorted, skipping hidden files and directories.
pub fn find_videos(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Cannot read {:?}: {}", e.path(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}
