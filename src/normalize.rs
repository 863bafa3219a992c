//! Language code normalizer.
//!
//! Renames `<stem>.<xxx>.srt` to `<stem>.<xx>.srt` using the
//! [`LanguageCodeMap`]. Files already carrying a 2-letter code are left
//! alone, so running twice renames nothing the second time. A rename onto an
//! existing file is skipped, never forced.

use std::path::{Path, PathBuf};

use subkeeper_common::paths::{base_name, is_srt_file, parse_language_suffix};
use subkeeper_common::{LanguageCodeMap, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What happened to a single subtitle file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    Renamed { to: PathBuf },
    /// Code is not 3 letters, or the name has no language segment.
    Unchanged,
    /// 3-letter code missing from the table.
    UnknownCode(String),
    /// The 2-letter name already exists.
    Collision { target: PathBuf },
}

/// Counts from one normalizer pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub renamed: usize,
    pub collisions: usize,
    pub unknown_codes: usize,
}

impl NormalizeReport {
    fn record(&mut self, outcome: &NormalizeOutcome) {
        match outcome {
            NormalizeOutcome::Renamed { .. } => self.renamed += 1,
            NormalizeOutcome::Collision { .. } => self.collisions += 1,
            NormalizeOutcome::UnknownCode(_) => self.unknown_codes += 1,
            NormalizeOutcome::Unchanged => {}
        }
    }

    pub fn merge(&mut self, other: &NormalizeReport) {
        self.renamed += other.renamed;
        self.collisions += other.collisions;
        self.unknown_codes += other.unknown_codes;
    }
}

/// Normalize a single subtitle file.
pub fn normalize_file(path: &Path, map: &LanguageCodeMap) -> Result<NormalizeOutcome> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(NormalizeOutcome::Unchanged);
    };
    let Some(suffix) = parse_language_suffix(file_name) else {
        return Ok(NormalizeOutcome::Unchanged);
    };
    if suffix.code.len() != 3 {
        return Ok(NormalizeOutcome::Unchanged);
    }

    let code = suffix.code.to_ascii_lowercase();
    let Some(two) = map.get(&code) else {
        warn!(
            "No 2-letter code configured for '{}'; leaving {:?} as is",
            code, path
        );
        return Ok(NormalizeOutcome::UnknownCode(code));
    };

    let target = path.with_file_name(suffix.with_code(two));
    if target.exists() {
        warn!(
            "Not renaming {:?}: {:?} already exists",
            path,
            target.file_name().unwrap_or_default()
        );
        return Ok(NormalizeOutcome::Collision { target });
    }

    std::fs::rename(path, &target)?;
    debug!("Renamed {:?} -> {:?}", path, target);
    Ok(NormalizeOutcome::Renamed { to: target })
}

/// Normalize every `.srt` file directly inside `dir`.
pub fn normalize_directory(dir: &Path, map: &LanguageCodeMap) -> Result<NormalizeReport> {
    normalize_matching(dir, map, |_| true)
}

/// Normalize the sidecar subtitles of one video: `.srt` files next to it
/// whose names start with the video's base name. Paths in `keep` are left
/// under their current names.
pub fn normalize_video(
    video: &Path,
    map: &LanguageCodeMap,
    keep: &[PathBuf],
) -> Result<NormalizeReport> {
    let Some(dir) = video.parent() else {
        return Ok(NormalizeReport::default());
    };
    let prefix = format!("{}.", base_name(video));
    let kept: Vec<&std::ffi::OsStr> = keep.iter().filter_map(|p| p.file_name()).collect();
    normalize_matching(dir, map, |name| {
        name.starts_with(&prefix) && !kept.iter().any(|k| *k == name)
    })
}

fn normalize_matching(
    dir: &Path,
    map: &LanguageCodeMap,
    wanted: impl Fn(&str) -> bool,
) -> Result<NormalizeReport> {
    let mut report = NormalizeReport::default();

    // Collect first so renames do not disturb the directory iteration.
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_srt_file(path) {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(&wanted)
        {
            files.push(path.to_path_buf());
        }
    }

    for path in files {
        match normalize_file(&path, map) {
            Ok(outcome) => report.record(&outcome),
            Err(e) => warn!("Failed to rename {:?}: {}", path, e),
        }
    }

    if report.renamed > 0 {
        info!("Normalized {} subtitle file(s) in {:?}", report.renamed, dir);
    }
    Ok(report)
}
