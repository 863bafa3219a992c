//! Path utilities for video detection and subtitle file naming.
//!
//! Subtitle files live next to their container and are named
//! `<basename>.<langcode>.srt`. The helpers here build those names, parse
//! them back, and answer the "is it already there?" question before any
//! mutating step runs.

use std::path::{Path, PathBuf};

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "ts", "webm", "mov"];

/// Extension of the subtitle files this tool produces.
pub const SRT_EXTENSION: &str = "srt";

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use subkeeper_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mkv")));
/// assert!(is_video_file(Path::new("/path/to/video.MP4")));
/// assert!(!is_video_file(Path::new("subtitle.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Check if a path is an `.srt` file.
pub fn is_srt_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SRT_EXTENSION))
}

/// The base name of a video: its file name without the final extension.
pub fn base_name(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build `<dir>/<basename>.<code>.srt` for a video.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use subkeeper_common::paths::subtitle_path;
///
/// let srt = subtitle_path(Path::new("/tv/Show.S01E01.mkv"), "nl");
/// assert_eq!(srt, Path::new("/tv/Show.S01E01.nl.srt"));
/// ```
pub fn subtitle_path(video: &Path, code: &str) -> PathBuf {
    let name = format!("{}.{}.{}", base_name(video), code, SRT_EXTENSION);
    sibling(video, &name)
}

/// Build `<dir>/<basename>.<track_id>.<code>.srt`.
///
/// Used when a second track of the same language would otherwise land on
/// the same output path. The name still ends with `.<code>.srt`.
pub fn disambiguated_subtitle_path(video: &Path, track_id: u64, code: &str) -> PathBuf {
    let name = format!("{}.{}.{}.{}", base_name(video), track_id, code, SRT_EXTENSION);
    sibling(video, &name)
}

fn sibling(video: &Path, name: &str) -> PathBuf {
    match video.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// The `<stem>.<code>.srt` decomposition of a subtitle file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSuffix<'a> {
    /// Everything before the language segment.
    pub stem: &'a str,
    /// The trailing language segment, as written in the file name.
    pub code: &'a str,
}

impl LanguageSuffix<'_> {
    /// File name with the language segment replaced.
    pub fn with_code(&self, code: &str) -> String {
        format!("{}.{}.{}", self.stem, code, SRT_EXTENSION)
    }
}

/// Parse the trailing `.<code>.srt` segment of a file name.
///
/// Returns `None` when the name is not an `.srt` file or has no alphabetic
/// segment in front of the extension.
///
/// # Examples
///
/// ```
/// use subkeeper_common::paths::parse_language_suffix;
///
/// let suffix = parse_language_suffix("Movie.2019.eng.srt").unwrap();
/// assert_eq!(suffix.stem, "Movie.2019");
/// assert_eq!(suffix.code, "eng");
/// assert!(parse_language_suffix("Movie.srt").is_none());
/// ```
pub fn parse_language_suffix(file_name: &str) -> Option<LanguageSuffix<'_>> {
    let (rest, ext) = file_name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(SRT_EXTENSION) {
        return None;
    }
    let (stem, code) = rest.rsplit_once('.')?;
    if stem.is_empty() || code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(LanguageSuffix { stem, code })
}

/// Result of the idempotence pre-check that runs before any mutating step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The target already exists; nothing must be written over it.
    AlreadyPresent,
    /// The target is missing and may be produced.
    NeedsFetch,
}

/// Classify a target path before creating it.
pub fn precheck(target: &Path) -> Presence {
    if target.exists() {
        Presence::AlreadyPresent
    } else {
        Presence::NeedsFetch
    }
}
