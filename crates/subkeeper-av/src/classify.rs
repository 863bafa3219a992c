//! Subtitle track classification.
//!
//! Every subtitle track in a container receives exactly one
//! [`TrackDisposition`]. The rules are applied in order:
//!
//! 1. Non-text codec (PGS, VobSub, ASS) -> remove.
//! 2. Track name matches a removal pattern -> remove.
//! 3. Language is wanted -> extract to `<basename>.<language>.srt`.
//! 4. Anything else -> remove.
//!
//! Video and audio tracks are ignored.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use subkeeper_common::paths::{disambiguated_subtitle_path, subtitle_path};
use subkeeper_common::{Error, Result};

use crate::identify::{ContainerTrack, SubtitleTrack};

/// Why a subtitle track is dropped from the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveReason {
    /// Image-based or otherwise non-SRT codec.
    NotText,
    /// Track name matched the given removal pattern.
    NameMatched(String),
    /// Text track in a language nobody asked for.
    UnwantedLanguage,
}

/// What happens to a single track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackDisposition {
    /// Extract to `output`; the track stays in the container.
    Extract { output: PathBuf },
    /// Drop from the container on remux.
    Remove(RemoveReason),
    /// Not a subtitle track.
    Ignore,
}

/// A track id paired with the file it is extracted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractTarget {
    pub track_id: u64,
    pub language: String,
    pub output: PathBuf,
}

/// Result of classifying one container.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// `(track id, disposition)` in container order.
    pub dispositions: Vec<(u64, TrackDisposition)>,
    extract: Vec<ExtractTarget>,
}

impl Classification {
    /// Tracks to extract, with their output paths.
    pub fn extract_targets(&self) -> &[ExtractTarget] {
        &self.extract
    }

    /// Ids of subtitle tracks to drop from the container.
    pub fn remove_ids(&self) -> Vec<u64> {
        self.dispositions
            .iter()
            .filter(|(_, d)| matches!(d, TrackDisposition::Remove(_)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Disposition of a given track id.
    pub fn disposition(&self, track_id: u64) -> Option<&TrackDisposition> {
        self.dispositions
            .iter()
            .find(|(id, _)| *id == track_id)
            .map(|(_, d)| d)
    }

    /// Whether there is nothing to extract and nothing to remove.
    pub fn is_noop(&self) -> bool {
        self.extract.is_empty() && self.remove_ids().is_empty()
    }
}

/// Decides keep/remove/extract for the subtitle tracks of a container.
#[derive(Debug, Clone)]
pub struct TrackClassifier {
    wanted: BTreeSet<String>,
    remove_patterns: Vec<Regex>,
}

impl TrackClassifier {
    /// Create a classifier for the given wanted language codes and track
    /// name removal patterns.
    ///
    /// Codes are compared case-insensitively. Patterns are regular
    /// expressions matched case-insensitively anywhere in the track name, so
    /// a plain word works as a substring match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a pattern is not a valid regex.
    pub fn new<S: AsRef<str>>(
        wanted: impl IntoIterator<Item = S>,
        remove_patterns: &[String],
    ) -> Result<Self> {
        let remove_patterns = remove_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            wanted: wanted
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_lowercase())
                .collect(),
            remove_patterns,
        })
    }

    /// The wanted language codes.
    pub fn wanted(&self) -> &BTreeSet<String> {
        &self.wanted
    }

    /// Classify every track of the container at `video`.
    pub fn classify(&self, video: &Path, tracks: &[ContainerTrack]) -> Classification {
        let mut classification = Classification::default();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for track in tracks {
            match track {
                ContainerTrack::Subtitles(sub) => {
                    let disposition = self.classify_subtitle(video, sub, &mut claimed);
                    if let TrackDisposition::Extract { output } = &disposition {
                        classification.extract.push(ExtractTarget {
                            track_id: sub.id,
                            language: sub.language().unwrap_or_default().to_ascii_lowercase(),
                            output: output.clone(),
                        });
                    }
                    classification.dispositions.push((sub.id, disposition));
                }
                ContainerTrack::Video(t) | ContainerTrack::Audio(t) => {
                    classification.dispositions.push((t.id, TrackDisposition::Ignore));
                }
                ContainerTrack::Other => {}
            }
        }

        classification
    }

    fn classify_subtitle(
        &self,
        video: &Path,
        track: &SubtitleTrack,
        claimed: &mut HashSet<PathBuf>,
    ) -> TrackDisposition {
        if !track.is_text() {
            return TrackDisposition::Remove(RemoveReason::NotText);
        }

        if let Some(name) = track.name() {
            if let Some(pattern) = self.remove_patterns.iter().find(|p| p.is_match(name)) {
                return TrackDisposition::Remove(RemoveReason::NameMatched(
                    pattern.as_str().to_string(),
                ));
            }
        }

        let Some(language) = track
            .language()
            .map(str::to_ascii_lowercase)
            .filter(|l| self.wanted.contains(l))
        else {
            return TrackDisposition::Remove(RemoveReason::UnwantedLanguage);
        };

        let mut output = subtitle_path(video, &language);
        if claimed.contains(&output) {
            output = disambiguated_subtitle_path(video, track.id, &language);
        }
        claimed.insert(output.clone());

        TrackDisposition::Extract { output }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Validation(format!("invalid track name pattern '{pattern}': {e}")))
}
