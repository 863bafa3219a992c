//! Per-video retrieval: find the missing languages, search once, download
//! each language on its own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use subkeeper_common::paths::{base_name, precheck, subtitle_path};
use subkeeper_common::Presence;
use tracing::{debug, info, warn};

use super::client::OpenSubtitlesClient;
use super::error::ApiError;
use super::types::{MediaKind, SearchQuery, SubtitleRecord};
use crate::fingerprint::fingerprint;

/// Download counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadAggregate {
    /// Files written, per language.
    pub downloaded: BTreeMap<String, usize>,
    /// Languages that could not be fetched (HTTP, quota, write errors).
    pub failed: usize,
    /// Languages skipped because the file already existed.
    pub already_present: usize,
    /// Languages the catalogue had nothing for, per language.
    pub not_found: BTreeMap<String, usize>,
    /// Last `remaining` value reported by the server.
    pub remaining_quota: Option<i64>,
}

impl DownloadAggregate {
    pub fn total_downloaded(&self) -> usize {
        self.downloaded.values().sum()
    }

    pub fn total_not_found(&self) -> usize {
        self.not_found.values().sum()
    }

    fn record_downloaded(&mut self, lang: &str) {
        *self.downloaded.entry(lang.to_string()).or_default() += 1;
    }

    fn record_not_found(&mut self, lang: &str) {
        *self.not_found.entry(lang.to_string()).or_default() += 1;
    }
}

impl fmt::Display for DownloadAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_lang = |map: &BTreeMap<String, usize>| {
            map.iter()
                .map(|(lang, n)| format!("{lang}={n}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "downloaded {} [{}], already present {}, not found {} [{}], failed {}",
            self.total_downloaded(),
            per_lang(&self.downloaded),
            self.already_present,
            self.total_not_found(),
            per_lang(&self.not_found),
            self.failed
        )?;
        if let Some(remaining) = self.remaining_quota {
            write!(f, ", quota remaining {remaining}")?;
        }
        Ok(())
    }
}

fn episode_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bS\d{1,2}E\d{1,3}\b").expect("episode marker regex should compile")
    })
}

/// Movie or episode, judged by an `SxxEyy` marker in the name.
pub fn media_kind(name: &str) -> MediaKind {
    let spaced = name.replace(['.', '_'], " ");
    if episode_marker().is_match(&spaced) {
        MediaKind::Episode
    } else {
        MediaKind::Movie
    }
}

/// Search text for a video: its base name with separators as spaces.
pub fn query_text(video: &Path) -> String {
    base_name(video)
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The single search call for the given missing languages.
pub fn build_query(
    video: &Path,
    missing: &BTreeSet<String>,
    moviehash: Option<String>,
) -> SearchQuery {
    SearchQuery {
        kind: media_kind(&base_name(video)),
        query: query_text(video),
        languages: missing.iter().cloned().collect(),
        moviehash,
    }
}

/// Best record for `lang`: a moviehash match first, then the most
/// downloaded. Records without a file are skipped; on a tie the earliest
/// record in server order wins.
pub fn best_for_language<'a>(
    records: &'a [SubtitleRecord],
    lang: &str,
) -> Option<&'a SubtitleRecord> {
    // max_by_key keeps the last maximum, so walk backwards.
    records
        .iter()
        .filter(|r| r.file_id().is_some())
        .filter(|r| r.language().as_deref() == Some(lang))
        .rev()
        .max_by_key(|r| (r.attributes.moviehash_match, r.attributes.download_count))
}

/// Split the wanted languages into missing ones and count the rest as
/// already present. No network activity.
pub fn missing_languages(
    video: &Path,
    wanted: &[String],
    aggregate: &mut DownloadAggregate,
) -> BTreeSet<String> {
    let mut missing = BTreeSet::new();
    for lang in wanted {
        match precheck(&subtitle_path(video, lang)) {
            Presence::AlreadyPresent => {
                debug!("{} subtitle already present for {:?}", lang, video);
                aggregate.already_present += 1;
            }
            Presence::NeedsFetch => {
                missing.insert(lang.clone());
            }
        }
    }
    missing
}

/// Write `content` to `target` unless it already exists.
///
/// Returns `false` when the target appeared in the meantime.
fn write_new_file(target: &Path, content: &[u8]) -> Result<bool, ApiError> {
    let dir = match target.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut temp, content)?;
    match temp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ApiError::Io(e.error)),
    }
}

impl OpenSubtitlesClient {
    /// Fetch every wanted language that has no subtitle file next to
    /// `video` yet.
    ///
    /// Per-language failures are counted in `aggregate` and never stop the
    /// other languages. Only a failed authentication is returned as an
    /// error, after the missing languages were counted as failed.
    pub async fn fetch_missing(
        &mut self,
        video: &Path,
        wanted: &[String],
        aggregate: &mut DownloadAggregate,
    ) -> Result<(), ApiError> {
        let missing = missing_languages(video, wanted, aggregate);
        if missing.is_empty() {
            return Ok(());
        }

        if self.quota_exhausted() {
            debug!("Download quota exhausted, skipping {:?}", video);
            aggregate.failed += missing.len();
            return Ok(());
        }

        let moviehash = match fingerprint(video) {
            Ok(hash) => Some(hash.to_string()),
            Err(e) => {
                warn!("No fingerprint for {:?}: {}", video, e);
                None
            }
        };

        let query = build_query(video, &missing, moviehash);
        let records = match self.search(&query).await {
            Ok(records) => records,
            Err(e) if e.is_unauthorized() => {
                aggregate.failed += missing.len();
                return Err(e);
            }
            Err(e) => {
                warn!("Subtitle search failed for {:?}: {}", video, e);
                aggregate.failed += missing.len();
                return Ok(());
            }
        };

        if records.is_empty() {
            info!("No subtitles found for {:?}", video);
            for lang in &missing {
                aggregate.record_not_found(lang);
            }
            return Ok(());
        }

        for lang in &missing {
            let Some(record) = best_for_language(&records, lang) else {
                debug!("No {} subtitle found for {:?}", lang, video);
                aggregate.record_not_found(lang);
                continue;
            };

            let target = subtitle_path(video, lang);
            match self.download_record(record, &target).await {
                Ok(true) => {
                    info!("Downloaded {:?}", target.file_name().unwrap_or_default());
                    aggregate.record_downloaded(lang);
                }
                Ok(false) => {
                    warn!("Not overwriting existing {:?}", target);
                    aggregate.already_present += 1;
                }
                Err(e) => {
                    warn!("Failed to download {} subtitle for {:?}: {}", lang, video, e);
                    aggregate.failed += 1;
                }
            }
            aggregate.remaining_quota = self.remaining_quota().or(aggregate.remaining_quota);
        }

        Ok(())
    }

    async fn download_record(
        &mut self,
        record: &SubtitleRecord,
        target: &Path,
    ) -> Result<bool, ApiError> {
        let file_id = record
            .file_id()
            .ok_or_else(|| ApiError::Decode(format!("subtitle {} has no file", record.id)))?;
        let grant = self.download(file_id).await?;
        let content = self.fetch_link(&grant.link).await?;
        write_new_file(target, &content)
    }
}
