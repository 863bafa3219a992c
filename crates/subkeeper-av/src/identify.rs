//! Container identification via `mkvmerge -J`.
//!
//! The JSON document is deserialized into a tagged track model. Subtitle
//! tracks must carry an `id` and a `codec`; a document that lacks them is a
//! typed parse error rather than a silently missing field.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use subkeeper_common::{Error, Result};

use crate::command::ToolRunner;
use crate::tools::ToolRegistry;

/// Codec names (as reported by mkvmerge) of plain-text subtitle formats that
/// can be written out as `.srt`.
const TEXT_CODECS: &[&str] = &["SubRip/SRT", "Timed Text"];

/// Matroska codec ids of SubRip tracks.
const TEXT_CODEC_IDS: &[&str] = &["S_TEXT/UTF8", "S_TEXT/ASCII"];

#[derive(Debug, Deserialize)]
struct RawIdentification {
    #[serde(default)]
    container: Option<RawContainer>,
    #[serde(default)]
    tracks: Vec<ContainerTrack>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawContainer {
    #[serde(rename = "type")]
    format: Option<String>,
    #[serde(default)]
    recognized: bool,
    #[serde(default)]
    supported: bool,
}

/// A track as listed by mkvmerge, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContainerTrack {
    Video(MediaTrack),
    Audio(MediaTrack),
    Subtitles(SubtitleTrack),
    /// Buttons and anything a newer mkvmerge may add.
    #[serde(other)]
    Other,
}

impl ContainerTrack {
    /// The subtitle track, if this is one.
    pub fn as_subtitle(&self) -> Option<&SubtitleTrack> {
        match self {
            ContainerTrack::Subtitles(track) => Some(track),
            _ => None,
        }
    }
}

/// Video or audio track. Only the id matters to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaTrack {
    pub id: u64,
    #[serde(default)]
    pub codec: Option<String>,
}

/// A subtitle track inside a container.
///
/// `id` is an mkvmerge track id; 0 is a valid id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtitleTrack {
    pub id: u64,
    pub codec: String,
    #[serde(default)]
    pub properties: SubtitleProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubtitleProperties {
    #[serde(default)]
    pub codec_id: Option<String>,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub forced_track: Option<bool>,
}

impl SubtitleTrack {
    /// Convenience constructor, mostly for tests and callers that build
    /// tracks by hand.
    pub fn new(id: u64, codec: impl Into<String>) -> Self {
        Self {
            id,
            codec: codec.into(),
            properties: SubtitleProperties::default(),
        }
    }

    pub fn with_codec_id(mut self, codec_id: impl Into<String>) -> Self {
        self.properties.codec_id = Some(codec_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.properties.track_name = Some(name.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.properties.language = Some(language.into());
        self
    }

    /// Track name, if set and not blank.
    pub fn name(&self) -> Option<&str> {
        self.properties
            .track_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
    }

    /// Language code, if set and not blank.
    pub fn language(&self) -> Option<&str> {
        self.properties
            .language
            .as_deref()
            .filter(|l| !l.trim().is_empty())
    }

    /// Whether the track is stored as plain-text cues that can be written
    /// out as SubRip. Image formats (PGS, VobSub) and styled text (ASS/SSA)
    /// do not qualify.
    pub fn is_text(&self) -> bool {
        TEXT_CODECS
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&self.codec))
            || self
                .properties
                .codec_id
                .as_deref()
                .is_some_and(|id| TEXT_CODEC_IDS.iter().any(|c| c.eq_ignore_ascii_case(id)))
    }
}

/// A file attached to the container (fonts, cover art).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub id: u64,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Parsed identification of a container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub path: PathBuf,
    pub format: Option<String>,
    pub tracks: Vec<ContainerTrack>,
    pub attachments: Vec<Attachment>,
}

impl ContainerInfo {
    /// Subtitle tracks in container order.
    pub fn subtitle_tracks(&self) -> impl Iterator<Item = &SubtitleTrack> {
        self.tracks.iter().filter_map(ContainerTrack::as_subtitle)
    }
}

/// Parse `mkvmerge -J` output.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the JSON is malformed, a track lacks a
/// required field, or mkvmerge reported that it could not read the file.
pub fn parse_identification(path: &Path, json: &str) -> Result<ContainerInfo> {
    let raw: RawIdentification = serde_json::from_str(json)
        .map_err(|e| Error::parse("mkvmerge identification", e.to_string()))?;

    if !raw.errors.is_empty() {
        return Err(Error::parse(
            "mkvmerge identification",
            raw.errors.join("; "),
        ));
    }

    let format = match raw.container {
        Some(c) if !c.recognized || !c.supported => {
            return Err(Error::parse(
                "mkvmerge identification",
                format!(
                    "container {} is not supported",
                    c.format.as_deref().unwrap_or("of unknown type")
                ),
            ));
        }
        Some(c) => c.format,
        None => None,
    };

    Ok(ContainerInfo {
        path: path.to_path_buf(),
        format,
        tracks: raw.tracks,
        attachments: raw.attachments,
    })
}

/// Run `mkvmerge -J` on a container and parse the result.
pub async fn identify(
    runner: &dyn ToolRunner,
    tools: &ToolRegistry,
    path: &Path,
) -> Result<ContainerInfo> {
    let mut cmd = tools.command("mkvmerge")?;
    cmd.arg("-J").arg(path.to_string_lossy().as_ref());

    let output = runner.run(&cmd).await?;
    let info = parse_identification(path, &output.stdout)?;

    tracing::debug!(
        "identified {:?}: {} tracks, {} subtitle, {} attachments",
        path,
        info.tracks.len(),
        info.subtitle_tracks().count(),
        info.attachments.len()
    );

    Ok(info)
}
