//! Request and response bodies of the OpenSubtitles REST API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfo {
    #[serde(default)]
    pub allowed_downloads: Option<i64>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub data: Vec<SubtitleRecord>,
}

/// One search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleRecord {
    pub id: String,
    pub attributes: SubtitleAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtitleAttributes {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub moviehash_match: bool,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub files: Vec<SubtitleFileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleFileRef {
    pub file_id: u64,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl SubtitleRecord {
    /// Language of the record, lower-cased.
    pub fn language(&self) -> Option<String> {
        self.attributes
            .language
            .as_deref()
            .map(|l| l.trim().to_ascii_lowercase())
    }

    /// The first downloadable file.
    pub fn file_id(&self) -> Option<u64> {
        self.attributes.files.first().map(|f| f.file_id)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DownloadRequest {
    pub file_id: u64,
}

/// A granted download: the temporary link and the quota left afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadGrant {
    pub link: String,
    #[serde(default)]
    pub file_name: Option<String>,
    pub remaining: i64,
    #[serde(default)]
    pub reset_time: Option<String>,
}

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub kind: MediaKind,
    pub query: String,
    /// 2-letter codes, sorted.
    pub languages: Vec<String>,
    pub moviehash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Episode,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Episode => "episode",
        }
    }
}
