use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use subkeeper_av::ToolsConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub subtitles: SubtitlesConfig,

    /// 3-letter -> 2-letter overrides, merged over the built-in table.
    #[serde(default)]
    pub language_codes: BTreeMap<String, String>,

    #[serde(default)]
    pub opensubtitles: OpenSubtitlesConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub arrs: Vec<ArrConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubtitlesConfig {
    /// Wanted 2-letter language codes.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Regexes matched case-insensitively against subtitle track names;
    /// a match removes the track.
    #[serde(default)]
    pub remove_track_patterns: Vec<String>,

    /// Fetch missing languages from OpenSubtitles.
    #[serde(default = "default_true")]
    pub download: bool,

    /// Extract and strip embedded subtitle tracks.
    #[serde(default = "default_true")]
    pub extract: bool,
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for SubtitlesConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            remove_track_patterns: Vec::new(),
            download: true,
            extract: true,
        }
    }
}

/// Filter value for the OpenSubtitles boolean-ish search parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchFilter {
    Include,
    #[default]
    Exclude,
    Only,
}

impl SearchFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFilter::Include => "include",
            SearchFilter::Exclude => "exclude",
            SearchFilter::Only => "only",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenSubtitlesConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Directory for the token cache; the platform cache dir when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub hearing_impaired: SearchFilter,

    #[serde(default)]
    pub foreign_parts_only: SearchFilter,

    #[serde(default)]
    pub machine_translated: SearchFilter,

    #[serde(default)]
    pub ai_translated: SearchFilter,

    /// Client-side request pacing.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_base_url() -> String {
    "https://api.opensubtitles.com/api/v1".to_string()
}

fn default_user_agent() -> String {
    format!("subkeeper v{}", env!("CARGO_PKG_VERSION"))
}

fn default_requests_per_second() -> u32 {
    5
}

impl Default for OpenSubtitlesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            username: String::new(),
            password: String::new(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            cache_dir: None,
            hearing_impaired: SearchFilter::default(),
            foreign_parts_only: SearchFilter::default(),
            machine_translated: SearchFilter::default(),
            ai_translated: SearchFilter::default(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl OpenSubtitlesConfig {
    /// Whether any credential is filled in.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() || !self.username.is_empty() || !self.password.is_empty()
    }

    /// Whether all credentials are filled in.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArrConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub arr_type: ArrType,

    pub url: String,

    pub api_key: String,

    #[serde(default)]
    pub enabled: bool,

    /// Give up waiting for the import command after this long.
    #[serde(default = "default_import_timeout")]
    pub import_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_import_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ArrType {
    Radarr,
    Sonarr,
}
