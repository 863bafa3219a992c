mod types;

pub use types::*;

use anyhow::{Context, Result};
use regex::RegexBuilder;
use std::path::Path;
use subkeeper_common::LanguageCodeMap;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let config = read_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a config file without validating it.
pub fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./subkeeper.toml",
        "~/.config/subkeeper/config.toml",
        "/etc/subkeeper/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Problems found by [`validate`].
#[derive(Debug, Default)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a configuration without failing on the first problem.
pub fn validate(config: &Config) -> Validation {
    let mut report = Validation::default();

    for lang in &config.subtitles.languages {
        let lang = lang.trim();
        if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
            report
                .errors
                .push(format!("Wanted language '{lang}' is not a 2-letter code"));
        }
    }

    for pattern in &config.subtitles.remove_track_patterns {
        if let Err(e) = RegexBuilder::new(pattern).case_insensitive(true).build() {
            report
                .errors
                .push(format!("Invalid track name pattern '{pattern}': {e}"));
        }
    }

    match config.language_map() {
        Ok(map) => {
            for lang in config.wanted_languages() {
                if map.three_letter_codes_for(&lang).next().is_none() {
                    report.warnings.push(format!(
                        "No 3-letter code maps to wanted language '{lang}'; \
                         embedded tracks in it will not be extracted"
                    ));
                }
            }
        }
        Err(e) => report.errors.push(e.to_string()),
    }

    let os = &config.opensubtitles;
    if config.subtitles.download && os.has_credentials() && !os.is_complete() {
        report.errors.push(
            "OpenSubtitles needs api_key, username and password together".to_string(),
        );
    }
    if config.subtitles.download && !os.has_credentials() {
        report
            .warnings
            .push("No OpenSubtitles credentials; downloads are disabled".to_string());
    }
    if os.requests_per_second == 0 {
        report
            .errors
            .push("opensubtitles.requests_per_second cannot be 0".to_string());
    }

    for arr in &config.arrs {
        if arr.enabled && arr.api_key.is_empty() {
            report
                .errors
                .push(format!("Arr '{}' is enabled but has no API key", arr.name));
        }
        if arr.poll_interval_secs == 0 {
            report
                .errors
                .push(format!("Arr '{}' has a poll interval of 0", arr.name));
        }
    }

    report
}

/// Validate configuration, failing on hard errors and logging warnings.
fn validate_config(config: &Config) -> Result<()> {
    let report = validate(config);

    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }

    if let Some(first) = report.errors.first() {
        if report.errors.len() > 1 {
            anyhow::bail!("{} (and {} more)", first, report.errors.len() - 1);
        }
        anyhow::bail!("{}", first);
    }

    Ok(())
}

impl Config {
    /// Wanted languages, lower-cased and deduplicated, in configured order.
    pub fn wanted_languages(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for lang in &self.subtitles.languages {
            let lang = lang.trim().to_ascii_lowercase();
            if !lang.is_empty() && !seen.contains(&lang) {
                seen.push(lang);
            }
        }
        seen
    }

    /// The built-in language table with the configured overrides applied.
    pub fn language_map(&self) -> Result<LanguageCodeMap> {
        let overrides = LanguageCodeMap::from_pairs(&self.language_codes)
            .context("Invalid [language_codes] entry")?;
        Ok(LanguageCodeMap::builtin().merged_with(&overrides))
    }

    /// The arr with the given name, if configured and enabled.
    pub fn arr(&self, name: &str) -> Option<&ArrConfig> {
        self.arrs
            .iter()
            .find(|a| a.enabled && a.name.eq_ignore_ascii_case(name))
    }
}
