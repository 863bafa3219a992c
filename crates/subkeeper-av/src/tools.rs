//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the mkvtoolnix
//! binaries and provides lookup methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use subkeeper_common::{Error, Result};

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["mkvmerge", "mkvextract"];

/// Paths and limits for the external tools, as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub mkvmerge_path: Option<PathBuf>,
    pub mkvextract_path: Option<PathBuf>,
    /// Maximum execution time of a single tool invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mkvmerge_path: None,
            mkvextract_path: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `--version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, a configured path is used if it exists;
    /// otherwise [`which::which`] is used to locate the tool in `PATH`.
    /// Tools that are not found are omitted from the registry.
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "mkvmerge" => config.mkvmerge_path.as_deref(),
                "mkvextract" => config.mkvextract_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "configured path for {name} does not exist: {}; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tools.insert(name.to_string(), path);
            }
        }

        Self {
            tools,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Build a registry from explicit paths without touching the filesystem.
    pub fn with_paths<'a>(paths: impl IntoIterator<Item = (&'a str, PathBuf)>) -> Self {
        Self {
            tools: paths
                .into_iter()
                .map(|(name, path)| (name.to_string(), path))
                .collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Path of the given tool, or [`Error::NotFound`] if it was not
    /// discovered.
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                Error::not_found("tool", format!("{name} (is it installed and in PATH?)"))
            })
    }

    /// Start a [`ToolCommand`] for the given tool with the configured timeout.
    pub fn command(&self, name: &str) -> Result<ToolCommand> {
        let mut cmd = ToolCommand::new(self.require(name)?.to_path_buf());
        cmd.timeout(self.timeout);
        Ok(cmd)
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> --version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("--version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // We cannot guarantee mkvtoolnix is installed in CI,
        // but the call itself must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::empty();
        let err = registry.require("mkvmerge").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(err.to_string().contains("mkvmerge"));
    }

    #[test]
    fn check_all_returns_known_tools() {
        let registry = ToolRegistry::empty();
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["mkvmerge", "mkvextract"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn command_uses_registered_path() {
        let registry = ToolRegistry::with_paths([("mkvmerge", PathBuf::from("/opt/mkv/mkvmerge"))]);
        let cmd = registry.command("mkvmerge").unwrap();
        assert_eq!(cmd.program(), Path::new("/opt/mkv/mkvmerge"));
    }

    #[test]
    fn tools_config_defaults_from_empty_object() {
        let cfg: ToolsConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.mkvmerge_path.is_none());
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT.as_secs());
    }
}
