//! Sibling temp files for in-place container rewrites.
//!
//! A [`Workspace`] owns a temporary file next to the container being
//! rewritten. The remux tool writes there; [`Workspace::finalize`] renames
//! it over the original in one step. Dropping an unfinalized workspace
//! deletes the temp file and leaves the original untouched.

use std::path::{Path, PathBuf};

use subkeeper_common::paths::base_name;
use subkeeper_common::{Error, Result};
use tempfile::NamedTempFile;

/// Temp output for rewriting a single container.
///
/// # Example
///
/// ```no_run
/// use subkeeper_av::Workspace;
///
/// let workspace = Workspace::new(std::path::Path::new("/path/to/input.mkv")).unwrap();
/// // ... write the rewritten container to workspace.output() ...
/// workspace.finalize().unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp: NamedTempFile,
    input_path: PathBuf,
}

impl Workspace {
    /// Create the temp file in the same directory as `input`, so the final
    /// rename never crosses filesystems.
    pub fn new(input: &Path) -> Result<Self> {
        let dir = match input.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };

        let prefix = format!(".{}.", base_name(input));
        let suffix = input
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| Error::tool("workspace", format!("failed to create temp file: {e}")))?;

        Ok(Self {
            temp,
            input_path: input.to_path_buf(),
        })
    }

    /// The original container.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Where the rewritten container should be written.
    pub fn output(&self) -> &Path {
        self.temp.path()
    }

    /// Replace the original with the output.
    ///
    /// The original is only replaced by the rename itself; if the rename
    /// fails both files stay as they were and the temp file is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is empty (nothing was written) or if
    /// the rename fails.
    pub fn finalize(self) -> Result<PathBuf> {
        let written = std::fs::metadata(self.temp.path())?.len();
        if written == 0 {
            return Err(Error::tool(
                "workspace",
                format!("output file is empty: {}", self.temp.path().display()),
            ));
        }

        // Temp files are created 0600; keep the container's own mode.
        if let Ok(original) = std::fs::metadata(&self.input_path) {
            if let Err(e) = std::fs::set_permissions(self.temp.path(), original.permissions()) {
                tracing::warn!("could not copy permissions of {:?}: {}", self.input_path, e);
            }
        }

        self.temp.persist(&self.input_path).map_err(|e| {
            Error::tool(
                "workspace",
                format!("failed to replace {}: {}", self.input_path.display(), e.error),
            )
        })?;

        Ok(self.input_path)
    }
}
