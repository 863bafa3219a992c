//! Container editor: applies a [`Classification`] to a container.

use std::path::Path;
use std::sync::Arc;

use subkeeper_common::Result;

use crate::actions;
use crate::classify::ExtractTarget;
use crate::command::{SystemRunner, ToolRunner};
use crate::identify::{self, ContainerInfo};
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// Result of [`ContainerEditor::remux`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemuxOutcome {
    /// Nothing to remove; the container was not touched.
    Skipped,
    /// The container was rewritten without these tracks.
    Remuxed { removed: Vec<u64> },
}

/// Identifies, extracts from and remuxes containers with mkvtoolnix.
#[derive(Clone)]
pub struct ContainerEditor {
    tools: ToolRegistry,
    runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for ContainerEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerEditor")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl ContainerEditor {
    pub fn new(tools: ToolRegistry, runner: Arc<dyn ToolRunner>) -> Self {
        Self { tools, runner }
    }

    /// Editor that spawns real processes.
    pub fn system(tools: ToolRegistry) -> Self {
        Self::new(tools, Arc::new(SystemRunner))
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Query container metadata.
    pub async fn identify(&self, path: &Path) -> Result<ContainerInfo> {
        identify::identify(self.runner.as_ref(), &self.tools, path).await
    }

    /// Pull the given tracks out to their target files in one invocation.
    /// An empty list is a no-op.
    pub async fn extract(&self, path: &Path, targets: &[ExtractTarget]) -> Result<()> {
        actions::extract_tracks(self.runner.as_ref(), &self.tools, path, targets).await
    }

    /// Rewrite the container without `remove_ids`.
    ///
    /// With nothing to remove this returns [`RemuxOutcome::Skipped`] without
    /// creating a temp file or invoking mkvmerge. Otherwise mkvmerge writes a
    /// sibling temp file which replaces the original only on success.
    pub async fn remux(&self, path: &Path, remove_ids: &[u64]) -> Result<RemuxOutcome> {
        if remove_ids.is_empty() {
            tracing::debug!("no subtitle tracks to remove from {:?}", path);
            return Ok(RemuxOutcome::Skipped);
        }

        let workspace = Workspace::new(path)?;
        actions::remove_subtitle_tracks(self.runner.as_ref(), &workspace, &self.tools, remove_ids)
            .await?;
        workspace.finalize()?;

        Ok(RemuxOutcome::Remuxed {
            removed: remove_ids.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ToolCommand, ToolOutput};
    use async_trait::async_trait;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records every command; for `mkvmerge -o <path>` writes `payload` to
    /// the output path to stand in for the real tool.
    struct RecordingRunner {
        calls: Mutex<Vec<ToolCommand>>,
        exit_code: i32,
        payload: &'static [u8],
    }

    impl RecordingRunner {
        fn new(exit_code: i32) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                exit_code,
                payload: b"remuxed",
            })
        }

        fn calls(&self) -> Vec<ToolCommand> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolRunner for RecordingRunner {
        async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(command.clone());
            let args = command.get_args();
            if let Some(pos) = args.iter().position(|a| a == "-o") {
                fs::write(&args[pos + 1], self.payload).unwrap();
            }
            command.check(ToolOutput {
                code: Some(self.exit_code),
                stdout: String::new(),
                stderr: "boom".into(),
            })
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::with_paths([
            ("mkvmerge", PathBuf::from("/usr/bin/mkvmerge")),
            ("mkvextract", PathBuf::from("/usr/bin/mkvextract")),
        ])
    }

    fn container(dir: &Path) -> PathBuf {
        let path = dir.join("Movie.mkv");
        fs::write(&path, b"original").unwrap();
        path
    }

    #[tokio::test]
    async fn remux_with_nothing_to_remove_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = container(dir.path());
        let runner = RecordingRunner::new(0);
        let editor = ContainerEditor::new(registry(), runner.clone());

        let outcome = editor.remux(&path, &[]).await.unwrap();

        assert_eq!(outcome, RemuxOutcome::Skipped);
        assert!(runner.calls().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn remux_replaces_original_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = container(dir.path());
        let runner = RecordingRunner::new(0);
        let editor = ContainerEditor::new(registry(), runner.clone());

        let outcome = editor.remux(&path, &[0, 3]).await.unwrap();

        assert_eq!(outcome, RemuxOutcome::Remuxed { removed: vec![0, 3] });
        assert_eq!(fs::read_to_string(&path).unwrap(), "remuxed");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let args = calls[0].get_args();
        assert_eq!(args[0], "-o");
        assert_ne!(PathBuf::from(&args[1]), path);
        assert_eq!(args[2..4], ["--subtitle-tracks", "!0,3"]);
        assert_eq!(PathBuf::from(&args[4]), path);
    }

    #[tokio::test]
    async fn remux_accepts_warning_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = container(dir.path());
        let editor = ContainerEditor::new(registry(), RecordingRunner::new(1));

        editor.remux(&path, &[2]).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "remuxed");
    }

    #[tokio::test]
    async fn failed_remux_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = container(dir.path());
        let editor = ContainerEditor::new(registry(), RecordingRunner::new(2));

        let err = editor.remux(&path, &[2]).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn extract_passes_all_targets_in_one_call() {
        let runner = RecordingRunner::new(0);
        let editor = ContainerEditor::new(registry(), runner.clone());
        let targets = vec![
            ExtractTarget {
                track_id: 0,
                language: "eng".into(),
                output: PathBuf::from("/m/Movie.eng.srt"),
            },
            ExtractTarget {
                track_id: 4,
                language: "eng".into(),
                output: PathBuf::from("/m/Movie.4.eng.srt"),
            },
        ];

        editor.extract(Path::new("/m/Movie.mkv"), &targets).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program_name(), "mkvextract");
        assert_eq!(
            calls[0].get_args(),
            [
                "/m/Movie.mkv",
                "tracks",
                "0:/m/Movie.eng.srt",
                "4:/m/Movie.4.eng.srt"
            ]
        );
    }

    #[tokio::test]
    async fn extract_with_no_targets_runs_nothing() {
        let runner = RecordingRunner::new(0);
        let editor = ContainerEditor::new(registry(), runner.clone());
        editor.extract(Path::new("/m/Movie.mkv"), &[]).await.unwrap();
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn extract_fails_on_any_nonzero_exit() {
        let editor = ContainerEditor::new(registry(), RecordingRunner::new(1));
        let targets = vec![ExtractTarget {
            track_id: 9,
            language: "eng".into(),
            output: PathBuf::from("/m/Movie.eng.srt"),
        }];
        assert!(editor.extract(Path::new("/m/Movie.mkv"), &targets).await.is_err());
    }

    #[tokio::test]
    async fn missing_tool_is_not_found() {
        let editor = ContainerEditor::new(ToolRegistry::empty(), RecordingRunner::new(0));
        let err = editor.identify(Path::new("/m/Movie.mkv")).await.unwrap_err();
        assert!(matches!(err, subkeeper_common::Error::NotFound { .. }));
    }
}
