//! Extract subtitle tracks to sidecar files using mkvextract.

use std::path::Path;

use subkeeper_common::Result;

use crate::classify::ExtractTarget;
use crate::command::{ToolCommand, ToolRunner};
use crate::tools::ToolRegistry;

/// Build `mkvextract <file> tracks <id>:<path> ...`.
pub fn extract_command(
    tools: &ToolRegistry,
    input: &Path,
    targets: &[ExtractTarget],
) -> Result<ToolCommand> {
    let mut cmd = tools.command("mkvextract")?;
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.arg("tracks");
    cmd.args(
        targets
            .iter()
            .map(|t| format!("{}:{}", t.track_id, t.output.to_string_lossy())),
    );
    Ok(cmd)
}

/// Extract all `targets` from `input` in a single mkvextract invocation.
///
/// Any non-zero exit is a failure; nothing is deleted or renamed here, so a
/// partial run leaves whatever mkvextract managed to write.
pub async fn extract_tracks(
    runner: &dyn ToolRunner,
    tools: &ToolRegistry,
    input: &Path,
    targets: &[ExtractTarget],
) -> Result<()> {
    if targets.is_empty() {
        return Ok(());
    }

    let cmd = extract_command(tools, input, targets)?;
    tracing::info!(
        "extract {} subtitle track(s) from {:?}",
        targets.len(),
        input
    );
    runner.run(&cmd).await?;

    Ok(())
}
