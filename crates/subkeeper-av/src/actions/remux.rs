//! Drop subtitle tracks from a container using mkvmerge.

use std::path::Path;

use subkeeper_common::Result;

use crate::command::{ToolCommand, ToolRunner};
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// mkvmerge exits with 1 when it finished with warnings.
const MKVMERGE_WARNING_EXIT: i32 = 1;

/// Build `mkvmerge -o <output> --subtitle-tracks !<id>,<id> <input>`.
pub fn remux_command(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    remove_ids: &[u64],
) -> Result<ToolCommand> {
    let exclude = format!(
        "!{}",
        remove_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    );

    let mut cmd = tools.command("mkvmerge")?;
    cmd.accept_exit_codes([MKVMERGE_WARNING_EXIT]);
    cmd.arg("-o");
    cmd.arg(output.to_string_lossy().as_ref());
    cmd.args(["--subtitle-tracks", exclude.as_str()]);
    cmd.arg(input.to_string_lossy().as_ref());
    Ok(cmd)
}

/// Rewrite the workspace input without the given subtitle tracks.
///
/// The result lands in the workspace output; the caller finalizes.
pub async fn remove_subtitle_tracks(
    runner: &dyn ToolRunner,
    workspace: &Workspace,
    tools: &ToolRegistry,
    remove_ids: &[u64],
) -> Result<()> {
    let cmd = remux_command(tools, workspace.input(), workspace.output(), remove_ids)?;
    tracing::info!(
        "remove subtitle tracks {:?} from {:?}",
        remove_ids,
        workspace.input()
    );
    runner.run(&cmd).await?;

    Ok(())
}
