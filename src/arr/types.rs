use serde::{Deserialize, Serialize};

/// `POST /api/v3/command` body for the downloaded-file scan commands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCommand<'a> {
    pub name: &'static str,
    pub path: &'a str,
    pub import_mode: &'static str,
}

/// Command resource as returned by `/api/v3/command`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResource {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: CommandStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    #[default]
    Queued,
    Started,
    Completed,
    Failed,
    Aborted,
    Cancelled,
    Orphaned,
    #[serde(other)]
    Unknown,
}

impl CommandStatus {
    /// Whether the command has stopped running.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Completed
                | CommandStatus::Failed
                | CommandStatus::Aborted
                | CommandStatus::Cancelled
                | CommandStatus::Orphaned
        )
    }
}

/// Result of asking an arr to import a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Completed,
    Failed {
        status: CommandStatus,
        message: Option<String>,
    },
    TimedOut,
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ImportOutcome::Completed)
    }
}
