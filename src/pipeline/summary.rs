use std::fmt;

use crate::arr::ImportOutcome;
use crate::normalize::NormalizeReport;
use crate::opensubtitles::DownloadAggregate;

/// Outcome of the downstream import requested for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub arr: String,
    pub outcome: Result<ImportOutcome, String>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.outcome.as_ref().is_ok_and(ImportOutcome::is_success)
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub videos_seen: usize,
    /// Videos whose container metadata could not be read.
    pub videos_skipped: usize,
    pub tracks_extracted: usize,
    pub tracks_removed: usize,
    /// Extract targets dropped because the file already existed.
    pub extract_already_present: usize,
    pub extraction_failures: usize,
    pub remux_failures: usize,
    pub normalize: NormalizeReport,
    pub downloads: DownloadAggregate,
    /// Credentials were rejected; retrieval was stopped for the run.
    pub auth_failed: bool,
    pub import: Option<ImportReport>,
}

impl RunSummary {
    /// Whether the run should end with a failing exit status.
    pub fn is_fatal(&self) -> bool {
        self.auth_failed
    }

    pub(crate) fn add_normalize(&mut self, report: &NormalizeReport) {
        self.normalize.merge(report);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Videos: {} seen, {} skipped",
            self.videos_seen, self.videos_skipped
        )?;
        writeln!(
            f,
            "Tracks: {} extracted, {} removed, {} already on disk",
            self.tracks_extracted, self.tracks_removed, self.extract_already_present
        )?;
        writeln!(
            f,
            "Failures: {} extraction, {} remux",
            self.extraction_failures, self.remux_failures
        )?;
        writeln!(
            f,
            "Renamed: {} ({} collisions, {} unknown codes)",
            self.normalize.renamed, self.normalize.collisions, self.normalize.unknown_codes
        )?;
        write!(f, "Downloads: {}", self.downloads)?;
        if self.auth_failed {
            write!(f, "\nOpenSubtitles authentication failed")?;
        }
        if let Some(import) = &self.import {
            match &import.outcome {
                Ok(outcome) => write!(f, "\nImport ({}): {:?}", import.arr, outcome)?,
                Err(e) => write!(f, "\nImport ({}): error: {}", import.arr, e)?,
            }
        }
        Ok(())
    }
}
