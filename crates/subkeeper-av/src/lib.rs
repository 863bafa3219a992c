//! # subkeeper-av
//!
//! Container inspection and subtitle track surgery for the subkeeper
//! pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find mkvmerge and mkvextract,
//!   honouring configured paths.
//! - **Command execution** ([`ToolCommand`], [`ToolRunner`]) -- async
//!   builder with timeout support, behind a trait so callers can record
//!   invocations instead of spawning processes.
//! - **Identification** ([`identify`]) -- typed model of `mkvmerge -J`
//!   output.
//! - **Classification** ([`TrackClassifier`]) -- decides which subtitle
//!   tracks to extract and which to drop.
//! - **Editing** ([`ContainerEditor`]) -- extraction with mkvextract and
//!   remuxing through a sibling temp file ([`Workspace`]).

pub mod actions;
pub mod classify;
pub mod command;
pub mod editor;
pub mod identify;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use classify::{
    Classification, ExtractTarget, RemoveReason, TrackClassifier, TrackDisposition,
};
pub use command::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use editor::{ContainerEditor, RemuxOutcome};
pub use identify::{Attachment, ContainerInfo, ContainerTrack, SubtitleTrack};
pub use tools::{ToolInfo, ToolRegistry, ToolsConfig};
pub use workspace::Workspace;
