//! Downstream media manager imports (Radarr, Sonarr).

mod client;
pub mod types;

pub use client::{create_client, ImportClient, RadarrClient, SonarrClient};
pub use types::{CommandStatus, ImportOutcome};
