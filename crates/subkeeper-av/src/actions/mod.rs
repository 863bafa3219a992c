//! Container actions: subtitle extraction and subtitle track removal.

mod extract;
mod remux;

pub use extract::{extract_command, extract_tracks};
pub use remux::{remove_subtitle_tracks, remux_command};
