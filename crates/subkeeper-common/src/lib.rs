//! Subkeeper-Common: Shared types and utilities.
//!
//! This crate provides common functionality used across subkeeper:
//!
//! - **Error Handling**: The unified [`Error`] type and [`Result`] alias
//! - **Path Utilities**: Video/subtitle detection and `<basename>.<code>.srt`
//!   naming
//! - **Language Codes**: The 3-letter to 2-letter [`LanguageCodeMap`]
//!
//! # Examples
//!
//! ```
//! use subkeeper_common::paths::{is_video_file, subtitle_path};
//! use std::path::Path;
//!
//! assert!(is_video_file(Path::new("movie.mkv")));
//! assert_eq!(
//!     subtitle_path(Path::new("/media/Movie.mkv"), "en"),
//!     Path::new("/media/Movie.en.srt")
//! );
//! ```

pub mod error;
pub mod language;
pub mod paths;

pub use error::{Error, Result};
pub use language::LanguageCodeMap;
pub use paths::Presence;
