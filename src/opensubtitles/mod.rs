//! Subtitle retrieval from the OpenSubtitles REST API.
//!
//! [`OpenSubtitlesClient`] keeps the session for one run: a cached or fresh
//! token, the request pacer and the download quota. [`OpenSubtitlesClient::fetch_missing`]
//! fills in the wanted languages that have no `.srt` next to a video yet.

mod client;
mod error;
mod fetch;
pub mod retry;
pub mod token;
pub mod types;

pub use client::{AuthState, OpenSubtitlesClient};
pub use error::ApiError;
pub use fetch::{
    best_for_language, build_query, media_kind, missing_languages, query_text, DownloadAggregate,
};
pub use retry::{RateLimitHint, RetryPolicy};
pub use token::{CachedToken, TokenStore};
