//! On-disk cache of the catalogue session token.
//!
//! One JSON file per (username, API key) pair. The file name carries a
//! digest of the pair; neither the API key nor the password is written.
//! Writes go through a temp file and a rename, so a reader never sees a
//! half-written token. An unreadable file is treated as "no token".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::error::ApiError;

/// How long a fresh token is trusted. The server keeps it for 24 hours.
pub fn token_lifetime() -> Duration {
    Duration::hours(20)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// A token obtained now.
    pub fn issued_now(username: &str, token: &str) -> Self {
        Self {
            username: username.to_string(),
            token: token.to_string(),
            expires_at: Utc::now() + token_lifetime(),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Handle on the cache file for one account.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(cache_dir: &Path, username: &str, api_key: &str) -> Self {
        Self {
            path: cache_dir.join(format!(
                "opensubtitles-{}.json",
                account_digest(username, api_key)
            )),
        }
    }

    /// The platform cache directory for subkeeper, e.g. `~/.cache/subkeeper`.
    pub fn default_cache_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "subkeeper")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("subkeeper"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached token for `username`, if present, readable and unexpired.
    pub fn load(&self, username: &str) -> Option<CachedToken> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read token cache {:?}: {}", self.path, e);
                return None;
            }
        };

        let token: CachedToken = match serde_json::from_str(&content) {
            Ok(t) => t,
            Err(e) => {
                warn!("Ignoring corrupt token cache {:?}: {}", self.path, e);
                return None;
            }
        };

        if token.username != username {
            debug!("Token cache belongs to another user");
            return None;
        }
        if !token.is_valid_at(Utc::now()) {
            debug!("Cached token expired at {}", token.expires_at);
            return None;
        }
        Some(token)
    }

    /// Write the token atomically.
    pub fn save(&self, token: &CachedToken) -> Result<(), ApiError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| ApiError::TokenCache("cache path has no parent".into()))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| ApiError::TokenCache(format!("cannot create {:?}: {e}", dir)))?;

        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| ApiError::TokenCache(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ApiError::TokenCache(format!("cannot create temp file: {e}")))?;
        std::io::Write::write_all(&mut temp, &json)
            .map_err(|e| ApiError::TokenCache(format!("cannot write token: {e}")))?;
        temp.persist(&self.path).map_err(|e| {
            ApiError::TokenCache(format!("cannot replace {:?}: {}", self.path, e.error))
        })?;

        debug!("Saved token cache {:?}", self.path);
        Ok(())
    }

    /// Delete the cache file. A missing file is not an error.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed token cache {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot remove token cache {:?}: {}", self.path, e),
        }
    }
}

/// Short hex digest identifying an account without revealing the key.
fn account_digest(username: &str, api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(api_key.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
