//! OpenSubtitles REST client.
//!
//! Features:
//! - Session token reused from the on-disk [`TokenStore`] while unexpired.
//! - Token-bucket request pacing via [`governor`].
//! - 429 retries driven by `Retry-After` / `RateLimit-Reset` (see [`RetryPolicy`]).
//! - One re-login when the server rejects the token mid-run.
//! - Logout only for sessions this run logged in itself.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::retry::{RateLimitHint, RetryPolicy};
use super::token::{CachedToken, TokenStore};
use super::types::{
    DownloadGrant, DownloadRequest, LoginRequest, LoginResponse, SearchQuery, SearchResponse,
    SubtitleRecord,
};
use crate::config::{OpenSubtitlesConfig, SearchFilter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the current session was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Reused from the token cache.
    Cached,
    /// Logged in during this run.
    Fresh,
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    state: AuthState,
}

#[derive(Debug, Clone, Copy)]
struct SearchFilters {
    ai_translated: SearchFilter,
    foreign_parts_only: SearchFilter,
    hearing_impaired: SearchFilter,
    machine_translated: SearchFilter,
}

/// Stateful client for one run.
///
/// # Examples
///
/// ```no_run
/// use subkeeper::config::OpenSubtitlesConfig;
/// use subkeeper::opensubtitles::OpenSubtitlesClient;
///
/// # use subkeeper::opensubtitles::ApiError;
/// # async fn example(config: OpenSubtitlesConfig) -> Result<(), ApiError> {
/// let mut client = OpenSubtitlesClient::new(&config)?;
/// client.authenticate().await?;
/// client.logout().await?;
/// # Ok(())
/// # }
/// ```
pub struct OpenSubtitlesClient {
    http: Client,
    base_url: String,
    api_key: String,
    username: String,
    password: String,
    filters: SearchFilters,
    store: TokenStore,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    login_policy: RetryPolicy,
    request_policy: RetryPolicy,
    session: Option<Session>,
    remaining_quota: Option<i64>,
    quota_exhausted: bool,
}

impl fmt::Debug for OpenSubtitlesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSubtitlesClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("session", &self.session.as_ref().map(|s| s.state))
            .field("remaining_quota", &self.remaining_quota)
            .field("quota_exhausted", &self.quota_exhausted)
            .finish_non_exhaustive()
    }
}

impl OpenSubtitlesClient {
    pub fn new(config: &OpenSubtitlesConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        let cache_dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(TokenStore::default_cache_dir);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            filters: SearchFilters {
                ai_translated: config.ai_translated,
                foreign_parts_only: config.foreign_parts_only,
                hearing_impaired: config.hearing_impaired,
                machine_translated: config.machine_translated,
            },
            store: TokenStore::new(&cache_dir, &config.username, &config.api_key),
            rate_limiter,
            login_policy: RetryPolicy::login(),
            request_policy: RetryPolicy::request(),
            session: None,
            remaining_quota: None,
            quota_exhausted: false,
        })
    }

    /// Replace the retry policies.
    pub fn with_retry_policies(mut self, login: RetryPolicy, request: RetryPolicy) -> Self {
        self.login_policy = login;
        self.request_policy = request;
        self
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Remaining downloads as last reported by the server.
    pub fn remaining_quota(&self) -> Option<i64> {
        self.remaining_quota
    }

    /// Whether the download quota ran out during this run.
    pub fn quota_exhausted(&self) -> bool {
        self.quota_exhausted
    }

    /// How the current session was obtained, if there is one.
    pub fn auth_state(&self) -> Option<AuthState> {
        self.session.as_ref().map(|s| s.state)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<String, ApiError> {
        self.session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(ApiError::Unauthorized { status: 401 })
    }

    /// Use the cached token if it is still valid, otherwise log in.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] when the credentials are rejected; this is
    /// not retried. Rate limits are retried per the login policy.
    pub async fn authenticate(&mut self) -> Result<AuthState, ApiError> {
        if let Some(session) = &self.session {
            return Ok(session.state);
        }

        if let Some(cached) = self.store.load(&self.username) {
            info!("Using cached OpenSubtitles token (expires {})", cached.expires_at);
            self.session = Some(Session {
                token: cached.token,
                state: AuthState::Cached,
            });
            return Ok(AuthState::Cached);
        }

        self.login().await
    }

    async fn login(&mut self) -> Result<AuthState, ApiError> {
        let policy = self.login_policy;
        let token = match policy.run("login", || self.login_once()).await {
            Ok(token) => token,
            Err(e) => {
                if e.is_unauthorized() {
                    self.store.clear();
                }
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&CachedToken::issued_now(&self.username, &token)) {
            warn!("Could not cache OpenSubtitles token: {}", e);
        }

        info!("Logged in to OpenSubtitles as {}", self.username);
        self.session = Some(Session {
            token,
            state: AuthState::Fresh,
        });
        Ok(AuthState::Fresh)
    }

    async fn login_once(&self) -> Result<String, ApiError> {
        let request = self
            .http
            .post(self.url("/login"))
            .header("Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            });

        let response: LoginResponse = decode(self.send(request).await?).await?;
        if let Some(user) = &response.user {
            debug!(
                "OpenSubtitles account level {:?}, {:?} downloads allowed",
                user.level, user.allowed_downloads
            );
        }
        Ok(response.token)
    }

    /// Drop the current token and log in again.
    async fn reauthenticate(&mut self) -> Result<AuthState, ApiError> {
        warn!("OpenSubtitles rejected the session token, logging in again");
        self.session = None;
        self.store.clear();
        self.login().await
    }

    /// Search for subtitles. Re-authenticates once if the token is rejected.
    pub async fn search(&mut self, query: &SearchQuery) -> Result<Vec<SubtitleRecord>, ApiError> {
        self.authenticate().await?;
        let policy = self.request_policy;

        let token = self.token()?;
        let result = policy.run("search", || self.search_once(&token, query)).await;
        let response = match result {
            Err(e) if e.is_unauthorized() => {
                self.reauthenticate().await?;
                let token = self.token()?;
                policy.run("search", || self.search_once(&token, query)).await?
            }
            other => other?,
        };

        debug!(
            "Search '{}' [{}] returned {} of {} result(s)",
            query.query,
            query.languages.join(","),
            response.data.len(),
            response.total_count
        );
        Ok(response.data)
    }

    async fn search_once(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<SearchResponse, ApiError> {
        let request = self
            .http
            .get(self.url("/subtitles"))
            .header("Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .bearer_auth(token)
            .query(&self.search_params(query));

        decode(self.send(request).await?).await
    }

    /// Query parameters in alphabetical order.
    fn search_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ai_translated", self.filters.ai_translated.as_str().to_string()),
            ("foreign_parts_only", self.filters.foreign_parts_only.as_str().to_string()),
            ("hearing_impaired", self.filters.hearing_impaired.as_str().to_string()),
            ("languages", query.languages.join(",")),
            ("machine_translated", self.filters.machine_translated.as_str().to_string()),
        ];
        if let Some(hash) = &query.moviehash {
            params.push(("moviehash", hash.clone()));
        }
        params.push(("query", query.query.clone()));
        params.push(("type", query.kind.as_str().to_string()));
        params
    }

    /// Request a download link for `file_id`.
    ///
    /// A rejected token triggers one re-login and one more attempt. A 406 or
    /// a negative remaining count marks the quota as exhausted.
    pub async fn download(&mut self, file_id: u64) -> Result<DownloadGrant, ApiError> {
        if self.quota_exhausted {
            return Err(ApiError::QuotaExhausted);
        }
        self.authenticate().await?;
        let policy = self.request_policy;

        let token = self.token()?;
        let result = policy.run("download", || self.download_once(&token, file_id)).await;
        let result = match result {
            Err(e) if e.is_unauthorized() => {
                self.reauthenticate().await?;
                let token = self.token()?;
                policy.run("download", || self.download_once(&token, file_id)).await
            }
            other => other,
        };

        match result {
            Ok(grant) => {
                self.remaining_quota = Some(grant.remaining);
                if grant.remaining < 0 {
                    warn!("OpenSubtitles download quota exhausted (remaining {})", grant.remaining);
                    self.quota_exhausted = true;
                }
                debug!("Download granted, {} remaining", grant.remaining);
                Ok(grant)
            }
            Err(ApiError::QuotaExhausted) => {
                warn!("OpenSubtitles download quota exhausted");
                self.quota_exhausted = true;
                Err(ApiError::QuotaExhausted)
            }
            Err(e) => Err(e),
        }
    }

    async fn download_once(&self, token: &str, file_id: u64) -> Result<DownloadGrant, ApiError> {
        let request = self
            .http
            .post(self.url("/download"))
            .header("Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .bearer_auth(token)
            .json(&DownloadRequest { file_id });

        decode(self.send(request).await?).await
    }

    /// Fetch the subtitle bytes behind a download link.
    pub async fn fetch_link(&self, link: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.send(self.http.get(link)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// End the session if this run created it.
    ///
    /// Returns `true` if a logout was sent. A reused cached token is kept
    /// for later runs.
    pub async fn logout(&mut self) -> Result<bool, ApiError> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        if session.state == AuthState::Cached {
            debug!("Keeping cached OpenSubtitles token");
            return Ok(false);
        }

        let request = self
            .http
            .delete(self.url("/logout"))
            .header("Api-Key", &self.api_key)
            .bearer_auth(&session.token);
        let result = self.send(request).await;

        self.session = None;
        self.store.clear();
        result?;
        info!("Logged out of OpenSubtitles");
        Ok(true)
    }

    /// Pace, send and map the status code to an [`ApiError`].
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        self.rate_limiter.until_ready().await;
        let response = request.send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized {
            status: status.as_u16(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited {
            hint: RateLimitHint::from_headers(response.headers()),
        }),
        StatusCode::NOT_ACCEPTABLE => Err(ApiError::QuotaExhausted),
        _ => Err(ApiError::Http {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
