use crate::arr::types::{CommandResource, CommandStatus, ImportOutcome, ScanCommand};
use crate::config::{ArrConfig, ArrType};
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};

/// Connection timeout for Arr API requests
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// How the arr should treat the files it imports.
const IMPORT_MODE: &str = "Move";

/// Hands a finished download over to a media manager.
#[async_trait::async_trait]
pub trait ImportClient: Send + Sync {
    /// Configured name of the instance.
    fn name(&self) -> &str;

    /// Test the connection to the *arr instance
    async fn test_connection(&self) -> Result<bool>;

    /// Start an import of `path` and wait until it finishes or times out.
    async fn import(&self, path: &Path) -> Result<ImportOutcome>;
}

/// Create an appropriate client based on config
pub fn create_client(config: &ArrConfig) -> Box<dyn ImportClient> {
    match config.arr_type {
        ArrType::Radarr => Box::new(RadarrClient::new(config)),
        ArrType::Sonarr => Box::new(SonarrClient::new(config)),
    }
}

struct BaseArrClient {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    import_timeout: Duration,
}

impl BaseArrClient {
    fn new(config: &ArrConfig) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            name: config.name.clone(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            import_timeout: Duration::from_secs(config.import_timeout_secs),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .context(format!("Failed to GET {}", path))
    }

    async fn post_command(&self, command: &ScanCommand<'_>) -> Result<CommandResource> {
        let context_msg = format!("Failed to start {} on {}", command.name, self.name);
        let response = self
            .client
            .post(self.url("/command"))
            .header("X-Api-Key", &self.api_key)
            .json(command)
            .send()
            .await
            .context(context_msg.clone())?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            anyhow::bail!("{}: {}", context_msg, error);
        }
        response.json().await.context(context_msg)
    }

    async fn command_status(&self, id: i64) -> Result<CommandResource> {
        let response = self.get(&format!("/command/{id}")).await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "{} returned {} for command {}",
                self.name,
                response.status(),
                id
            );
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid command status from {}", self.name))
    }

    /// Submit the scan command and poll it to a terminal state.
    async fn scan(&self, command_name: &'static str, path: &Path) -> Result<ImportOutcome> {
        let path_str = path.to_string_lossy();
        let command = ScanCommand {
            name: command_name,
            path: &path_str,
            import_mode: IMPORT_MODE,
        };

        let submitted = self.post_command(&command).await?;
        tracing::info!(
            "{}: {} queued as command {} for {:?}",
            self.name,
            command_name,
            submitted.id,
            path
        );

        let started = Instant::now();
        let mut current = submitted;
        loop {
            if current.status.is_terminal() {
                return Ok(outcome_of(current));
            }
            if started.elapsed() >= self.import_timeout {
                tracing::warn!(
                    "{}: command {} still {:?} after {:?}",
                    self.name,
                    current.id,
                    current.status,
                    self.import_timeout
                );
                return Ok(ImportOutcome::TimedOut);
            }
            tokio::time::sleep(self.poll_interval).await;
            current = self.command_status(current.id).await?;
        }
    }
}

fn outcome_of(command: CommandResource) -> ImportOutcome {
    match command.status {
        CommandStatus::Completed => ImportOutcome::Completed,
        status => ImportOutcome::Failed {
            status,
            message: command.message,
        },
    }
}

pub struct RadarrClient(BaseArrClient);

impl RadarrClient {
    pub fn new(config: &ArrConfig) -> Self {
        Self(BaseArrClient::new(config))
    }
}

#[async_trait::async_trait]
impl ImportClient for RadarrClient {
    fn name(&self) -> &str {
        &self.0.name
    }

    async fn test_connection(&self) -> Result<bool> {
        let response = self.0.get("/system/status").await?;
        Ok(response.status().is_success())
    }

    async fn import(&self, path: &Path) -> Result<ImportOutcome> {
        self.0.scan("DownloadedMoviesScan", path).await
    }
}

pub struct SonarrClient(BaseArrClient);

impl SonarrClient {
    pub fn new(config: &ArrConfig) -> Self {
        Self(BaseArrClient::new(config))
    }
}

#[async_trait::async_trait]
impl ImportClient for SonarrClient {
    fn name(&self) -> &str {
        &self.0.name
    }

    async fn test_connection(&self) -> Result<bool> {
        let response = self.0.get("/system/status").await?;
        Ok(response.status().is_success())
    }

    async fn import(&self, path: &Path) -> Result<ImportOutcome> {
        self.0.scan("DownloadedEpisodesScan", path).await
    }
}
