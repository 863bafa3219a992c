//! OpenSubtitles client behaviour against a mock server.

use std::fs;
use std::path::Path;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use subkeeper::config::OpenSubtitlesConfig;
use subkeeper::opensubtitles::{
    ApiError, AuthState, CachedToken, DownloadAggregate, OpenSubtitlesClient, RetryPolicy,
};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    cache: TempDir,
    media: TempDir,
}

impl Harness {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            cache: tempfile::tempdir().unwrap(),
            media: tempfile::tempdir().unwrap(),
        }
    }

    fn client(&self) -> OpenSubtitlesClient {
        let config = OpenSubtitlesConfig {
            api_key: "test-key".into(),
            username: "alice".into(),
            password: "secret".into(),
            base_url: format!("{}/api/v1", self.server.uri()),
            cache_dir: Some(self.cache.path().to_path_buf()),
            requests_per_second: 100,
            ..Default::default()
        };
        OpenSubtitlesClient::new(&config).unwrap().with_retry_policies(
            RetryPolicy::login().with_jitter(Duration::ZERO),
            RetryPolicy::request().with_jitter(Duration::ZERO),
        )
    }

    fn video(&self, name: &str) -> std::path::PathBuf {
        let video = self.media.path().join(name);
        fs::write(&video, vec![7u8; 200_000]).unwrap();
        video
    }

    fn file_link(&self, id: u64) -> String {
        format!("{}/files/{}.srt", self.server.uri(), id)
    }

    async fn mount_login(&self, token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/login"))
            .and(header("Api-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": token,
                "user": {"allowed_downloads": 100, "level": "Sub leecher"},
                "status": 200
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    async fn mount_file(&self, id: u64, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/files/{id}.srt")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }
}

fn seed_token(client: &OpenSubtitlesClient, token: &str, valid_for: chrono::Duration) {
    client
        .token_store()
        .save(&CachedToken {
            username: "alice".into(),
            token: token.into(),
            expires_at: Utc::now() + valid_for,
        })
        .unwrap();
}

fn record(id: u64, lang: &str, downloads: u64) -> serde_json::Value {
    json!({
        "id": id.to_string(),
        "type": "subtitle",
        "attributes": {
            "language": lang,
            "download_count": downloads,
            "moviehash_match": false,
            "files": [{"file_id": id, "cd_number": 1, "file_name": "sub.srt"}]
        }
    })
}

fn srt(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn cached_token_is_reused_without_network() {
    let h = Harness::new().await;
    let mut client = h.client();
    seed_token(&client, "cached-token", chrono::Duration::hours(2));

    assert_eq!(client.authenticate().await.unwrap(), AuthState::Cached);
    assert!(!client.logout().await.unwrap());

    assert!(h.server.received_requests().await.unwrap().is_empty());
    assert!(client.token_store().path().exists());
}

#[tokio::test]
async fn expired_cached_token_triggers_login() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let mut client = h.client();
    seed_token(&client, "old-token", chrono::Duration::minutes(-5));

    assert_eq!(client.authenticate().await.unwrap(), AuthState::Fresh);

    let cached = client.token_store().load("alice").unwrap();
    assert_eq!(cached.token, "fresh-token");
    assert!(cached.expires_at > Utc::now() + chrono::Duration::hours(19));
}

#[tokio::test]
async fn login_rate_limit_is_retried_then_succeeds() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&h.server)
        .await;
    h.mount_login("fresh-token", 1).await;

    let mut client = h.client();
    assert_eq!(client.authenticate().await.unwrap(), AuthState::Fresh);
}

#[tokio::test]
async fn login_rate_limit_gives_up_after_five_attempts() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(5)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    let err = client.authenticate().await.unwrap_err();
    assert_matches!(err, ApiError::RateLimited { .. });
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    let err = client.authenticate().await.unwrap_err();
    assert_matches!(err, ApiError::Unauthorized { status: 401 });
    assert!(!client.token_store().path().exists());
}

#[tokio::test]
async fn only_missing_languages_are_fetched() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Show.S01E01.mkv");
    fs::write(h.media.path().join("Show.S01E01.en.srt"), "existing").unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .and(query_param("languages", "nl"))
        .and(query_param("type", "episode"))
        .and(query_param("query", "Show S01E01"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "data": [record(77, "nl", 10), record(78, "nl", 500)]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(body_json(json!({"file_id": 78})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": h.file_link(78),
            "file_name": "sub.srt",
            "remaining": 99,
            "reset_time": "23 hours"
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    h.mount_file(78, "1\n00:00:01,000 --> 00:00:02,000\nHallo\n").await;

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into(), "nl".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.downloaded.get("nl"), Some(&1));
    assert_eq!(aggregate.already_present, 1);
    assert_eq!(aggregate.remaining_quota, Some(99));
    assert_eq!(srt(&h.media.path().join("Show.S01E01.en.srt")), "existing");
    assert!(srt(&h.media.path().join("Show.S01E01.nl.srt")).contains("Hallo"));
}

#[tokio::test]
async fn everything_present_means_no_requests() {
    let h = Harness::new().await;
    let video = h.video("Movie.mkv");
    fs::write(h.media.path().join("Movie.en.srt"), "1").unwrap();

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.already_present, 1);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_search_marks_languages_not_found() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.2020.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .and(query_param("languages", "en,nl"))
        .and(query_param("type", "movie"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total_count": 0, "data": []})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["nl".into(), "en".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.total_not_found(), 2);
    assert_eq!(aggregate.total_downloaded(), 0);
}

#[tokio::test]
async fn rejected_token_on_download_logs_in_again() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": h.file_link(5),
            "remaining": 10
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    seed_token(&client, "stale-token", chrono::Duration::hours(2));

    let grant = client.download(5).await.unwrap();
    assert_eq!(grant.remaining, 10);
    assert_eq!(client.auth_state(), Some(AuthState::Fresh));
    assert_eq!(client.token_store().load("alice").unwrap().token, "fresh-token");
}

#[tokio::test]
async fn download_rejected_after_login_fails_only_that_language() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "data": [record(1, "en", 5), record(2, "nl", 5)]
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(body_json(json!({"file_id": 1})))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(body_json(json!({"file_id": 2})))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": h.file_link(2),
            "remaining": 8
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    h.mount_file(2, "1\n00:00:01,000 --> 00:00:02,000\nHoi\n").await;

    let mut client = h.client();
    seed_token(&client, "stale-token", chrono::Duration::hours(2));
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into(), "nl".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.failed, 1);
    assert_eq!(aggregate.downloaded.get("nl"), Some(&1));
    assert!(!h.media.path().join("Movie.en.srt").exists());
    assert!(h.media.path().join("Movie.nl.srt").exists());
}

#[tokio::test]
async fn rejected_token_on_search_logs_in_again() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "data": [record(3, "en", 5)]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": h.file_link(3),
            "remaining": 30
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    h.mount_file(3, "1\n00:00:01,000 --> 00:00:02,000\nHi\n").await;

    let mut client = h.client();
    seed_token(&client, "stale-token", chrono::Duration::hours(2));
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.downloaded.get("en"), Some(&1));
    assert_eq!(client.auth_state(), Some(AuthState::Fresh));
    assert_eq!(client.token_store().load("alice").unwrap().token, "fresh-token");
}

#[tokio::test]
async fn search_rate_limit_gives_up_after_three_attempts() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into(), "nl".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.failed, 2);
    assert_eq!(aggregate.total_downloaded(), 0);
}

#[tokio::test]
async fn download_rate_limit_gives_up_after_three_attempts() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "data": [record(4, "en", 5)]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.failed, 1);
    assert!(!client.quota_exhausted());
    assert!(!h.media.path().join("Movie.en.srt").exists());
}

#[tokio::test]
async fn failed_language_does_not_block_the_next() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "data": [record(1, "en", 5), record(2, "nl", 5)]
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(body_json(json!({"file_id": 1})))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .and(body_json(json!({"file_id": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": h.file_link(2),
            "remaining": 50
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    h.mount_file(2, "1\n00:00:01,000 --> 00:00:02,000\nHoi\n").await;

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into(), "nl".into()], &mut aggregate)
        .await
        .unwrap();

    assert_eq!(aggregate.failed, 1);
    assert_eq!(aggregate.downloaded.get("nl"), Some(&1));
    assert!(!h.media.path().join("Movie.en.srt").exists());
    assert!(h.media.path().join("Movie.nl.srt").exists());
}

#[tokio::test]
async fn exhausted_quota_stops_downloads() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    let video = h.video("Movie.mkv");

    Mock::given(method("GET"))
        .and(path("/api/v1/subtitles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "data": [record(1, "en", 5), record(2, "nl", 5)]
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/download"))
        .respond_with(ResponseTemplate::new(406).set_body_json(json!({
            "message": "You have downloaded your allowed 20 subtitles for 24h"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    let mut aggregate = DownloadAggregate::default();
    client
        .fetch_missing(&video, &["en".into(), "nl".into()], &mut aggregate)
        .await
        .unwrap();

    assert!(client.quota_exhausted());
    assert_eq!(aggregate.failed, 2);
    assert_eq!(aggregate.total_downloaded(), 0);
}

#[tokio::test]
async fn fresh_session_is_logged_out() {
    let h = Harness::new().await;
    h.mount_login("fresh-token", 1).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/logout"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "token successfully destroyed"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mut client = h.client();
    client.authenticate().await.unwrap();
    assert!(client.token_store().path().exists());

    assert!(client.logout().await.unwrap());
    assert!(!client.token_store().path().exists());
    assert_eq!(client.auth_state(), None);
}
