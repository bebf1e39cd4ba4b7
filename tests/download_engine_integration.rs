//! Integration tests for the download engine against a mock HTTP server.
//!
//! Retry delays are zero so the retry paths run instantly.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvester_core::{
    DownloadEngine, DownloadError, EngineConfig, ProgressObserver, RetryPolicy, SessionCookie,
    SessionSnapshot,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{bind_listener_or_skip, socket_skip_return, start_mock_server_or_skip};
use support::{VIDEO_BYTES, video_body};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

const PROFILE: &str = "https://www.tiktok.com/@someone";

fn engine_with_attempts(max_attempts: u32) -> DownloadEngine {
    DownloadEngine::new(EngineConfig {
        retry_policy: RetryPolicy::new(max_attempts, Duration::ZERO),
        request_timeout: Duration::from_secs(10),
        ..EngineConfig::default()
    })
    .unwrap()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |requests| requests.len())
}

fn destination(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("video_1.mp4")
}

#[tokio::test]
async fn test_fetch_writes_full_body_on_200() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let outcome = engine_with_attempts(4)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes, VIDEO_BYTES as u64);
    assert_eq!(outcome.content_length, Some(VIDEO_BYTES as u64));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(std::fs::read(&dest).unwrap().len(), VIDEO_BYTES);
}

#[tokio::test]
async fn test_fetch_accepts_partial_content_response() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(video_body()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let outcome = engine_with_attempts(1)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &destination(&dir),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes, VIDEO_BYTES as u64);
}

#[tokio::test]
async fn test_fetch_sends_baseline_cookie_and_override_headers() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .mount(&server)
        .await;

    let session = SessionSnapshot::new(
        vec![
            SessionCookie::new(".tiktok.com", "msToken", "tok123"),
            SessionCookie::new(".tiktok.com", "sid", "s1"),
        ],
        vec![
            ("User-Agent".to_string(), "CapturedAgent/1.0".to_string()),
            ("X-Captured".to_string(), "yes".to_string()),
            ("Host".to_string(), "evil.invalid".to_string()),
        ],
    );

    let dir = TempDir::new().unwrap();
    engine_with_attempts(1)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &destination(&dir),
            PROFILE,
            &session,
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let header = |name: &str| {
        requests[0]
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(header("range").as_deref(), Some("bytes=0-"));
    assert_eq!(header("referer").as_deref(), Some(PROFILE));
    assert_eq!(header("origin").as_deref(), Some("https://www.tiktok.com"));
    assert_eq!(header("cookie").as_deref(), Some("msToken=tok123; sid=s1"));
    assert_eq!(header("mstoken").as_deref(), Some("tok123"));
    assert_eq!(header("user-agent").as_deref(), Some("CapturedAgent/1.0"));
    assert_eq!(header("x-captured").as_deref(), Some("yes"));
    assert_ne!(header("host").as_deref(), Some("evil.invalid"));
}

#[tokio::test]
async fn test_fetch_follows_redirect_chain_within_one_attempt() {
    let server = require_mock_server!();
    for (from, to) in [("/a", "/b"), ("/b", "/c"), ("/c", "/video.mp4")] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", to))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let outcome = engine_with_attempts(1)
        .fetch(
            &format!("{}/a", server.uri()),
            &destination(&dir),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 1);
    assert!(outcome.final_url.ends_with("/video.mp4"));
    assert_eq!(request_count(&server).await, 4);
}

#[tokio::test]
async fn test_fetch_follows_301_with_absolute_location() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let outcome = engine_with_attempts(1)
        .fetch(
            &format!("{}/old", server.uri()),
            &destination(&dir),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();
    assert!(outcome.final_url.ends_with("/new"));
}

#[tokio::test]
async fn test_fetch_redirect_loop_hits_hop_limit_without_retry() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let result = engine_with_attempts(4)
        .fetch(
            &format!("{}/loop", server.uri()),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::RedirectLimit { limit: 5, .. })
    ));
    // The first request plus five followed hops, in a single attempt.
    assert_eq!(request_count(&server).await, 6);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_redirect_without_location_fails_immediately() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let result = engine_with_attempts(4)
        .fetch(
            &format!("{}/broken", server.uri()),
            &destination(&dir),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::MissingRedirectLocation { status: 302, .. })
    ));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_fetch_retries_server_errors_then_succeeds() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let outcome = engine_with_attempts(4)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &destination(&dir),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_fetch_status_failures_exhaust_budget() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = engine_with_attempts(2)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &destination(&dir),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Exhausted { attempts: 2, .. }));
    assert!(matches!(
        err.root_cause(),
        DownloadError::HttpStatus { status: 403, .. }
    ));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_fetch_undersized_body_is_retried_and_removed() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/tiny.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 50_000]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let err = engine_with_attempts(4)
        .fetch(
            &format!("{}/tiny.mp4", server.uri()),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Exhausted { attempts: 4, .. }));
    assert!(matches!(
        err.root_cause(),
        DownloadError::IncompleteArtifact {
            actual_bytes: 50_000,
            ..
        }
    ));
    assert_eq!(request_count(&server).await, 4);
    assert!(!dest.exists(), "no partial file may survive a failure");
}

#[tokio::test]
async fn test_fetch_undersized_then_full_body_succeeds() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1_000]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let outcome = engine_with_attempts(4)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(std::fs::read(&dest).unwrap().len(), VIDEO_BYTES);
}

#[tokio::test]
async fn test_fetch_times_out_slow_response() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(video_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let engine = DownloadEngine::new(EngineConfig {
        retry_policy: RetryPolicy::new(2, Duration::ZERO),
        request_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    })
    .unwrap();

    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let err = engine
        .fetch(
            &format!("{}/slow.mp4", server.uri()),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Exhausted { attempts: 2, .. }));
    assert!(matches!(err.root_cause(), DownloadError::Timeout { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_creates_missing_output_directories() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("downloads").join("nested").join("video_9.mp4");
    engine_with_attempts(1)
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    assert!(dest.exists());
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl ProgressObserver for RecordingProgress {
    fn started(&self, label: &str, total_bytes: Option<u64>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("started {label} {total_bytes:?}"));
    }

    fn advanced(&self, _received: u64, _total_bytes: Option<u64>) {}

    fn finished(&self, received: u64, complete: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finished {received} {complete}"));
    }
}

#[tokio::test]
async fn test_fetch_reports_progress_per_attempt() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 10]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video_body()))
        .mount(&server)
        .await;

    let progress = Arc::new(RecordingProgress::default());
    let engine = engine_with_attempts(2).with_progress(progress.clone());
    let dir = TempDir::new().unwrap();
    engine
        .fetch(
            &format!("{}/video.mp4", server.uri()),
            Path::new(&destination(&dir)),
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap();

    let events = progress.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "started video_1.mp4 Some(10)".to_string(),
            "finished 10 false".to_string(),
            format!("started video_1.mp4 Some({VIDEO_BYTES})"),
            format!("finished {VIDEO_BYTES} true"),
        ]
    );
}

const DECLARED_BYTES: usize = 400_000;
const SENT_BYTES: usize = 200_000;

/// How a truncating server ends each response after half of the body.
#[derive(Debug, Clone, Copy)]
enum BodyCutoff {
    Close,
    Stall,
}

/// Serves `DECLARED_BYTES` as the content length but sends only `SENT_BYTES`.
///
/// Returns the number of connections accepted so far.
fn serve_truncated_body(listener: TcpListener, cutoff: BodyCutoff) -> Arc<AtomicUsize> {
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {DECLARED_BYTES}\r\n\r\n"
                );
                if socket.write_all(head.as_bytes()).await.is_err()
                    || socket.write_all(&vec![0u8; SENT_BYTES]).await.is_err()
                    || socket.flush().await.is_err()
                {
                    return;
                }
                if let BodyCutoff::Stall = cutoff {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            });
        }
    });
    connections
}

fn assert_every_attempt_abandoned_a_partial(progress: &RecordingProgress, attempts: usize) {
    let events = progress.events.lock().unwrap().clone();
    let finished: Vec<&String> = events.iter().filter(|e| e.starts_with("finished")).collect();
    assert_eq!(finished.len(), attempts, "events: {events:?}");
    for event in finished {
        assert!(event.ends_with(" false"), "events: {events:?}");
        assert_ne!(event.as_str(), "finished 0 false", "events: {events:?}");
    }
}

#[tokio::test]
async fn test_connection_closed_mid_body_retries_and_removes_partial() {
    let Some(listener) = bind_listener_or_skip().await else {
        return socket_skip_return();
    };
    let address = listener.local_addr().unwrap();
    let connections = serve_truncated_body(listener, BodyCutoff::Close);

    let progress = Arc::new(RecordingProgress::default());
    let engine = engine_with_attempts(3).with_progress(progress.clone());
    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let err = engine
        .fetch(
            &format!("http://{address}/video.mp4"),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Exhausted { attempts: 3, .. }), "{err}");
    assert!(matches!(err.root_cause(), DownloadError::Network { .. }), "{err}");
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    assert_every_attempt_abandoned_a_partial(&progress, 3);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_timeout_mid_body_retries_and_removes_partial() {
    let Some(listener) = bind_listener_or_skip().await else {
        return socket_skip_return();
    };
    let address = listener.local_addr().unwrap();
    let connections = serve_truncated_body(listener, BodyCutoff::Stall);

    let progress = Arc::new(RecordingProgress::default());
    let engine = DownloadEngine::new(EngineConfig {
        retry_policy: RetryPolicy::new(2, Duration::ZERO),
        request_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    })
    .unwrap()
    .with_progress(progress.clone());
    let dir = TempDir::new().unwrap();
    let dest = destination(&dir);
    let err = engine
        .fetch(
            &format!("http://{address}/video.mp4"),
            &dest,
            PROFILE,
            &SessionSnapshot::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Exhausted { attempts: 2, .. }), "{err}");
    assert!(matches!(err.root_cause(), DownloadError::Timeout { .. }), "{err}");
    assert!(err.to_string().contains("timeout after 500ms"), "{err}");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert_every_attempt_abandoned_a_partial(&progress, 2);
    assert!(!dest.exists());
}
