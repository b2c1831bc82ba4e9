//! Contract tests for the render client against a mock server.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mocap_models::{JobStatus, RenderProgress};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::client::RenderClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::submission::JobSubmission;

// =============================================================================
// Test Helpers
// =============================================================================

const TOKEN: &str = "test-token";
const STATUS_PATH: &str = "/status/job-1";

fn test_client(server: &MockServer) -> RenderClient {
    RenderClient::new(ClientConfig {
        base_url: server.uri(),
        token: TOKEN.to_string(),
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    })
    .unwrap()
}

/// Answers each request with the next document of a script, repeating the
/// last one once the script is exhausted.
struct StatusScript {
    documents: Vec<Value>,
    calls: AtomicUsize,
}

impl StatusScript {
    fn new(documents: Vec<Value>) -> Self {
        Self {
            documents,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for StatusScript {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.documents.len() - 1);
        ResponseTemplate::new(200).set_body_json(self.documents[index].clone())
    }
}

async fn mount_status(server: &MockServer, documents: Vec<Value>, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .and(header("Authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(StatusScript::new(documents))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn status_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == STATUS_PATH)
        .count()
}

fn write_motion_file(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"HIERARCHY\nROOT Hips\n").unwrap();
    path
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_sends_rotation_and_returns_handle() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let motion = write_motion_file(dir.path(), "walk01.bvh");

    for mode in mocap_models::RotationMode::ALL {
        Mock::given(method("POST"))
            .and(path("/render"))
            .and(query_param("p_rotate", mode.as_str()))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_string_contains("name=\"bvh_file\""))
            .respond_with(ResponseTemplate::new(200).set_body_string(STATUS_PATH))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = test_client(&server);
    for mode in mocap_models::RotationMode::ALL {
        let submission = JobSubmission::new(&motion).with_rotation(*mode);
        let handle = client.submit(&submission).await.unwrap();
        assert_eq!(handle, STATUS_PATH);
    }
}

#[tokio::test]
async fn test_submit_attaches_audio_part() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let motion = write_motion_file(dir.path(), "walk01.bvh");
    let audio = dir.path().join("walk01.wav");
    std::fs::write(&audio, b"RIFF....WAVE").unwrap();

    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_string_contains("name=\"audio_file\""))
        .and(body_string_contains("filename=\"walk01.wav\""))
        .respond_with(ResponseTemplate::new(202).set_body_string(STATUS_PATH))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let submission = JobSubmission::new(&motion).with_audio(&audio);
    assert_eq!(client.submit(&submission).await.unwrap(), STATUS_PATH);
}

#[tokio::test]
async fn test_missing_motion_file_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/render"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATUS_PATH))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let submission = JobSubmission::new("/no/such/dir/walk01.bvh");
    let err = client.submit(&submission).await.unwrap_err();
    assert!(matches!(err, ClientError::Input(_)));
}

#[tokio::test]
async fn test_rejected_submission_is_never_polled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let motion = write_motion_file(dir.path(), "walk01.bvh");

    Mock::given(method("POST"))
        .and(path("/render"))
        .respond_with(ResponseTemplate::new(500).set_body_string("queue unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, vec![json!({ "state": "PROCESSING", "result": null })], 0).await;

    let client = test_client(&server);
    let mut reporter = |_: &JobStatus| {};
    let err = client
        .render(&JobSubmission::new(&motion), dir.path(), &mut reporter)
        .await
        .unwrap_err();

    match err {
        ClientError::Submission { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "queue unavailable");
        }
        other => panic!("expected submission error, got {:?}", other),
    }
    assert_eq!(status_requests(&server).await, 0);
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test]
async fn test_poll_follows_phases_until_success() {
    let server = MockServer::start().await;
    let script = vec![
        json!({ "state": "PENDING", "result": { "jobs_in_queue": 3 } }),
        json!({ "state": "PENDING", "result": { "jobs_in_queue": 1 } }),
        json!({ "state": "RENDERING", "result": { "current": 10, "total": 100 } }),
        json!({ "state": "RENDERING", "result": { "current": 55, "total": 100 } }),
        json!({ "state": "RENDERING", "result": { "current": 100, "total": 100 } }),
        json!({ "state": "COMBINING A/V", "result": null }),
        json!({ "state": "SUCCESS", "result": { "files": ["/f/a", "/f/b"] } }),
    ];
    let expected = script.len();
    mount_status(&server, script, expected as u64).await;

    let client = test_client(&server);
    let mut seen = Vec::new();
    let mut reporter = |status: &JobStatus| seen.push(status.clone());
    let files = client.poll(STATUS_PATH, &mut reporter).await.unwrap();

    assert_eq!(files, vec!["/f/a".to_string(), "/f/b".to_string()]);
    assert_eq!(status_requests(&server).await, expected);

    let percents: Vec<u64> = seen
        .iter()
        .filter_map(|s| match s {
            JobStatus::Rendering(progress) => Some(progress.percent()),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![10, 55, 100]);
    assert!(seen.contains(&JobStatus::Pending { jobs_in_queue: 3 }));
    assert!(seen.contains(&JobStatus::CombiningAv));
}

#[tokio::test]
async fn test_poll_recomputes_percent_when_total_changes() {
    let server = MockServer::start().await;
    let script = vec![
        json!({ "state": "RENDERING", "result": { "current": 50, "total": 100 } }),
        json!({ "state": "RENDERING", "result": { "current": 60, "total": 200 } }),
        json!({ "state": "SUCCESS", "result": { "files": ["/f/a", "/f/b"] } }),
    ];
    mount_status(&server, script, 3).await;

    let client = test_client(&server);
    let mut seen = Vec::new();
    let mut reporter = |status: &JobStatus| {
        if let JobStatus::Rendering(progress) = status {
            seen.push(*progress);
        }
    };
    client.poll(STATUS_PATH, &mut reporter).await.unwrap();

    assert_eq!(
        seen,
        vec![
            RenderProgress { current: 50, total: 100 },
            RenderProgress { current: 60, total: 200 },
        ]
    );
    assert_eq!(seen[1].percent(), 30);
}

#[tokio::test]
async fn test_poll_stops_at_failure() {
    let server = MockServer::start().await;
    let script = vec![
        json!({ "state": "PROCESSING", "result": null }),
        json!({ "state": "FAILURE", "result": { "error_detail": "render crashed" } }),
        json!({ "state": "SUCCESS", "result": { "files": ["/f/a", "/f/b"] } }),
    ];
    mount_status(&server, script, 2).await;

    let client = test_client(&server);
    let mut reporter = |_: &JobStatus| {};
    let err = client.poll(STATUS_PATH, &mut reporter).await.unwrap_err();

    match err {
        ClientError::JobFailed(detail) => assert_eq!(detail, "render crashed"),
        other => panic!("expected job failure, got {:?}", other),
    }
    assert_eq!(status_requests(&server).await, 2);
}

#[tokio::test]
async fn test_poll_rejects_unknown_phase() {
    let server = MockServer::start().await;
    let script = vec![
        json!({ "state": "UNKNOWN_PHASE", "result": null }),
        json!({ "state": "SUCCESS", "result": { "files": ["/f/a", "/f/b"] } }),
    ];
    mount_status(&server, script, 1).await;

    let client = test_client(&server);
    let mut reporter = |_: &JobStatus| {};
    let err = client.poll(STATUS_PATH, &mut reporter).await.unwrap_err();

    assert!(matches!(err, ClientError::Protocol(_)));
    assert_eq!(status_requests(&server).await, 1);
}

#[tokio::test]
async fn test_poll_error_on_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such job"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut reporter = |_: &JobStatus| {};
    let err = client.poll(STATUS_PATH, &mut reporter).await.unwrap_err();

    match err {
        ClientError::Poll { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such job");
        }
        other => panic!("expected poll error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_poll_gives_up_after_deadline() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        vec![json!({ "state": "PENDING", "result": { "jobs_in_queue": 7 } })],
        1,
    )
    .await;

    let client = RenderClient::new(ClientConfig {
        base_url: server.uri(),
        token: TOKEN.to_string(),
        poll_interval: Duration::from_millis(1),
        deadline: Some(Duration::ZERO),
        ..Default::default()
    })
    .unwrap();

    let mut reporter = |_: &JobStatus| {};
    let err = client.poll(STATUS_PATH, &mut reporter).await.unwrap_err();
    assert!(matches!(err, ClientError::DeadlineExceeded(_)));
}

#[tokio::test]
async fn test_poll_never_requests_past_deadline() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        vec![json!({ "state": "PENDING", "result": { "jobs_in_queue": 2 } })],
        3,
    )
    .await;

    let deadline = Duration::from_millis(250);
    let client = RenderClient::new(ClientConfig {
        base_url: server.uri(),
        token: TOKEN.to_string(),
        poll_interval: Duration::from_millis(100),
        deadline: Some(deadline),
        ..Default::default()
    })
    .unwrap();

    let started = std::time::Instant::now();
    let mut reporter = |_: &JobStatus| {};
    let err = client.poll(STATUS_PATH, &mut reporter).await.unwrap_err();

    assert!(matches!(err, ClientError::DeadlineExceeded(d) if d == deadline));
    // Requests at 0, 100 and 200ms; a fourth would land at 300ms.
    assert_eq!(status_requests(&server).await, 3);
    assert!(started.elapsed() < deadline);
}

// =============================================================================
// Retrieval
// =============================================================================

async fn mount_artifact(server: &MockServer, locator: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(locator))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_retrieve_writes_positional_names() {
    let server = MockServer::start().await;
    mount_artifact(&server, "/out/1.mp4", b"upper body video").await;
    mount_artifact(&server, "/out/2.mp4", b"full body video").await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("output");

    let client = test_client(&server);
    let locators = vec!["/out/1.mp4".to_string(), "/out/2.mp4".to_string()];
    let written = client.retrieve(&locators, &destination, "walk01").await.unwrap();

    assert_eq!(
        written,
        vec![destination.join("walk01_UB.mp4"), destination.join("walk01_FB.mp4")]
    );
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"upper body video");
    assert_eq!(std::fs::read(&written[1]).unwrap(), b"full body video");

    let mut names: Vec<String> = std::fs::read_dir(&destination)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["walk01_FB.mp4", "walk01_UB.mp4"]);
}

#[tokio::test]
async fn test_retrieve_into_existing_directory_keeps_other_files() {
    let server = MockServer::start().await;
    mount_artifact(&server, "/out/1.mp4", b"ub").await;
    mount_artifact(&server, "/out/2.mp4", b"fb").await;

    let dir = TempDir::new().unwrap();
    let unrelated = dir.path().join("notes.txt");
    std::fs::write(&unrelated, b"keep me").unwrap();

    let client = test_client(&server);
    let locators = vec!["/out/1.mp4".to_string(), "/out/2.mp4".to_string()];
    client.retrieve(&locators, dir.path(), "walk01").await.unwrap();

    assert_eq!(std::fs::read(&unrelated).unwrap(), b"keep me");
    assert!(dir.path().join("walk01_UB.mp4").exists());
    assert!(dir.path().join("walk01_FB.mp4").exists());
}

#[tokio::test]
async fn test_retrieve_aborts_on_failed_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/out/1.mp4"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/out/2.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fb".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = test_client(&server);
    let locators = vec!["/out/1.mp4".to_string(), "/out/2.mp4".to_string()];
    let err = client.retrieve(&locators, dir.path(), "walk01").await.unwrap_err();

    match err {
        ClientError::Retrieval { locator, reason } => {
            assert_eq!(locator, "/out/1.mp4");
            assert!(reason.contains("500"));
        }
        other => panic!("expected retrieval error, got {:?}", other),
    }
    assert!(!dir.path().join("walk01_FB.mp4").exists());
}

#[tokio::test]
async fn test_retrieve_rejects_unexpected_artifact_count() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let client = test_client(&server);

    let err = client
        .retrieve(&["/out/1.mp4".to_string()], dir.path(), "walk01")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ArtifactCount(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_render_runs_submit_poll_and_retrieve() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let motion = write_motion_file(dir.path(), "dance_02.bvh");

    Mock::given(method("POST"))
        .and(path("/render"))
        .and(query_param("p_rotate", "flip"))
        .respond_with(ResponseTemplate::new(202).set_body_string(STATUS_PATH))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(
        &server,
        vec![
            json!({ "state": "PROCESSING", "result": null }),
            json!({ "state": "SUCCESS", "result": "{\"files\": [\"/out/1.mp4\", \"/out/2.mp4\"]}" }),
        ],
        2,
    )
    .await;
    mount_artifact(&server, "/out/1.mp4", b"ub").await;
    mount_artifact(&server, "/out/2.mp4", b"fb").await;

    let client = test_client(&server);
    let submission = JobSubmission::new(&motion).with_rotation_str("flip").unwrap();
    let destination = dir.path().join("videos");
    let mut reporter = |_: &JobStatus| {};
    let written = client
        .render(&submission, &destination, &mut reporter)
        .await
        .unwrap();

    assert_eq!(
        written,
        vec![
            destination.join("dance_02_UB.mp4"),
            destination.join("dance_02_FB.mp4")
        ]
    );
}
