use axum::http::StatusCode;
use convoy_core::config::Config;
use convoy_core::ingress::IngressRouter;
use convoy_core::manifest::UnitManifest;
use convoy_core::platform::Endpoint;
use convoy_core::record::RecordStore;
use convoy_core::repo::DesiredStateRepo;
use convoy_core::types::SyncPhase;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bootstrap a minimal convoy project inside the given temp directory.
fn init_project(dir: &TempDir) {
    convoy_core::io::ensure_dir(&convoy_core::paths::convoy_dir(dir.path())).unwrap();
    Config::default().save(dir.path()).unwrap();
    DesiredStateRepo::new().save(dir.path()).unwrap();
    RecordStore::new().save(dir.path()).unwrap();
}

fn register_unit(dir: &TempDir, name: &str) {
    let repo = DesiredStateRepo::load(dir.path()).unwrap();
    let manifest = UnitManifest::new(
        "registry.example.com/quote-app",
        "latest",
        8080,
        "quotes.example.com",
    );
    repo.register(name, manifest, "operator").unwrap();
    repo.save(dir.path()).unwrap();
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthz_is_ok() {
    let dir = TempDir::new().unwrap();
    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn list_units_returns_registered_units() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/api/units").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["unit"], "quote-app");
    assert_eq!(json[0]["revision"], 1);
    assert_eq!(json[0]["manifest"]["image"]["tag"], "latest");
}

#[tokio::test]
async fn get_unknown_unit_returns_404() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/api/units/ghost").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn uninitialized_project_returns_400() {
    let dir = TempDir::new().unwrap();
    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, _) = get(app, "/api/units").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_admits_and_builds_all_units() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = post_json(
        app,
        "/api/webhook",
        serde_json::json!({
            "branch": "main",
            "commit_sha": "abc123f00ddeadbeef",
            "changed_paths": ["src/main.py"],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"]["decision"], "admit");
    assert_eq!(json["builds"][0]["unit"], "quote-app");
    assert_eq!(json["builds"][0]["status"], "succeeded");
    assert_eq!(json["builds"][0]["tag"], "abc123f");
    assert_eq!(json["builds"][0]["revision"], 2);

    // The tag write landed in the desired-state repository.
    let repo = DesiredStateRepo::load(dir.path()).unwrap();
    let (manifest, revision) = repo.read_latest("quote-app").unwrap();
    assert_eq!(manifest.image.tag, "abc123f");
    assert_eq!(revision, 2);
}

#[tokio::test]
async fn racing_webhooks_preserve_both_tag_writes() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let commit = |sha: &str| {
        serde_json::json!({
            "branch": "main",
            "commit_sha": sha,
            "changed_paths": ["src/main.py"],
        })
    };

    let (a, b) = tokio::join!(
        post_json(app.clone(), "/api/webhook", commit("aaa1111b2c3d4e5f6071")),
        post_json(app.clone(), "/api/webhook", commit("bbb2222c3d4e5f607182")),
    );
    for (status, json) in [&a, &b] {
        assert_eq!(*status, StatusCode::OK);
        assert_eq!(json["builds"][0]["status"], "succeeded");
    }

    // Neither write clobbered the other: both tags are in the history and
    // the revision counter advanced twice.
    let repo = DesiredStateRepo::load(dir.path()).unwrap();
    let history = repo.history("quote-app");
    assert_eq!(history.len(), 3);
    let tags: Vec<&str> = history
        .iter()
        .map(|e| e.manifest.image.tag.as_str())
        .collect();
    assert!(tags.contains(&"aaa1111"));
    assert!(tags.contains(&"bbb2222"));
    let (_, revision) = repo.read_latest("quote-app").unwrap();
    assert_eq!(revision, 3);
}

#[tokio::test]
async fn webhook_rejects_chart_only_commit_without_building() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = post_json(
        app,
        "/api/webhook",
        serde_json::json!({
            "branch": "main",
            "commit_sha": "abc123f00ddeadbeef",
            "changed_paths": ["charts/quote-app/values.yaml"],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"]["decision"], "reject");
    assert_eq!(json["builds"].as_array().unwrap().len(), 0);

    // Desired state untouched.
    let repo = DesiredStateRepo::load(dir.path()).unwrap();
    let (_, revision) = repo.read_latest("quote-app").unwrap();
    assert_eq!(revision, 1);
}

#[tokio::test]
async fn webhook_rejects_non_release_branch() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = post_json(
        app,
        "/api/webhook",
        serde_json::json!({
            "branch": "feature/snazzy",
            "commit_sha": "abc123f00ddeadbeef",
            "changed_paths": ["src/main.py"],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"]["decision"], "reject");
}

#[tokio::test]
async fn webhook_with_empty_sha_returns_400() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, _) = post_json(
        app,
        "/api/webhook",
        serde_json::json!({
            "branch": "main",
            "commit_sha": "",
            "changed_paths": ["src/main.py"],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_build_records_zero_write_attempts() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = post_json(
        app,
        "/api/webhook",
        serde_json::json!({
            "branch": "main",
            "commit_sha": "zzz-not-a-revision",
            "changed_paths": ["src/main.py"],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["builds"][0]["status"], "failed");

    // The run never reached a desired-state write, so no attempts are
    // charged to it.
    let records = RecordStore::load(dir.path()).unwrap();
    let entry = records.last_build("quote-app").unwrap();
    assert_eq!(entry.attempts, 0);
}

#[tokio::test]
async fn history_shows_webhook_write() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, _) = post_json(
        app.clone(),
        "/api/webhook",
        serde_json::json!({
            "branch": "main",
            "commit_sha": "abc123f00ddeadbeef",
            "changed_paths": ["src/main.py"],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = get(app, "/api/units/quote-app/history").await;
    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["author"], "convoy-bot");
    assert_eq!(entries[1]["manifest"]["image"]["tag"], "abc123f");
}

#[tokio::test]
async fn status_reflects_recorded_phases() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    register_unit(&dir, "quote-app");

    let mut records = RecordStore::load(dir.path()).unwrap();
    records.transition("quote-app", SyncPhase::Synced, 1, None);
    records.save(dir.path()).unwrap();

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["units"][0]["unit"], "quote-app");
    assert_eq!(json["units"][0]["phase"], "synced");
    assert_eq!(json["units"][0]["revision"], 1);
}

#[tokio::test]
async fn ingress_table_starts_empty() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let app = convoy_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/api/ingress").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn ingress_resolve_picks_longest_prefix() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let router = IngressRouter::new();
    router.set_route(
        "quotes.example.com",
        "/",
        "quote-app",
        8080,
        vec![Endpoint {
            address: "10.0.0.1".to_string(),
            port: 8080,
        }],
    );
    router.set_route(
        "quotes.example.com",
        "/admin",
        "quote-admin",
        9090,
        vec![Endpoint {
            address: "10.0.0.2".to_string(),
            port: 9090,
        }],
    );
    router.save(dir.path()).unwrap();

    let app = convoy_server::build_router(dir.path().to_path_buf());

    let (status, json) = get(
        app.clone(),
        "/api/ingress/resolve?host=quotes.example.com&path=/admin/users",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["unit"], "quote-admin");

    let (status, json) = get(
        app.clone(),
        "/api/ingress/resolve?host=quotes.example.com&path=/quotes/today",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["unit"], "quote-app");

    let (status, _) = get(app, "/api/ingress/resolve?host=other.example.com&path=/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn events_stream_emits_update_on_records_change() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let state = convoy_server::state::AppState::with_watch_interval(
        dir.path().to_path_buf(),
        std::time::Duration::from_millis(25),
    );
    let app = convoy_server::build_router_with_state(state);

    let req = axum::http::Request::builder()
        .uri("/api/events")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    // A records write lands on the open stream as an `update` event.
    let mut records = RecordStore::load(dir.path()).unwrap();
    records.transition("quote-app", SyncPhase::Synced, 1, None);
    records.save(dir.path()).unwrap();

    let mut body = response.into_body();
    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), body.frame())
        .await
        .expect("no event within the timeout")
        .unwrap()
        .unwrap();
    let data = frame.into_data().unwrap();
    assert!(String::from_utf8_lossy(&data).contains("update"));
}
