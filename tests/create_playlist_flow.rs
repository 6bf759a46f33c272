mod support;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use playlist_relay::test_support::{
    http_client, seeded_token_store, token_valid_for, FixedJitter, RecordingSleeper,
};
use playlist_relay::{
    create_playlist, plan_playlist, ApiClient, CheckpointStatus, CheckpointStore,
    CreatePlaylistOptions, PlaylistPlan, RetryPolicy,
};
use serde_json::{json, Value};
use support::{MockResponse, MockServer, TestDir};

fn track_id(i: usize) -> String {
    format!("{i:0>22}")
}

fn source(n: usize) -> Value {
    let items: Vec<Value> = (0..n)
        .map(|i| match i % 3 {
            0 => json!({"spotifyId": track_id(i)}),
            1 => json!({"uri": format!("spotify:track:{}", track_id(i))}),
            _ => json!({"spotify": {"uri": format!("https://open.spotify.com/track/{}", track_id(i))}}),
        })
        .collect();
    json!({"user__mix": {"title": "Evening Mix", "items": items}})
}

fn api(server: &MockServer, dir: &TestDir) -> ApiClient {
    let store = seeded_token_store(
        dir.join("token.json"),
        &server.url("/api/token"),
        token_valid_for("T1", "R1", Duration::from_secs(3600)),
    )
    .expect("seed token");
    let policy = RetryPolicy {
        max_retries: 2,
        throttle: Duration::ZERO,
        ..RetryPolicy::default()
    };
    ApiClient::new(http_client().expect("http"), server.base_url(), store)
        .with_policy(policy)
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .with_jitter(Arc::new(FixedJitter(0.5)))
}

fn options(dir: &TestDir, source_json: PathBuf, batch_size: usize) -> CreatePlaylistOptions {
    CreatePlaylistOptions {
        source_json,
        public: false,
        description: "from tests".to_string(),
        replace: true,
        resume: true,
        batch_size,
        checkpoint_path: dir.join("checkpoint.json"),
    }
}

fn plan(root: &Value) -> PlaylistPlan {
    plan_playlist(root, None, None).expect("plan")
}

fn snapshot() -> MockResponse {
    MockResponse::json(201, json!({"snapshot_id": "snap"}))
}

#[tokio::test]
async fn fresh_run_replaces_existing_playlist_and_appends_in_batches() {
    let server = MockServer::start().await;
    let dir = TestDir::new();
    let root = source(120);
    let source_json = dir.write_json("list.json", &root);

    server.script("GET", "/v1/me", vec![MockResponse::json(200, json!({"id": "user1"}))]);
    server.script(
        "GET",
        "/v1/me/playlists",
        vec![
            MockResponse::json(
                200,
                json!({"items": [{"id": "p0", "name": "Other"}, null], "next": "page-2"}),
            ),
            MockResponse::json(
                200,
                json!({"items": [{"id": "p1", "name": "Evening Mix"}], "next": null}),
            ),
        ],
    );
    server.script("DELETE", "/v1/playlists/p1/followers", vec![MockResponse::empty(200)]);
    server.script(
        "POST",
        "/v1/users/user1/playlists",
        vec![MockResponse::json(201, json!({"id": "new1", "name": "Evening Mix"}))],
    );
    server.script(
        "POST",
        "/v1/playlists/new1/tracks",
        vec![snapshot(), snapshot(), snapshot()],
    );

    let plan = plan(&root);
    assert_eq!(plan.items_path, "user__mix.items");
    let mut client = api(&server, &dir);
    let outcome = create_playlist(&mut client, &plan, &options(&dir, source_json, 50))
        .await
        .expect("create playlist");

    assert_eq!(outcome.resource_id, "new1");
    assert_eq!(outcome.total, 120);
    assert!(!outcome.resumed);

    let pages = server.requests_to("GET", "/v1/me/playlists");
    assert_eq!(pages[0].query_value("offset").as_deref(), Some("0"));
    assert_eq!(pages[1].query_value("offset").as_deref(), Some("50"));
    assert_eq!(pages[1].query_value("limit").as_deref(), Some("50"));

    let created = server.requests_to("POST", "/v1/users/user1/playlists");
    assert_eq!(
        created[0].json_body(),
        json!({"name": "Evening Mix", "public": false, "description": "from tests"})
    );

    let batches = server.requests_to("POST", "/v1/playlists/new1/tracks");
    let sizes: Vec<usize> = batches
        .iter()
        .map(|r| r.json_body()["uris"].as_array().map_or(0, Vec::len))
        .collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert_eq!(
        batches[0].json_body()["uris"][1],
        format!("spotify:track:{}", track_id(1))
    );

    let checkpoint = CheckpointStore::new(dir.join("checkpoint.json"))
        .load()
        .expect("load")
        .expect("checkpoint");
    assert_eq!(checkpoint.status, CheckpointStatus::Completed);
    assert_eq!(checkpoint.resource_id, "new1");
}

#[tokio::test]
async fn rerun_after_failed_batch_resumes_without_recreating() {
    let server = MockServer::start().await;
    let dir = TestDir::new();
    let root = source(120);
    let source_json = dir.write_json("list.json", &root);
    let plan = plan(&root);

    server.script("GET", "/v1/me", vec![MockResponse::json(200, json!({"id": "user1"}))]);
    server.script(
        "GET",
        "/v1/me/playlists",
        vec![MockResponse::json(200, json!({"items": [], "next": null}))],
    );
    server.script(
        "POST",
        "/v1/users/user1/playlists",
        vec![MockResponse::json(201, json!({"id": "new1"}))],
    );
    server.script(
        "POST",
        "/v1/playlists/new1/tracks",
        vec![
            snapshot(),
            MockResponse::json(403, json!({"error": {"message": "forbidden"}})),
        ],
    );

    let mut client = api(&server, &dir);
    let err = create_playlist(&mut client, &plan, &options(&dir, source_json.clone(), 100))
        .await
        .expect_err("second batch rejected");
    assert_eq!(err.code(), "API_REJECTED");

    let checkpoint = CheckpointStore::new(dir.join("checkpoint.json"))
        .load()
        .expect("load")
        .expect("checkpoint");
    assert_eq!(checkpoint.status, CheckpointStatus::InProgress);
    assert_eq!(checkpoint.next_index, 100);

    server.script("POST", "/v1/playlists/new1/tracks", vec![snapshot()]);
    let mut client = api(&server, &dir);
    let outcome = create_playlist(&mut client, &plan, &options(&dir, source_json, 100))
        .await
        .expect("resume");

    assert!(outcome.resumed);
    assert_eq!(outcome.applied, 20);
    assert_eq!(server.requests_to("GET", "/v1/me").len(), 1);
    assert_eq!(server.requests_to("POST", "/v1/users/user1/playlists").len(), 1);

    let batches = server.requests_to("POST", "/v1/playlists/new1/tracks");
    assert_eq!(batches.len(), 3);
    let last = batches[2].json_body();
    assert_eq!(last["uris"].as_array().map(Vec::len), Some(20));
    assert_eq!(last["uris"][0], format!("spotify:track:{}", track_id(100)));
}

#[tokio::test]
async fn keep_existing_playlist_when_replace_is_off() {
    let server = MockServer::start().await;
    let dir = TestDir::new();
    let root = source(3);
    let source_json = dir.write_json("list.json", &root);

    server.script("GET", "/v1/me", vec![MockResponse::json(200, json!({"id": "user1"}))]);
    server.script(
        "POST",
        "/v1/users/user1/playlists",
        vec![MockResponse::json(201, json!({"id": "new1"}))],
    );
    server.script("POST", "/v1/playlists/new1/tracks", vec![snapshot()]);

    let mut opts = options(&dir, source_json, 100);
    opts.replace = false;
    let mut client = api(&server, &dir);
    create_playlist(&mut client, &plan(&root), &opts)
        .await
        .expect("create");

    assert!(server.requests_to("GET", "/v1/me/playlists").is_empty());
    assert!(server
        .requests()
        .iter()
        .all(|r| r.method != "DELETE"));
}

#[tokio::test]
async fn create_response_without_id_is_malformed() {
    let server = MockServer::start().await;
    let dir = TestDir::new();
    let root = source(3);
    let source_json = dir.write_json("list.json", &root);

    server.script("GET", "/v1/me", vec![MockResponse::json(200, json!({"id": "user1"}))]);
    server.script(
        "GET",
        "/v1/me/playlists",
        vec![MockResponse::json(200, json!({"items": [], "next": null}))],
    );
    server.script(
        "POST",
        "/v1/users/user1/playlists",
        vec![MockResponse::json(201, json!({"name": "Evening Mix"}))],
    );

    let mut client = api(&server, &dir);
    let err = create_playlist(&mut client, &plan(&root), &options(&dir, source_json, 100))
        .await
        .expect_err("malformed");

    assert_eq!(err.code(), "API_MALFORMED_RESPONSE");
    assert!(!dir.join("checkpoint.json").exists());
}

#[tokio::test]
async fn playlist_page_without_items_is_malformed() {
    let server = MockServer::start().await;
    let dir = TestDir::new();
    let root = source(3);
    let source_json = dir.write_json("list.json", &root);

    server.script("GET", "/v1/me", vec![MockResponse::json(200, json!({"id": "user1"}))]);
    server.script(
        "GET",
        "/v1/me/playlists",
        vec![MockResponse::json(200, json!({"next": null}))],
    );

    let mut client = api(&server, &dir);
    let err = create_playlist(&mut client, &plan(&root), &options(&dir, source_json, 100))
        .await
        .expect_err("malformed page");

    assert_eq!(err.code(), "API_MALFORMED_RESPONSE");
    assert!(server.requests_to("POST", "/v1/users/user1/playlists").is_empty());
}

#[tokio::test]
async fn user_id_is_percent_encoded_in_path() {
    let server = MockServer::start().await;
    let dir = TestDir::new();
    let root = source(2);
    let source_json = dir.write_json("list.json", &root);

    server.script("GET", "/v1/me", vec![MockResponse::json(200, json!({"id": "dj one/2"}))]);
    server.script(
        "POST",
        "/v1/users/dj%20one%2F2/playlists",
        vec![MockResponse::json(201, json!({"id": "new1"}))],
    );
    server.script("POST", "/v1/playlists/new1/tracks", vec![snapshot()]);

    let mut opts = options(&dir, source_json, 100);
    opts.replace = false;
    let mut client = api(&server, &dir);
    create_playlist(&mut client, &plan(&root), &opts)
        .await
        .expect("create");

    assert_eq!(server.requests_to("POST", "/v1/users/dj%20one%2F2/playlists").len(), 1);
}
