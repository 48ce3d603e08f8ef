// tests/votes_api.rs
//
// Vote casting and tally reads through the router, backed by SQLite in memory.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use election_hub::api::{create_router, AppState};
use election_hub::auth::Authenticator;
use election_hub::elections::FecClient;
use election_hub::store::sqlite::{self, SqliteStore};

const BODY_LIMIT: usize = 1024 * 1024;

async fn test_router() -> Router {
    let pool = sqlite::connect("sqlite::memory:", Duration::from_secs(5))
        .await
        .expect("connect");
    sqlite::ensure_schema(&pool).await.expect("schema");
    let store = Arc::new(SqliteStore::new(pool));
    let fec = FecClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).expect("client");
    create_router(AppState {
        news: store.clone(),
        votes: store.clone(),
        users: store,
        auth: Arc::new(Authenticator::new(b"test", Duration::from_secs(60), 4)),
        fec: Arc::new(fec),
    })
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

fn post_vote(payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/vote")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /api/vote")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

#[tokio::test]
async fn casting_votes_accumulates_per_state() {
    let app = test_router().await;

    let (status, body) = call(&app, post_vote(json!({ "state": "OH", "party": "PartyA" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote counted!");
    assert_eq!(body["vote"], json!({ "state": "OH", "PartyA": 1, "PartyB": 0 }));

    call(&app, post_vote(json!({ "state": "OH", "party": "PartyB" }))).await;
    call(&app, post_vote(json!({ "state": "OH", "party": "PartyA" }))).await;
    call(&app, post_vote(json!({ "state": "AZ", "party": "PartyB" }))).await;

    let (status, oh) = call(&app, get("/api/votes/OH")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(oh, json!({ "state": "OH", "PartyA": 2, "PartyB": 1 }));

    let (status, all) = call(&app, get("/api/votes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        all,
        json!([
            { "state": "AZ", "PartyA": 0, "PartyB": 1 },
            { "state": "OH", "PartyA": 2, "PartyB": 1 }
        ])
    );
}

#[tokio::test]
async fn unknown_state_reads_as_zero_tally() {
    let app = test_router().await;

    let (status, body) = call(&app, get("/api/votes/WY")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "state": "WY", "PartyA": 0, "PartyB": 0 }));
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let app = test_router().await;

    for payload in [
        json!({}),
        json!({ "state": "OH" }),
        json!({ "party": "PartyA" }),
        json!({ "state": "  ", "party": "PartyA" }),
    ] {
        let (status, body) = call(&app, post_vote(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "State and party are required" }));
    }
}

#[tokio::test]
async fn unknown_party_is_rejected_without_writing() {
    let app = test_router().await;

    let (status, body) = call(&app, post_vote(json!({ "state": "OH", "party": "PartyC" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Unknown party 'PartyC'. Use 'PartyA' or 'PartyB'."
    );

    let (_, all) = call(&app, get("/api/votes")).await;
    assert_eq!(all, json!([]));
}
