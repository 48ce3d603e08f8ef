// tests/providers_currents.rs
//
// HTTP mode of the Currents feed against a throwaway local server.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use election_hub::error::FetchError;
use election_hub::ingest::config::IngestConfig;
use election_hub::ingest::providers::currents::CurrentsFeed;
use election_hub::ingest::types::NewsFeed;

const FIXTURE: &str = include_str!("fixtures/currents_latest.json");

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn config_for(addr: SocketAddr, path: &str) -> IngestConfig {
    IngestConfig {
        endpoint: format!("http://{addr}{path}"),
        timeout_secs: 5,
        ..IngestConfig::default()
    }
}

async fn latest_news(
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    if auth != Some("test-key") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if q.get("category").map(String::as_str) != Some("politics")
        || q.get("country").map(String::as_str) != Some("US")
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(FIXTURE.to_string())
}

#[tokio::test]
async fn sends_key_and_filters_and_parses_items() {
    let addr = serve(Router::new().route("/v1/latest-news", get(latest_news))).await;
    let feed = CurrentsFeed::from_config(&config_for(addr, "/v1/latest-news"), "test-key")
        .expect("build feed");

    let batch = feed.fetch_latest().await.expect("fetch ok");
    assert_eq!(batch.len(), 4);
    assert_eq!(batch.iter().filter(|r| r.is_ok()).count(), 3);
    assert_eq!(feed.name(), "currents");
}

#[tokio::test]
async fn wrong_key_surfaces_status() {
    let addr = serve(Router::new().route("/v1/latest-news", get(latest_news))).await;
    let feed = CurrentsFeed::from_config(&config_for(addr, "/v1/latest-news"), "nope")
        .expect("build feed");

    match feed.fetch_latest().await {
        Err(FetchError::Status { status }) => assert_eq!(status, 401),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn upstream_500_is_a_fetch_error() {
    let app = Router::new().route(
        "/v1/latest-news",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = serve(app).await;
    let feed = CurrentsFeed::from_config(&config_for(addr, "/v1/latest-news"), "test-key")
        .expect("build feed");

    assert!(matches!(
        feed.fetch_latest().await,
        Err(FetchError::Status { status: 500 })
    ));
}

#[tokio::test]
async fn error_envelope_is_a_payload_error() {
    let app = Router::new().route(
        "/v1/latest-news",
        get(|| async { r#"{"status":"error","msg":"quota exceeded"}"# }),
    );
    let addr = serve(app).await;
    let feed = CurrentsFeed::from_config(&config_for(addr, "/v1/latest-news"), "test-key")
        .expect("build feed");

    assert!(matches!(
        feed.fetch_latest().await,
        Err(FetchError::Payload(_))
    ));
}
