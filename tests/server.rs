//! Vector service HTTP API, served on an ephemeral port.

use repo_intake_core::chunk::ChunkExtractor;
use repo_intake_core::store::memory::InMemoryVectorStore;
use repo_intake::embedding::HashEmbedder;
use repo_intake::index::VectorIndex;
use repo_intake::server::router;
use serde_json::{json, Value};
use std::sync::Arc;

const SOURCE: &str = "export function parseConfig(path) {\n  return readFile(path);\n}\n\nexport function renderChart(data) {\n  return draw(data.axis);\n}\n";

async fn spawn() -> String {
    let index = VectorIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(HashEmbedder::new(128)),
        8,
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(index)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post(base: &str, route: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, route))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

fn chunks() -> Value {
    let chunks = ChunkExtractor::default().extract("src/app.js", Some("javascript"), SOURCE);
    serde_json::to_value(chunks).unwrap()
}

#[tokio::test]
async fn test_health() {
    let base = spawn().await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_search_delete() {
    let base = spawn().await;

    let (status, body) = post(&base, "/index", json!({ "repoId": "acme/app", "chunks": chunks() })).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["indexedCount"], 2);

    let (_, body) = post(&base, "/index", json!({ "repoId": "acme/app", "chunks": chunks() })).await;
    assert_eq!(body["indexedCount"], 0);

    let (status, body) = post(
        &base,
        "/search",
        json!({ "query": "render chart axis", "repoId": "acme/app", "limit": 1 }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["name"], "renderChart");
    assert_eq!(body["results"][0]["type"], "function");

    let (_, body) = post(
        &base,
        "/search/batch",
        json!({ "queries": ["parse config", "render chart"], "repoId": "acme/app" }),
    )
    .await;
    assert_eq!(body["results"][0]["query"], "parse config");
    assert_eq!(body["results"][0]["matches"][0]["name"], "parseConfig");
    assert_eq!(body["results"][1]["matches"][0]["name"], "renderChart");

    let (_, body) = post(&base, "/delete", json!({ "repoId": "acme/app" })).await;
    assert_eq!(body["deletedCount"], 2);

    let (_, body) = post(&base, "/search", json!({ "query": "parse config", "repoId": "acme/app" })).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_validation_errors() {
    let base = spawn().await;

    let (status, body) = post(&base, "/search", json!({ "query": "   " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "bad_request");

    let queries: Vec<String> = (0..21).map(|i| format!("q{}", i)).collect();
    let (status, _) = post(&base, "/search/batch", json!({ "queries": queries })).await;
    assert_eq!(status, 400);

    let (status, body) = post(&base, "/index", json!({ "repoId": "acme/app" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = post(&base, "/delete", json!({ "repoId": "" })).await;
    assert_eq!(status, 400);
}
