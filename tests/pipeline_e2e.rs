//! Full analysis runs against a mocked GitHub API.

use base64::Engine;
use repo_intake::config::Config;
use repo_intake_core::models::{ChunkType, FileCategory};
use repo_intake_core::embedding::embedding_input;
use repo_intake_core::search::SearchOptions;
use repo_intake_core::store::memory::InMemoryVectorStore;
use repo_intake::embedding::{Embedder, HashEmbedder};
use repo_intake::github::retry::RetryPolicy;
use repo_intake::github::{GitHubClient, RepoRef};
use repo_intake::index::VectorIndex;
use repo_intake::pipeline::AnalysisPipeline;
use repo_intake::progress::{NoProgress, RecordingProgress, RunStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const README: &str = "# App\n\nA small demo application used for analysis.\n";
const INDEX_TS: &str = "// TODO: handle empty input before rendering\nexport function main(args) {\n  return args.length;\n}\n";

fn file_body(content: &str) -> serde_json::Value {
    json!({
        "type": "file",
        "size": content.len(),
        "encoding": "base64",
        "content": base64::engine::general_purpose::STANDARD.encode(content),
    })
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Repository with README.md, src/index.ts and an excluded minified bundle.
async fn three_file_repo(server: &MockServer) {
    mount_json(
        server,
        "/repos/acme/app",
        json!({
            "name": "app",
            "full_name": "acme/app",
            "owner": { "login": "acme" },
            "description": "Demo app",
            "default_branch": "main",
            "language": "TypeScript"
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/git/trees/main"))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                { "path": "README.md", "type": "blob", "size": 2048 },
                { "path": "src", "type": "tree" },
                { "path": "src/index.ts", "type": "blob", "size": 8192 },
                { "path": "dist", "type": "tree" },
                { "path": "dist/bundle.min.js", "type": "blob", "size": 512000 }
            ],
            "truncated": false
        })))
        .mount(server)
        .await;
    mount_json(server, "/repos/acme/app/languages", json!({ "TypeScript": 8192 })).await;
    mount_json(server, "/repos/acme/app/commits", json!([])).await;
    mount_json(
        server,
        "/repos/acme/app/contributors",
        json!([{ "login": "octocat", "contributions": 12 }]),
    )
    .await;
    mount_json(server, "/repos/acme/app/contents/src/index.ts", file_body(INDEX_TS)).await;
}

/// Embedder that outlasts any short run deadline.
struct SlowEmbedder;

#[async_trait::async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow"
    }

    fn dims(&self) -> usize {
        4
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.selection.max_files = 10;
    config.selection.max_total_bytes = 1024 * 1024;
    config
}

fn client(server: &MockServer) -> Arc<GitHubClient> {
    let client = GitHubClient::new(&config().github)
        .unwrap()
        .with_base_url(&server.uri())
        .with_token(None)
        .with_retry_policy(RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            max_rate_limit_wait: Duration::ZERO,
        });
    Arc::new(client)
}

#[tokio::test]
async fn test_three_file_repository() {
    let server = MockServer::start().await;
    three_file_repo(&server).await;
    mount_json(&server, "/repos/acme/app/contents/README.md", file_body(README)).await;

    let progress = RecordingProgress::new();
    let pipeline = AnalysisPipeline::new(client(&server), config());
    let report = pipeline.run(&RepoRef::new("acme", "app"), &progress).await;

    assert_eq!(report.status, RunStatus::Completed, "{:?}", report.errors);
    assert_eq!(report.progress, 100);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let paths: Vec<(&str, FileCategory)> = report
        .selected_files
        .iter()
        .map(|f| (f.path(), f.category))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("README.md", FileCategory::Critical),
            ("src/index.ts", FileCategory::EntryPoint)
        ]
    );

    let stats = report.statistics.as_ref().unwrap();
    assert_eq!(stats.analyzed_files, 2);
    assert!(stats.errors.is_empty());
    assert!(!stats.partial);

    assert_eq!(report.chunk_counts.get(&ChunkType::Function), Some(&1));
    assert_eq!(report.chunk_counts.get(&ChunkType::Comment), Some(&1));
    let function = report
        .chunks
        .iter()
        .find(|c| c.chunk_type == ChunkType::Function)
        .unwrap();
    assert_eq!(function.metadata.name.as_deref(), Some("main"));
    assert_eq!(function.metadata.path, "src/index.ts");

    assert_eq!(report.contributors.len(), 1);
    let doc = report.context_document.as_deref().unwrap();
    assert!(doc.starts_with("# acme/app"));
    assert!(doc.contains("### src/index.ts"));

    assert_eq!(progress.status().as_deref(), Some("completed"));
    let history = progress.history();
    assert!(history.windows(2).all(|w| w[0] <= w[1]), "{:?}", history);
    assert_eq!(history.last(), Some(&100));
}

#[tokio::test]
async fn test_one_failed_file_does_not_fail_the_run() {
    let server = MockServer::start().await;
    three_file_repo(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/contents/README.md"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let pipeline = AnalysisPipeline::new(client(&server), config());
    let report = pipeline.run(&RepoRef::new("acme", "app"), &NoProgress).await;

    assert_eq!(report.status, RunStatus::Completed);
    let stats = report.statistics.as_ref().unwrap();
    assert_eq!(stats.analyzed_files, 1);
    assert_eq!(stats.errors.len(), 1);
    assert_eq!(stats.errors[0].path, "README.md");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, "fetch");
    assert_eq!(report.errors[0].code, "transient");
}

#[tokio::test]
async fn test_missing_repository_fails_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let progress = RecordingProgress::new();
    let pipeline = AnalysisPipeline::new(client(&server), config());
    let report = pipeline.run(&RepoRef::new("acme", "gone"), &progress).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.message.starts_with("Repository not found"));
    assert_eq!(report.errors.last().unwrap().code, "not_found");
    assert!(report.metadata.is_none());
    assert_eq!(progress.status().as_deref(), Some("failed"));
}

#[tokio::test]
async fn test_deadline_keeps_partial_results() {
    let server = MockServer::start().await;
    three_file_repo(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/contents/README.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_body(README))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config();
    config.pipeline.deadline_secs = 1;
    let pipeline = AnalysisPipeline::new(client(&server), config);
    let report = pipeline.run(&RepoRef::new("acme", "app"), &NoProgress).await;

    assert_eq!(report.status, RunStatus::Partial);
    assert!(report.partial);
    assert!(report.metadata.is_some());
    assert_eq!(report.selected_files.len(), 2);
    assert_eq!(report.errors.last().unwrap().code, "deadline_exceeded");
}

#[tokio::test]
async fn test_deadline_during_indexing_keeps_chunks() {
    let server = MockServer::start().await;
    three_file_repo(&server).await;
    mount_json(&server, "/repos/acme/app/contents/README.md", file_body(README)).await;

    let mut config = config();
    config.pipeline.deadline_secs = 1;
    let index = VectorIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(SlowEmbedder),
        16,
    );
    let pipeline = AnalysisPipeline::new(client(&server), config).with_index(index);
    let report = pipeline.run(&RepoRef::new("acme", "app"), &NoProgress).await;

    assert_eq!(report.status, RunStatus::Partial);
    assert!(report.index.is_none());
    assert!(!report.chunks.is_empty());
    assert_eq!(report.chunks.len(), report.chunk_counts.values().sum::<usize>());
    assert!(report.context_document.is_some());
    assert_eq!(report.errors.last().unwrap().code, "deadline_exceeded");
}

#[tokio::test]
async fn test_indexed_chunk_is_top_match_for_its_own_text() {
    let server = MockServer::start().await;
    three_file_repo(&server).await;
    mount_json(&server, "/repos/acme/app/contents/README.md", file_body(README)).await;

    let index = VectorIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(HashEmbedder::new(256)),
        16,
    );
    let pipeline = AnalysisPipeline::new(client(&server), config()).with_index(index.clone());
    let report = pipeline.run(&RepoRef::new("acme", "app"), &NoProgress).await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.index.as_ref().unwrap().indexed_count, report.chunks.len());

    let function = report
        .chunks
        .iter()
        .find(|c| c.chunk_type == ChunkType::Function)
        .unwrap();
    let options = SearchOptions {
        namespace: Some("acme/app".into()),
        ..Default::default()
    };
    let exact = index
        .search(&embedding_input(function), &options)
        .await
        .unwrap();
    assert_eq!(exact[0].id, function.id);
    assert!((exact[0].score - 1.0).abs() < 1e-5, "score {}", exact[0].score);

    let results = index.search(&function.content, &options).await.unwrap();
    assert_eq!(results[0].id, function.id);
    assert!(results[0].score > 0.5);
    assert!(results.iter().skip(1).all(|r| r.score <= results[0].score));

    let elsewhere = SearchOptions {
        namespace: Some("acme/other".into()),
        ..Default::default()
    };
    assert!(index.search(&function.content, &elsewhere).await.unwrap().is_empty());
}
