use std::path::Path;
use std::sync::Arc;

use athena_core::{Client, ClientConfig, ClientError};
use athena_index::{BuilderConfig, IndexBuilder, IndexError, Indexer, StorageBackend};
use athena_llm::mock::MockProvider;

const GUIDE: &str = "\
# Release guide

Tag the release commit, then run the packaging job.

## Rollback

To roll back a release, redeploy the previous tag and invalidate the CDN cache.
";

async fn build_index(root: &Path, provider: &Arc<MockProvider>) {
    let source = root.join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("RELEASE.md"), GUIDE).unwrap();
    std::fs::write(source.join("deploy.py"), "def deploy(tag):\n    run(tag)\n").unwrap();

    let builder = IndexBuilder::new(Arc::clone(provider), BuilderConfig::default());
    let indexer = Indexer::new(StorageBackend::local(root, "dist"), builder, "v1");
    indexer.index_dir(&source, &[], "ops").await.unwrap();
}

#[tokio::test]
async fn open_loads_index_and_answers_with_context() {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(MockProvider::with_responses(vec![
        "Redeploy the previous tag.".into(),
    ]));
    build_index(root.path(), &provider).await;

    let storage = StorageBackend::local(root.path(), "dist");
    let client = Client::open(
        Arc::clone(&provider),
        ClientConfig::default(),
        &storage,
        "dist",
        "ops",
        "v1",
    )
    .await
    .unwrap();
    assert_eq!(client.index().map(athena_memory::VectorIndex::len), Some(2));

    let answer = client.prompt("How do I roll back a release?").await.unwrap();
    assert_eq!(answer, "Redeploy the previous tag.");

    let messages = provider.last_messages();
    assert!(messages[0].content.contains("invalidate the CDN cache"));
    assert!(messages[0].content.contains("RELEASE.md\n\n"));
}

#[tokio::test]
async fn open_without_model_skips_loading() {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(MockProvider::default());
    let storage = StorageBackend::local(root.path(), "dist");

    let client = Client::open(
        Arc::clone(&provider),
        ClientConfig::default(),
        &storage,
        "dist",
        "",
        "v1",
    )
    .await
    .unwrap();
    assert!(client.index().is_none());

    let err = client.prompt("anything").await.unwrap_err();
    assert!(matches!(err, ClientError::IndexNotLoaded));
    assert_eq!(client.base_prompt("", "hi").await.unwrap(), "mock response");
}

#[tokio::test]
async fn open_missing_index_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let storage = StorageBackend::local(root.path(), "dist");

    let result = Client::open(
        Arc::new(MockProvider::default()),
        ClientConfig::default(),
        &storage,
        "dist",
        "missing",
        "v1",
    )
    .await;
    assert!(matches!(
        result,
        Err(ClientError::Index(IndexError::NotFound(_)))
    ));
}

#[tokio::test]
#[ignore = "requires OPENAI_API_KEY and network access"]
async fn live_prompt_against_openai() {
    let config = athena_core::Config::load(Path::new("/nonexistent/athena.toml")).unwrap();
    let provider = Arc::new(config.openai_provider().unwrap());
    let client = Client::new(provider, config.client.clone());

    let answer = client
        .base_prompt("Answer with one word.", "What colour is the sky on a clear day?")
        .await
        .unwrap();
    assert!(!answer.trim().is_empty());
}
