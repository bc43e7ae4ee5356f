use super::*;
use crate::config::Config;
use std::path::PathBuf;

fn test_config() -> Config {
    let mut config = Config {
        openai: crate::config::OpenAiConfig::default(),
        crawler: crate::config::CrawlerConfig::default(),
        chunking: chunking::ChunkingConfig::default(),
        server: crate::config::ServerConfig::default(),
        base_dir: PathBuf::new(),
    };
    config.openai.api_base = "http://localhost:11223/v1/".to_string();
    config.openai.embedding_model = "test-embedding".to_string();
    config.openai.embedding_batch_size = 128;
    config
}

#[test]
fn client_configuration() {
    let client = EmbeddingClient::new(&test_config());

    assert_eq!(client.model, "test-embedding");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.api_base, "http://localhost:11223/v1");
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = EmbeddingClient::new(&test_config()).with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn empty_batch_short_circuits_without_network() {
    let client = EmbeddingClient::new(&test_config());
    let embeddings = client.embed_batch(&[]).expect("empty batch succeeds");
    assert!(embeddings.is_empty());
}

#[test]
fn response_vectors_are_reassembled_by_index() {
    // The service reports an index per vector; out-of-order data must not
    // break the positional join back to chunk metadata.
    let response: EmbedResponse = serde_json::from_str(
        r#"{"data": [
            {"index": 1, "embedding": [0.4, 0.5]},
            {"index": 0, "embedding": [0.1, 0.2]}
        ]}"#,
    )
    .expect("valid response JSON");

    let mut by_index = response.data;
    by_index.sort_by_key(|d| d.index);
    let vectors: Vec<Vec<f32>> = by_index.into_iter().map(|d| d.embedding).collect();

    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.4, 0.5]]);
}
