//! Shared fixtures for integration tests: a deterministic bag-of-words
//! embedding service and config wiring against mock servers.

use serde_json::json;
use tempfile::TempDir;
use wiremock::{Request, Respond, ResponseTemplate};

use meeplebot::config::Config;

/// Vocabulary for the fake embedding service. Dimension i of a vector is
/// the number of occurrences of VOCABULARY[i], so texts sharing words get
/// a positive inner product and unrelated texts score zero.
pub const VOCABULARY: [&str; 8] = [
    "players", "setup", "cards", "dice", "victory", "trade", "board", "rules",
];

pub fn embed_text(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    VOCABULARY
        .iter()
        .map(|word| lowered.matches(word).count() as f32)
        .collect()
}

/// Order-preserving mock of the embeddings endpoint.
pub struct BagOfWordsEmbedder;

impl Respond for BagOfWordsEmbedder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("embedding request is JSON");
        let inputs = body["input"].as_array().expect("input array");

        let data: Vec<serde_json::Value> = inputs
            .iter()
            .enumerate()
            .map(|(i, text)| {
                json!({
                    "index": i,
                    "embedding": embed_text(text.as_str().expect("text input")),
                })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

/// A config rooted in a temp dir, pointed at a mock LLM/embedding server,
/// with deterministic seed URLs disabled so tests control the source list.
pub fn test_config(temp_dir: &TempDir, llm_base: &str) -> Config {
    let mut config = Config::load(temp_dir.path()).expect("can load config");
    config.openai.api_base = format!("{llm_base}/v1");
    config.crawler.include_seed_urls = false;
    config.crawler.timeout_seconds = 5;
    config
}
