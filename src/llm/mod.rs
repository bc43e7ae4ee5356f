pub mod prompts;


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::Config;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// One role-tagged turn of a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One candidate source returned by web research.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSource {
    pub title: String,
    pub url: String,
    pub kind: String,
}

/// Raw intent classification as reported by the model. The resolver in
/// `bot::intent` is responsible for canonicalizing the topic name and for
/// the fail-closed fallback.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IntentClassification {
    pub intent: String,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: String,
}

fn default_confidence() -> String {
    "low".to_string()
}

/// Structured metadata extracted from a reference page.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MetadataExtraction {
    #[serde(default)]
    pub difficulty_score: Option<f64>,
    #[serde(default)]
    pub player_count: Option<String>,
}

/// A tutorial video found via web search.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TutorialVideo {
    pub video_url: String,
    #[serde(default)]
    pub video_title: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    temperature: f32,
}

/// Client for the external LLM completion service. All parses of model
/// output are defensive: malformed responses degrade to safe fallbacks at
/// the call sites, never to propagated parse errors.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_base: String,
    api_key: Option<String>,
    chat_model: String,
    intent_model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            api_base: config.openai.api_base.trim_end_matches('/').to_string(),
            api_key: config.openai.api_key(),
            chat_model: config.openai.chat_model.clone(),
            intent_model: config.openai.intent_model.clone(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Free-text chat completion with the main model.
    #[inline]
    pub fn chat(&self, messages: &[ChatTurn]) -> Result<String> {
        self.chat_with_model(&self.chat_model, messages)
    }

    #[inline]
    pub fn chat_with_model(&self, model: &str, messages: &[ChatTurn]) -> Result<String> {
        let request = ChatCompletionRequest {
            model,
            messages,
            temperature: 0.2,
        };
        let request_json = serde_json::to_string(&request)
            .context("Failed to serialize chat completion request")?;

        let response_text = self
            .post_json("/chat/completions", &request_json)
            .context("Chat completion request failed")?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }

    /// Completion through the responses contract, optionally with the
    /// service's web-search tool enabled. Returns the concatenated output
    /// text.
    #[inline]
    pub fn responses_text(&self, input: &str, web_search: bool) -> Result<String> {
        let tools = web_search.then(|| vec![serde_json::json!({"type": "web_search"})]);
        let request = ResponsesRequest {
            model: &self.chat_model,
            input,
            tools,
            temperature: 0.1,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize responses request")?;

        let response_text = self
            .post_json("/responses", &request_json)
            .context("Responses request failed")?;

        let value: serde_json::Value =
            serde_json::from_str(&response_text).context("Failed to parse responses payload")?;

        Ok(collect_output_text(&value))
    }

    /// Discover candidate sources for a topic via web search. This output
    /// is untrusted: parse failures and request failures both fall back to
    /// an empty list so research can proceed from deterministic seeds.
    #[inline]
    pub fn research_sources(&self, topic: &str, max_sources: usize) -> Vec<DiscoveredSource> {
        let prompt = prompts::WEB_RESEARCH_PROMPT.replace("{topic}", topic);

        let content = match self.responses_text(&prompt, true) {
            Ok(content) => content,
            Err(e) => {
                warn!("Web research call failed for '{}': {:#}", topic, e);
                return Vec::new();
            }
        };

        let Some(value) = extract_json_block(&content) else {
            warn!("Web research returned no parseable JSON for '{}'", topic);
            return Vec::new();
        };

        let mut cleaned = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for entry in value
            .get("sources")
            .and_then(|s| s.as_array())
            .into_iter()
            .flatten()
        {
            let url = entry
                .get("url")
                .and_then(|u| u.as_str())
                .unwrap_or_default()
                .trim()
                .to_string();
            if url.is_empty() || !seen.insert(url.clone()) {
                continue;
            }
            let title = entry
                .get("title")
                .and_then(|t| t.as_str())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| url.clone());
            let kind = entry
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("other")
                .trim()
                .to_lowercase();
            cleaned.push(DiscoveredSource { title, url, kind });
            if cleaned.len() >= max_sources {
                break;
            }
        }

        debug!("Web research found {} sources for '{}'", cleaned.len(), topic);
        cleaned
    }

    /// Classify a user utterance. Errors propagate so the resolver can
    /// apply its fail-closed fallback.
    #[inline]
    pub fn classify_intent(
        &self,
        user_text: &str,
        known_topics: &[String],
    ) -> Result<IntentClassification> {
        let topics_list = if known_topics.is_empty() {
            "none".to_string()
        } else {
            known_topics.join(", ")
        };
        let prompt = prompts::INTENT_CLASSIFICATION_PROMPT
            .replace("{topics_list}", &topics_list)
            .replace("{user_text}", user_text);

        let content = self.chat_with_model(&self.intent_model, &[ChatTurn::user(prompt)])?;

        let value = extract_json_block(&content)
            .ok_or_else(|| anyhow::anyhow!("Intent response contained no JSON"))?;
        let classification: IntentClassification = serde_json::from_value(value)
            .context("Intent response had an unexpected shape")?;

        debug!(
            "Intent classified: {} (topic: {:?}, confidence: {})",
            classification.intent, classification.topic_name, classification.confidence
        );
        Ok(classification)
    }

    /// Generate a short library-listing description from source excerpts.
    #[inline]
    pub fn describe_topic(&self, topic: &str, sources_summary: &str) -> Result<String> {
        let summary = clip_chars(sources_summary, 2000);
        let prompt = prompts::TOPIC_DESCRIPTION_PROMPT
            .replace("{topic}", topic)
            .replace("{sources_summary}", &summary);

        let description = self.chat_with_model(&self.intent_model, &[ChatTurn::user(prompt)])?;
        Ok(description.trim().to_string())
    }

    /// Extract difficulty and player count from fetched reference-page
    /// content. Missing or malformed values degrade to None.
    #[inline]
    pub fn extract_topic_metadata(&self, topic: &str, page_content: &str) -> MetadataExtraction {
        let content = clip_chars(page_content, 8000);
        let prompt = prompts::METADATA_EXTRACTION_PROMPT
            .replace("{topic}", topic)
            .replace("{page_content}", &content);

        let response = match self.chat_with_model(&self.intent_model, &[ChatTurn::user(prompt)]) {
            Ok(response) => response,
            Err(e) => {
                warn!("Metadata extraction failed for '{}': {:#}", topic, e);
                return MetadataExtraction::default();
            }
        };

        extract_json_block(&response)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Find a tutorial video via web search. Returns None unless the model
    /// produced a plausible video URL.
    #[inline]
    pub fn find_tutorial_video(&self, topic: &str) -> Option<TutorialVideo> {
        let prompt = prompts::TUTORIAL_VIDEO_PROMPT.replace("{topic}", topic);

        let content = match self.responses_text(&prompt, true) {
            Ok(content) => content,
            Err(e) => {
                warn!("Tutorial video search failed for '{}': {:#}", topic, e);
                return None;
            }
        };

        let value = extract_json_block(&content)?;
        let video: TutorialVideo = serde_json::from_value(value).ok()?;
        if video.video_url.trim().is_empty() {
            return None;
        }
        Some(video)
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = format!("{}{}", self.api_base, path);
        self.make_request_with_retry(|| {
            let mut req = self
                .agent
                .post(&url)
                .header("Content-Type", "application/json");
            if let Some(key) = &self.api_key {
                req = req.header("Authorization", &format!("Bearer {key}"));
            }
            req.send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match request_fn() {
                Ok(response_text) => {
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.api_base);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

/// Truncate to a maximum number of characters on a char boundary.
#[inline]
pub fn clip_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Pull the text out of a responses payload: `output_text` when present,
/// otherwise the concatenated `output_text` blocks of message items.
fn collect_output_text(value: &serde_json::Value) -> String {
    if let Some(text) = value.get("output_text").and_then(|t| t.as_str()) {
        return text.to_string();
    }

    let mut chunks = Vec::new();
    for item in value
        .get("output")
        .and_then(|o| o.as_array())
        .into_iter()
        .flatten()
    {
        if item.get("type").and_then(|t| t.as_str()) != Some("message") {
            continue;
        }
        for block in item
            .get("content")
            .and_then(|c| c.as_array())
            .into_iter()
            .flatten()
        {
            if block.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    chunks.push(text.to_string());
                }
            }
        }
    }
    chunks.join("\n")
}

/// Extract a JSON object from model output, tolerating a fenced
/// ```json block or surrounding prose. Returns None when nothing parses.
#[inline]
pub fn extract_json_block(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(fence_start) = trimmed.find("```") {
        let after_fence = &trimmed[fence_start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let body = body.split("```").next().unwrap_or(body);
        if let Ok(value) = serde_json::from_str(body.trim()) {
            return Some(value);
        }
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // Last resort: first balanced-looking object in the text.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
