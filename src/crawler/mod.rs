pub mod extractor;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use self::extractor::html_to_text;
use crate::config::Config;
use crate::database::sqlite::{
    Database, NewSource, SourceKind, Topic, TopicMetadata, TopicQueries, TopicStatus,
};
use crate::embeddings::EmbeddingClient;
use crate::index::Ingestor;
use crate::llm::{MetadataExtraction, OpenAiClient, clip_chars};

const BGG_SEARCH_API: &str = "https://boardgamegeek.com/xmlapi2/search";
const YOUTUBE_TIMEDTEXT_API: &str = "https://video.google.com/timedtext";

static YOUTUBE_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})")
            .expect("static regex compiles"),
        Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").expect("static regex compiles"),
    ]
});

/// One fetched HTTP resource.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedPage {
    #[inline]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// HTTP client for document fetches, with a bounded timeout and an
/// identifying user-agent string.
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    #[inline]
    pub fn new(user_agent: &str, timeout_seconds: u64) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_seconds)))
            .user_agent(user_agent)
            .build()
            .into();
        Self { agent }
    }

    /// GET a URL. Non-2xx statuses and transport failures are errors; the
    /// caller decides whether that degrades the item or aborts.
    #[inline]
    pub fn get(&self, url: &str) -> Result<FetchedPage> {
        debug!("GET {}", url);
        match self.agent.get(url).call() {
            Ok(mut response) => {
                let content_type = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_lowercase());
                let bytes = response
                    .body_mut()
                    .read_to_vec()
                    .with_context(|| format!("Failed to read response body from {url}"))?;
                Ok(FetchedPage {
                    content_type,
                    bytes,
                })
            }
            Err(ureq::Error::StatusCode(code)) => Err(anyhow!("HTTP error {}", code)),
            Err(e) => Err(anyhow::Error::from(e))
                .with_context(|| format!("Failed to make HTTP request to {url}")),
        }
    }
}

/// Validate and normalize a URL.
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {url_str}"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}

/// Outcome of one research request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchStatus {
    /// A full run happened; counts of materialized vs link-only sources.
    Completed { downloaded: usize, linked: usize },
    /// The topic was already ready; nothing was fetched.
    AlreadyResearched,
    /// Another research run for this topic is underway.
    InProgress,
}

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub topic: Topic,
    pub status: ResearchStatus,
}

/// The research workflow: discover, fetch, classify, and persist sources
/// for a topic, then build its retrieval index.
pub struct Researcher<'a> {
    config: &'a Config,
    database: &'a Database,
    llm: &'a OpenAiClient,
    embedder: &'a EmbeddingClient,
    http: HttpClient,
}

impl<'a> Researcher<'a> {
    #[inline]
    pub fn new(
        config: &'a Config,
        database: &'a Database,
        llm: &'a OpenAiClient,
        embedder: &'a EmbeddingClient,
    ) -> Self {
        let http = HttpClient::new(
            &config.crawler.user_agent,
            config.crawler.timeout_seconds,
        );
        Self {
            config,
            database,
            llm,
            embedder,
            http,
        }
    }

    /// Research a topic by name. At-most-once ingestion: a ready topic
    /// short-circuits, and the early flip to `researching` acts as an
    /// advisory lock against concurrent runs for the same name.
    #[inline]
    pub async fn research(&self, topic_name: &str) -> Result<ResearchOutcome> {
        let topic = self.database.get_or_create_topic(topic_name).await?;

        match topic.status {
            TopicStatus::Ready => {
                info!("Topic '{}' is already researched", topic.name);
                return Ok(ResearchOutcome {
                    topic,
                    status: ResearchStatus::AlreadyResearched,
                });
            }
            TopicStatus::Researching => {
                info!("Topic '{}' research already in progress", topic.name);
                return Ok(ResearchOutcome {
                    topic,
                    status: ResearchStatus::InProgress,
                });
            }
            TopicStatus::Created => {}
        }

        let store_dir = self.config.topic_store_dir(topic.id);
        std::fs::create_dir_all(&store_dir)
            .with_context(|| format!("Failed to create {}", store_dir.display()))?;
        TopicQueries::set_store_dir(
            self.database.pool(),
            topic.id,
            &store_dir.to_string_lossy(),
        )
        .await?;
        self.database
            .update_topic_status(topic.id, TopicStatus::Researching)
            .await?;

        info!("Starting research for '{}' (topic {})", topic.name, topic.id);

        match self.run_research(&topic, &store_dir).await {
            Ok((downloaded, linked)) => {
                self.database
                    .update_topic_status(topic.id, TopicStatus::Ready)
                    .await?;
                TopicQueries::stamp_researched(self.database.pool(), topic.id).await?;

                let topic = self
                    .database
                    .get_topic_by_id(topic.id)
                    .await?
                    .ok_or_else(|| anyhow!("Topic vanished during research"))?;

                info!(
                    "Research complete for '{}': {} downloaded, {} linked",
                    topic.name, downloaded, linked
                );
                Ok(ResearchOutcome {
                    topic,
                    status: ResearchStatus::Completed { downloaded, linked },
                })
            }
            Err(e) => {
                error!("Research failed for '{}': {:#}", topic.name, e);
                // Leave the topic retryable.
                if let Err(reset) = self
                    .database
                    .update_topic_status(topic.id, TopicStatus::Created)
                    .await
                {
                    error!("Failed to reset topic {} status: {:#}", topic.id, reset);
                }
                Err(e)
            }
        }
    }

    async fn run_research(&self, topic: &Topic, store_dir: &Path) -> Result<(usize, usize)> {
        // Deterministic reference lookup first, so the metadata extraction
        // works from a real page instead of a guessed URL.
        let bgg_url = if self.config.crawler.include_seed_urls {
            let http = self.http.clone();
            let name = topic.name.clone();
            tokio::task::spawn_blocking(move || bgg_canonical_url(&http, &name))
                .await
                .ok()
                .flatten()
        } else {
            None
        };

        // Three independent discovery calls, dispatched concurrently and
        // joined before seeding. No shared mutable state between branches.
        let llm = self.llm.clone();
        let name = topic.name.clone();
        let max_sources = self.config.crawler.max_sources;
        let sources_task =
            tokio::task::spawn_blocking(move || llm.research_sources(&name, max_sources));

        let llm = self.llm.clone();
        let http = self.http.clone();
        let name = topic.name.clone();
        let meta_url = bgg_url.clone();
        let metadata_task = tokio::task::spawn_blocking(move || {
            let Some(url) = meta_url else {
                return MetadataExtraction::default();
            };
            match http.get(&url) {
                Ok(page) => llm.extract_topic_metadata(&name, &html_to_text(&page.text())),
                Err(e) => {
                    warn!("Failed to fetch reference page {}: {:#}", url, e);
                    MetadataExtraction::default()
                }
            }
        });

        let llm = self.llm.clone();
        let name = topic.name.clone();
        let video_task = tokio::task::spawn_blocking(move || llm.find_tutorial_video(&name));

        let (discovered, metadata, video) = tokio::join!(sources_task, metadata_task, video_task);
        let discovered = discovered.unwrap_or_default();
        let metadata = metadata.unwrap_or_default();
        let video = video.ok().flatten().filter(|v| {
            // Only keep video URLs we can actually identify.
            extract_youtube_id(&v.video_url).is_some()
        });

        // Deterministic seeds first, then discovered sources; research never
        // fully depends on the web-search step.
        let mut seeds: Vec<(String, String)> = Vec::new();
        if self.config.crawler.include_seed_urls {
            seeds.push((
                format!("{} (Wikipedia)", topic.name),
                wikipedia_seed_url(&topic.name),
            ));
            if let Some(url) = &bgg_url {
                seeds.push((format!("{} (BoardGameGeek)", topic.name), url.clone()));
            }
        }
        if let Some(video) = &video {
            let title = video
                .video_title
                .clone()
                .unwrap_or_else(|| format!("How to play {}", topic.name));
            seeds.push((title, video.video_url.clone()));
        }
        for source in discovered {
            seeds.push((source.title, source.url));
        }

        let unique = dedup_by_url(seeds);
        info!("Fetching {} unique sources for '{}'", unique.len(), topic.name);

        let progress = ProgressBar::new(unique.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}") {
            progress.set_style(style);
        }

        let mut downloaded = 0;
        let mut linked = 0;
        for (title, url) in &unique {
            progress.set_message(title.clone());
            let (d, l) = self.save_source(topic, store_dir, title, url).await?;
            downloaded += d;
            linked += l;
            progress.inc(1);
        }
        progress.finish_and_clear();

        // A missing index degrades later querying but does not break it;
        // the research run still reports the sources it saved.
        let ingestor = Ingestor::new(self.config, self.database, self.embedder);
        match ingestor.ingest_topic(topic).await {
            Ok(chunks) => info!("Indexed {} chunks for '{}'", chunks, topic.name),
            Err(e) => error!("Failed to build index for '{}': {:#}", topic.name, e),
        }

        if let Err(e) = self.synthesize_description(topic).await {
            error!("Failed to generate description for '{}': {:#}", topic.name, e);
        }

        let metadata = TopicMetadata {
            difficulty: metadata.difficulty_score,
            player_count: metadata.player_count,
            reference_url: bgg_url,
            video_url: video.map(|v| v.video_url),
        };
        if metadata != TopicMetadata::default() {
            TopicQueries::update_metadata(self.database.pool(), topic.id, &metadata).await?;
        }

        Ok((downloaded, linked))
    }

    /// Fetch and classify one source. Download if video-with-captions,
    /// PDF, or web page; otherwise record a bare link. Returns the
    /// (downloaded, linked) increments. A single unreachable source never
    /// aborts the run.
    async fn save_source(
        &self,
        topic: &Topic,
        store_dir: &Path,
        title: &str,
        url: &str,
    ) -> Result<(usize, usize)> {
        if let Some(video_id) = extract_youtube_id(url) {
            if let Some(captions) = fetch_youtube_captions(&self.http, &video_id) {
                let path = unique_path(store_dir, &format!("youtube_{video_id}.txt"));
                std::fs::write(
                    &path,
                    format!("YouTube Video: {title}\nURL: {url}\n\n{captions}"),
                )
                .with_context(|| format!("Failed to write {}", path.display()))?;
                self.add_source(topic, SourceKind::Video, url, title, Some(&path))
                    .await?;
                return Ok((1, 0));
            }
            self.add_source(topic, SourceKind::Video, url, title, None)
                .await?;
            return Ok((0, 1));
        }

        let page = match self.http.get(url) {
            Ok(page) => page,
            Err(e) => {
                warn!("GET {} failed: {:#}", url, e);
                self.add_source(topic, SourceKind::Link, url, title, None)
                    .await?;
                return Ok((0, 1));
            }
        };

        let content_type = page.content_type.as_deref().unwrap_or_default();
        if content_type.contains("application/pdf") || url.to_lowercase().ends_with(".pdf") {
            let filename = with_extension(&filename_from_url(url, "doc"), "pdf");
            let path = unique_path(store_dir, &filename);
            std::fs::write(&path, &page.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            self.add_source(topic, SourceKind::Document, url, title, Some(&path))
                .await?;
            return Ok((1, 0));
        }

        // Anything else is treated as a web page: store the raw HTML plus a
        // plain-text extraction sibling for the chunker.
        let filename = with_extension(&filename_from_url(url, "page"), "html");
        let html_path = unique_path(store_dir, &filename);
        std::fs::write(&html_path, &page.bytes)
            .with_context(|| format!("Failed to write {}", html_path.display()))?;
        let text = html_to_text(&page.text());
        std::fs::write(html_path.with_extension("txt"), text)
            .with_context(|| format!("Failed to write text extraction for {url}"))?;
        self.add_source(topic, SourceKind::WebPage, url, title, Some(&html_path))
            .await?;
        Ok((1, 0))
    }

    async fn add_source(
        &self,
        topic: &Topic,
        kind: SourceKind,
        url: &str,
        title: &str,
        local_path: Option<&Path>,
    ) -> Result<()> {
        self.database
            .add_source(NewSource {
                topic_id: topic.id,
                kind,
                url: Some(url.to_string()),
                title: Some(title.to_string()),
                local_path: local_path.map(|p| p.to_string_lossy().into_owned()),
            })
            .await?;
        Ok(())
    }

    /// Ask the LLM for a short library description based on excerpts from
    /// the first few materialized sources.
    async fn synthesize_description(&self, topic: &Topic) -> Result<()> {
        let sources = self.database.list_sources(topic.id).await?;

        let mut parts = Vec::new();
        for source in sources.iter().filter(|s| s.is_materialized()).take(5) {
            let Some(path) = source.local_path.as_deref() else {
                continue;
            };
            let text_path = if path.ends_with(".txt") {
                PathBuf::from(path)
            } else {
                Path::new(path).with_extension("txt")
            };
            let Ok(content) = std::fs::read_to_string(&text_path) else {
                continue;
            };
            parts.push(format!(
                "Source: {}\n{}",
                source.title.as_deref().unwrap_or("Unknown"),
                clip_chars(&content, 500)
            ));
        }

        if parts.is_empty() {
            debug!("No text excerpts available to describe '{}'", topic.name);
            return Ok(());
        }

        let summary = parts.join("\n\n");
        let llm = self.llm.clone();
        let name = topic.name.clone();
        let description = tokio::task::spawn_blocking(move || llm.describe_topic(&name, &summary))
            .await
            .context("Description task failed")??;

        if description.is_empty() {
            return Ok(());
        }
        TopicQueries::update_description(self.database.pool(), topic.id, &description).await?;
        Ok(())
    }
}

/// Merge candidate (title, url) pairs, deduplicating by exact URL while
/// preserving first-seen order and the first-seen title.
#[inline]
pub fn dedup_by_url(candidates: Vec<(String, String)>) -> Vec<(String, String)> {
    candidates
        .into_iter()
        .unique_by(|(_, url)| url.clone())
        .collect()
}

/// Canonical encyclopedia seed URL derived mechanically from the name.
#[inline]
pub fn wikipedia_seed_url(name: &str) -> String {
    let slug = name.trim().replace(' ', "_");
    Url::parse("https://en.wikipedia.org/wiki/")
        .and_then(|base| base.join(&slug))
        .map(String::from)
        .unwrap_or_else(|_| format!("https://en.wikipedia.org/wiki/{slug}"))
}

/// Canonical BoardGameGeek URL via the XML search API. Any failure (network,
/// auth-gated API, unparseable payload) degrades to None.
#[inline]
pub fn bgg_canonical_url(http: &HttpClient, name: &str) -> Option<String> {
    let mut search = Url::parse(BGG_SEARCH_API).ok()?;
    search
        .query_pairs_mut()
        .append_pair("query", name)
        .append_pair("type", "boardgame")
        .append_pair("exact", "1");

    let page = match http.get(search.as_str()) {
        Ok(page) => page,
        Err(e) => {
            warn!("BGG search failed for '{}': {:#}", name, e);
            return None;
        }
    };

    let id = parse_bgg_item_id(&page.text())?;
    Some(format!("https://boardgamegeek.com/boardgame/{id}"))
}

/// First `<item id="...">` of a BGG XML API search response.
#[inline]
pub fn parse_bgg_item_id(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.name().as_ref() == b"item" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"id" {
                        return String::from_utf8(attr.value.into_owned())
                            .ok()
                            .filter(|id| !id.is_empty());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Video id from the known video-hosting URL patterns.
#[inline]
pub fn extract_youtube_id(url: &str) -> Option<String> {
    YOUTUBE_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fetch the caption track for a video, if one is published.
#[inline]
pub fn fetch_youtube_captions(http: &HttpClient, video_id: &str) -> Option<String> {
    let mut url = Url::parse(YOUTUBE_TIMEDTEXT_API).ok()?;
    url.query_pairs_mut()
        .append_pair("lang", "en")
        .append_pair("v", video_id);

    match http.get(url.as_str()) {
        Ok(page) => parse_timedtext(&page.text()),
        Err(e) => {
            warn!("Could not fetch captions for video {}: {:#}", video_id, e);
            None
        }
    }
}

/// Concatenate the text nodes of a timedtext caption document.
#[inline]
pub fn parse_timedtext(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut parts = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Derive a safe local filename from a URL path, with a fallback stem.
#[inline]
pub fn filename_from_url(url: &str, fallback: &str) -> String {
    let candidate = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .unwrap_or_default();

    let sanitized: String = candidate
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed
    }
}

/// Ensure a filename carries the expected extension.
#[inline]
pub fn with_extension(filename: &str, extension: &str) -> String {
    if filename
        .to_lowercase()
        .ends_with(&format!(".{extension}"))
    {
        filename.to_string()
    } else {
        format!("{filename}.{extension}")
    }
}

/// Avoid clobbering a previously saved file with the same name.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (filename.to_string(), String::new()),
    };

    for n in 1.. {
        let candidate = dir.join(format!("{stem}-{n}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}
