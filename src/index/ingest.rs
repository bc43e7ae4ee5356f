use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::sqlite::{Database, Source, SourceKind, Topic};
use crate::embeddings::EmbeddingClient;
use crate::embeddings::chunking::chunk_with_config;
use crate::index::{ChunkRecord, VectorIndex};

/// Builds a topic's retrieval index from its materialized sources.
/// The whole chunk set is replaced on re-ingestion; chunk metadata and
/// embeddings are assembled from one in-memory list in a single pass so
/// the positional correspondence between the two artifacts cannot drift.
pub struct Ingestor<'a> {
    config: &'a Config,
    database: &'a Database,
    embedder: &'a EmbeddingClient,
}

impl<'a> Ingestor<'a> {
    #[inline]
    pub fn new(config: &'a Config, database: &'a Database, embedder: &'a EmbeddingClient) -> Self {
        Self {
            config,
            database,
            embedder,
        }
    }

    /// Chunk, embed, and publish the index for one topic. Returns the
    /// number of indexed chunks; zero means no usable text was found and
    /// no index was published.
    #[inline]
    pub async fn ingest_topic(&self, topic: &Topic) -> Result<usize> {
        let sources = self.database.list_sources(topic.id).await?;

        let mut records: Vec<ChunkRecord> = Vec::new();
        let mut texts: Vec<String> = Vec::new();

        for source in sources.iter().filter(|s| s.is_materialized()) {
            let Some(text) = self.source_text(source) else {
                continue;
            };

            let chunks = chunk_with_config(&text, &self.config.chunking)
                .context("Chunking configuration is invalid")?;
            if chunks.is_empty() {
                debug!("Source {} produced no chunks", source.id);
                continue;
            }

            let title = source
                .title
                .clone()
                .or_else(|| source.url.clone())
                .unwrap_or_else(|| format!("Source {}", source.id));
            let origin_url = self.citation_url(topic.id, source);

            for (i, chunk) in chunks.into_iter().enumerate() {
                records.push(ChunkRecord {
                    id: records.len(),
                    label: format!("{} - chunk {}", title, i + 1),
                    content: chunk.clone(),
                    origin_url: origin_url.clone(),
                });
                texts.push(chunk);
            }
        }

        if records.is_empty() {
            info!("No indexable text for topic {} ({})", topic.id, topic.name);
            return Ok(0);
        }

        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .context("Failed to embed topic chunks")?;

        let index = VectorIndex::build(records, embeddings)?;
        index.publish(&self.config.topic_index_dir(topic.id))?;

        Ok(index.len())
    }

    /// Citation target for a source: the original URL when known, else the
    /// stored copy served by the file-serving collaborator.
    fn citation_url(&self, topic_id: i64, source: &Source) -> String {
        if let Some(url) = &source.url {
            return url.clone();
        }
        let filename = source
            .local_path
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("files");
        self.config.stored_file_url(topic_id, filename)
    }

    /// Extract the chunkable text for a materialized source, or None when
    /// the file cannot be read. A single unreadable source never aborts
    /// the ingest.
    fn source_text(&self, source: &Source) -> Option<String> {
        let path_str = source.local_path.as_deref()?;
        let path = Path::new(path_str);

        let text = match source.kind {
            // Web pages store a plain-text extraction next to the raw HTML.
            SourceKind::WebPage => read_text_file(&path.with_extension("txt")),
            SourceKind::Document => {
                if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) {
                    match pdf_extract::extract_text(path) {
                        Ok(text) => Some(text),
                        Err(e) => {
                            warn!("Failed to extract text from {}: {}", path.display(), e);
                            None
                        }
                    }
                } else {
                    read_text_file(path)
                }
            }
            SourceKind::Video | SourceKind::Other => read_text_file(path),
            SourceKind::Link => None,
        }?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn read_text_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}
