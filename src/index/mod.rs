pub mod ingest;


use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::EmbeddingClient;

pub use ingest::Ingestor;

const VECTORS_FILE: &str = "vectors.bin";
const CHUNKS_FILE: &str = "chunks.jsonl";
const VECTORS_MAGIC: &[u8; 4] = b"MBV1";

/// Metadata describing one indexed chunk. Line N of `chunks.jsonl`
/// describes vector N of `vectors.bin`; the two artifacts are always
/// written together from the same in-memory list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: usize,
    /// Human-readable origin label, e.g. "Catan Rules - chunk 3".
    pub label: String,
    pub content: String,
    /// Citation link back to the originating source.
    pub origin_url: String,
}

/// One similarity-search result, highest score first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub label: String,
    pub content: String,
    pub origin_url: String,
    pub score: f32,
}

/// Flat inner-product similarity index over one topic's chunks.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major `records.len() * dimension` values.
    vectors: Vec<f32>,
    records: Vec<ChunkRecord>,
}

impl VectorIndex {
    /// Assemble an index from chunk metadata and their embeddings.
    /// The two lists must be in 1:1 positional correspondence.
    #[inline]
    pub fn build(records: Vec<ChunkRecord>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if records.len() != embeddings.len() {
            bail!(
                "Chunk metadata and embedding counts differ: {} vs {}",
                records.len(),
                embeddings.len()
            );
        }
        if records.is_empty() {
            bail!("Cannot build an index with zero chunks");
        }

        let dimension = embeddings[0].len();
        if dimension == 0 {
            bail!("Embedding dimension must be non-zero");
        }

        let mut vectors = Vec::with_capacity(records.len() * dimension);
        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                bail!(
                    "Embedding {} has dimension {} (expected {})",
                    i,
                    embedding.len(),
                    dimension
                );
            }
            vectors.extend_from_slice(embedding);
        }

        Ok(Self {
            dimension,
            vectors,
            records,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Inner-product similarity search, ordered by non-increasing score.
    /// `skip` paginates past the best `skip` matches; requests for more
    /// results than exist return only what is available.
    #[inline]
    pub fn search(&self, query: &[f32], top_k: usize, skip: usize) -> Vec<SearchHit> {
        if query.len() != self.dimension {
            warn!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| (i, inner_product(query, row)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .skip(skip)
            .take(top_k)
            .map(|(i, score)| {
                let record = &self.records[i];
                SearchHit {
                    label: record.label.clone(),
                    content: record.content.clone(),
                    origin_url: record.origin_url.clone(),
                    score,
                }
            })
            .collect()
    }

    /// Write both artifacts into a temporary sibling directory, then
    /// atomically rename into place. The index and metadata files are never
    /// published independently; a crash mid-build leaves the topic
    /// unindexed, not inconsistently indexed.
    #[inline]
    pub fn publish(&self, dir: &Path) -> Result<()> {
        let parent = dir
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Index directory has no parent: {}", dir.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create index parent: {}", parent.display()))?;

        let build_dir = staging_dir(dir)?;
        if build_dir.exists() {
            fs::remove_dir_all(&build_dir).context("Failed to clear stale index build dir")?;
        }
        fs::create_dir_all(&build_dir)
            .with_context(|| format!("Failed to create index build dir: {}", build_dir.display()))?;

        self.write_vectors(&build_dir.join(VECTORS_FILE))?;
        self.write_chunks(&build_dir.join(CHUNKS_FILE))?;

        if dir.exists() {
            fs::remove_dir_all(dir).context("Failed to remove previous index")?;
        }
        fs::rename(&build_dir, dir).context("Failed to publish index")?;

        info!(
            "Published index with {} chunks ({} dimensions) to {}",
            self.len(),
            self.dimension,
            dir.display()
        );
        Ok(())
    }

    /// Load a published index, validating that the vector count and the
    /// metadata line count still agree. A mismatch means the composite
    /// entity is corrupt and the topic needs a re-ingest.
    #[inline]
    pub fn load(dir: &Path) -> Result<Self> {
        let (dimension, count, vectors) = read_vectors(&dir.join(VECTORS_FILE))?;
        let records = read_chunks(&dir.join(CHUNKS_FILE))?;

        if records.len() != count {
            bail!(
                "Index is corrupt: {} vectors but {} metadata entries",
                count,
                records.len()
            );
        }

        debug!(
            "Loaded index with {} chunks ({} dimensions) from {}",
            count,
            dimension,
            dir.display()
        );

        Ok(Self {
            dimension,
            vectors,
            records,
        })
    }

    fn write_vectors(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(VECTORS_MAGIC)?;
        writer.write_all(&u32::try_from(self.records.len())?.to_le_bytes())?;
        writer.write_all(&u32::try_from(self.dimension)?.to_le_bytes())?;
        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush().context("Failed to flush vector file")?;
        Ok(())
    }

    fn write_chunks(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        for record in &self.records {
            serde_json::to_writer(&mut writer, record)
                .context("Failed to serialize chunk record")?;
            writer.write_all(b"\n")?;
        }
        writer.flush().context("Failed to flush chunk metadata file")?;
        Ok(())
    }
}

fn staging_dir(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid index directory name: {}", dir.display()))?;
    Ok(dir.with_file_name(format!("{name}.building")))
}

fn read_vectors(path: &Path) -> Result<(usize, usize, Vec<f32>)> {
    let file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).context("Vector file truncated")?;
    if &magic != VECTORS_MAGIC {
        bail!("Vector file has an unrecognized header");
    }

    let mut word = [0u8; 4];
    reader.read_exact(&mut word).context("Vector file truncated")?;
    let count = u32::from_le_bytes(word) as usize;
    reader.read_exact(&mut word).context("Vector file truncated")?;
    let dimension = u32::from_le_bytes(word) as usize;

    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .context("Failed to read vector data")?;

    if data.len() != count * dimension * 4 {
        bail!(
            "Vector file is corrupt: expected {} bytes of data, found {}",
            count * dimension * 4,
            data.len()
        );
    }

    let mut vectors = Vec::with_capacity(count * dimension);
    for bytes in data.chunks_exact(4) {
        let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if !value.is_finite() {
            bail!("Vector file contains non-finite values");
        }
        vectors.push(value);
    }

    Ok((dimension, count, vectors))
}

fn read_chunks(path: &Path) -> Result<Vec<ChunkRecord>> {
    let file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read chunk metadata line")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid chunk metadata on line {}", line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Read-side handle over all per-topic indexes. A missing or corrupt
/// index surfaces as "no context available" (empty results), never as a
/// hard failure that aborts the answer flow.
#[derive(Debug, Clone)]
pub struct TopicIndexStore {
    config: Config,
    embedder: EmbeddingClient,
}

impl TopicIndexStore {
    #[inline]
    pub fn new(config: Config, embedder: EmbeddingClient) -> Self {
        Self { config, embedder }
    }

    #[inline]
    pub fn has_index(&self, topic_id: i64) -> bool {
        self.config.topic_index_dir(topic_id).join(VECTORS_FILE).exists()
    }

    /// Embed the query and return the best `top_k` chunks for the topic.
    #[inline]
    pub fn search_topic(&self, topic_id: i64, query: &str, top_k: usize) -> Vec<SearchHit> {
        let dir = self.config.topic_index_dir(topic_id);

        let index = match VectorIndex::load(&dir) {
            Ok(index) => index,
            Err(e) => {
                warn!("No usable index for topic {}: {:#}", topic_id, e);
                return Vec::new();
            }
        };

        let query_vec = match self.embedder.embed_one(query) {
            Ok(vec) => vec,
            Err(e) => {
                warn!("Failed to embed query for topic {}: {:#}", topic_id, e);
                return Vec::new();
            }
        };

        index.search(&query_vec, top_k, 0)
    }
}
