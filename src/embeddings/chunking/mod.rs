#[cfg(test)]
mod tests;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Word-window chunking policy used by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in whitespace-delimited words.
    pub window_words: usize,
    /// Overlap between adjacent windows, in words. Must be smaller than
    /// the window.
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            window_words: 1000,
            overlap_words: 200,
        }
    }
}

/// Split text into overlapping word windows of `window_words` words,
/// advancing by `window_words - overlap_words` per step.
///
/// Pure function of its input: the same text always yields the same
/// chunks. Empty or whitespace-only input yields zero chunks. An overlap
/// that is not smaller than the window would never make progress and is
/// rejected up front.
#[inline]
pub fn chunk_words(text: &str, window_words: usize, overlap_words: usize) -> Result<Vec<String>> {
    if window_words == 0 {
        bail!("Chunk window must be at least one word");
    }
    if overlap_words >= window_words {
        bail!(
            "Chunk overlap ({}) must be smaller than the window ({})",
            overlap_words,
            window_words
        );
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let stride = window_words - overlap_words;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + window_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Chunk with the configured policy.
#[inline]
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    chunk_words(text, config.window_words, config.overlap_words)
}
