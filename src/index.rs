//! In-memory embedding index.
//!
//! Holds `(Chunk, vector)` pairs in insertion order together with the
//! provider used to embed them, so queries are embedded by the same model.
//! The index is built once and replaced wholesale by [`EmbeddingIndex::rebuild`];
//! there is no per-chunk update or delete.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::Chunk;
use crate::search::max_marginal_relevance;

/// A retrieved chunk and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct EmbeddingIndex {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    entries: Vec<IndexEntry>,
}

impl EmbeddingIndex {
    /// An index with no chunks that embeds queries with `provider`.
    pub fn empty(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            entries: Vec::new(),
        }
    }

    /// Embed `chunks` in batches of `batch_size` and index them.
    pub async fn build(
        provider: Arc<dyn EmbeddingProvider>,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self> {
        let mut index = Self::empty(provider, batch_size);
        index.entries = index.embed_chunks(chunks).await?;
        Ok(index)
    }

    /// An empty index sharing this one's provider.
    pub fn empty_like(&self) -> Self {
        Self::empty(self.provider.clone(), self.batch_size)
    }

    /// Replace the whole contents with `chunks`.
    ///
    /// On failure the previous contents are left in place.
    pub async fn rebuild(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let entries = self.embed_chunks(chunks).await?;
        self.entries = entries;
        Ok(())
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::with_capacity(chunks.len());
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.provider.embed(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            entries.extend(
                batch
                    .into_iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexEntry { chunk, vector }),
            );
        }

        log::debug!(
            "embedded {} chunk(s) with {}",
            entries.len(),
            self.provider.model_name()
        );
        Ok(entries)
    }

    /// Retrieve up to `k` chunks for `query`.
    ///
    /// The `fetch_k` nearest chunks by cosine similarity are re-ranked with
    /// maximal marginal relevance. `fetch_k` below `k` is raised to `k`.
    /// Hits come back in selection order.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let fetch_k = fetch_k.max(k);

        let query_vec = self.provider.embed_query(query).await?;

        let mut nearest: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&query_vec, &e.vector)))
            .collect();
        nearest.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        nearest.truncate(fetch_k);

        let candidates: Vec<&[f32]> = nearest
            .iter()
            .map(|(i, _)| self.entries[*i].vector.as_slice())
            .collect();
        let selected = max_marginal_relevance(&query_vec, &candidates, k, lambda);

        Ok(selected
            .into_iter()
            .map(|pos| {
                let (entry_idx, score) = nearest[pos];
                SearchHit {
                    chunk: self.entries[entry_idx].chunk.clone(),
                    score,
                }
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        self.provider.clone()
    }
}
