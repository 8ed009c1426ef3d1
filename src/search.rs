//! Retrieval: maximal marginal relevance selection and the `docqa search` command.
//!
//! [`EmbeddingIndex::search`](crate::index::EmbeddingIndex::search) narrows
//! the index to the `fetch_k` chunks nearest the query, then
//! [`max_marginal_relevance`] picks `k` of them, trading relevance to the
//! query against similarity to what has already been picked:
//!
//! ```text
//! score(c) = λ · sim(q, c) − (1 − λ) · max_{s ∈ selected} sim(c, s)
//! ```
//!
//! With `λ = 1.0` this is plain nearest-neighbour ordering; lower values
//! spread the picks across different parts of the documents.

use anyhow::Result;

use crate::config::{Config, RetrievalConfig};
use crate::embedding::cosine_similarity;
use crate::engine::AnswerEngine;

/// Retrieval parameters used for every question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 10,
            fetch_k: 30,
            lambda_mult: 0.5,
        }
    }
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.k,
            fetch_k: config.fetch_k,
            lambda_mult: config.lambda_mult,
        }
    }
}

/// Select up to `k` candidate positions by maximal marginal relevance.
///
/// The first pick is the candidate most similar to `query`. Ties go to the
/// lower position, so the result is deterministic for a given candidate order.
pub fn max_marginal_relevance<C: AsRef<[f32]>>(
    query: &[f32],
    candidates: &[C],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c.as_ref()))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    // Highest similarity to anything already selected, per candidate.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut taken = vec![false; candidates.len()];

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, rel) in relevance.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let score = if selected.is_empty() {
                *rel
            } else {
                lambda * rel - (1.0 - lambda) * redundancy[i]
            };
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }

        let Some((pick, _)) = best else { break };
        taken[pick] = true;
        selected.push(pick);

        for (i, red) in redundancy.iter_mut().enumerate() {
            if !taken[i] {
                let sim = cosine_similarity(candidates[pick].as_ref(), candidates[i].as_ref());
                if sim > *red {
                    *red = sim;
                }
            }
        }
    }

    selected
}

/// Run the `docqa search` command: load the configured documents, index
/// them, and print the chunks retrieval selects for `query`.
pub async fn run_search(
    config: &Config,
    extra_docs: &[String],
    query: &str,
    k: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let engine = AnswerEngine::from_config(config, extra_docs).await?;
    let mut params = engine.retrieval();
    if let Some(k) = k {
        params.k = k;
    }

    let hits = engine
        .index()
        .search(query, params.k, params.fetch_k, params.lambda_mult)
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} (page {})",
            i + 1,
            hit.score,
            hit.chunk.source,
            hit.chunk.page + 1
        );
        println!("    excerpt: \"{}\"", excerpt(&hit.chunk.text, 240));
        println!("    chunk: {}", hit.chunk.id);
        println!();
    }

    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
