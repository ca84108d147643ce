//! Vector index stand-ins used when no real vector database is configured

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::{VectorHit, VectorSearchClient};

struct IndexedText {
    sequence: u64,
    tokens: HashSet<String>,
}

/// Keyword-overlap index kept in process memory
///
/// Scores are the fraction of query tokens present in the indexed text,
/// which is enough to exercise ranking and the store/index join without
/// a real embedding model.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: DashMap<String, IndexedText>,
    next_sequence: AtomicU64,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercased word tokens; non-ASCII words are split per character so that
/// unsegmented scripts still produce overlaps.
fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if word.is_ascii() {
            tokens.insert(word.to_lowercase());
        } else {
            tokens.extend(word.chars().map(|c| c.to_lowercase().to_string()));
        }
    }
    tokens
}

#[async_trait]
impl VectorSearchClient for InMemoryVectorIndex {
    async fn embed(&self, text: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            id.clone(),
            IndexedText {
                sequence,
                tokens: tokenize(text),
            },
        );
        debug!("Indexed embedding {}", id);
        Ok(id)
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let mut scored: Vec<(f64, u64, String)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let matches = query_tokens
                    .iter()
                    .filter(|t| entry.value().tokens.contains(*t))
                    .count();
                if matches == 0 {
                    return None;
                }
                let score = matches as f64 / query_tokens.len() as f64;
                Some((score, entry.value().sequence, entry.key().clone()))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, _, id)| VectorHit { id, score })
            .collect())
    }

    async fn delete_embedding(&self, embedding_id: &str) -> Result<bool> {
        Ok(self.entries.remove(embedding_id).is_some())
    }
}

/// Index used when vector search is switched off: nothing is ever indexed
/// and every search comes back empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledVectorIndex;

#[async_trait]
impl VectorSearchClient for DisabledVectorIndex {
    async fn embed(&self, _text: &str) -> Result<String> {
        Err(anyhow!("vector search is not configured"))
    }

    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<VectorHit>> {
        Ok(vec![])
    }

    async fn delete_embedding(&self, _embedding_id: &str) -> Result<bool> {
        Ok(false)
    }
}
