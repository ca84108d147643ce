//! Long-term memory: importance-scored entries with semantic search
//!
//! Entries are indexed in the vector collaborator when possible. Search
//! results come from that index and are joined back to local entries, so an
//! entry without an embedding is still readable by ID but never matched by
//! [`LongTermStore::search`].

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::relations::RelationGraph;
use super::summarizer::MemorySummarizer;
use super::types::{
    LongTermEntry, MemoryKind, Metadata, RelationEdge, RelationType, SearchHit, clamp_importance,
    retrieval_order,
};
use crate::core::clients::VectorSearchClient;
use crate::core::config::MemoryConfig;
use crate::core::storage::Repository;
use crate::models::error::MemoryResult;

pub const DEFAULT_RELATION_DEPTH: usize = 2;

/// Parameters for a new long-term entry
#[derive(Debug, Clone)]
pub struct NewLongTermMemory {
    pub content: String,
    /// Defaults to the store's configured importance
    pub importance: Option<f64>,
    pub kind: MemoryKind,
    pub generate_embedding: bool,
    pub auto_summarize: bool,
    pub metadata: Option<Metadata>,
}

impl NewLongTermMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            importance: None,
            kind: MemoryKind::default(),
            generate_embedding: true,
            auto_summarize: false,
            metadata: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn without_embedding(mut self) -> Self {
        self.generate_embedding = false;
        self
    }

    pub fn with_auto_summary(mut self) -> Self {
        self.auto_summarize = true;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Semantic search request
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    /// Defaults to the store's configured `search_top_k`
    pub top_k: Option<usize>,
    pub min_importance: Option<f64>,
    pub kind: Option<MemoryKind>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn min_importance(mut self, min_importance: f64) -> Self {
        self.min_importance = Some(min_importance);
        self
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Result of [`LongTermStore::delete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    NotFound,
    Removed,
    /// The entry is gone locally but its embedding could not be deleted
    RemovedWithOrphanedEmbedding {
        embedding_id: String,
        reason: String,
    },
}

impl DeleteOutcome {
    /// Whether the local entry was removed
    pub fn removed(&self) -> bool {
        !matches!(self, DeleteOutcome::NotFound)
    }
}

/// A timestamp strictly after `previous`, normally "now"
fn strictly_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}

pub struct LongTermStore {
    repository: Arc<dyn Repository<LongTermEntry>>,
    vectors: Arc<dyn VectorSearchClient>,
    summarizer: Arc<MemorySummarizer>,
    relations: RelationGraph,
    default_importance: f64,
    default_top_k: usize,
    next_sequence: AtomicU64,
}

impl LongTermStore {
    pub fn new(
        repository: Arc<dyn Repository<LongTermEntry>>,
        vectors: Arc<dyn VectorSearchClient>,
        summarizer: Arc<MemorySummarizer>,
        config: &MemoryConfig,
    ) -> Self {
        Self {
            repository,
            vectors,
            summarizer,
            relations: RelationGraph::new(),
            default_importance: config.default_importance,
            default_top_k: config.search_top_k,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub async fn add(&self, input: NewLongTermMemory) -> MemoryResult<LongTermEntry> {
        let embedding_id = if input.generate_embedding {
            match self.vectors.embed(&input.content).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Embedding generation failed, storing without embedding: {}", e);
                    None
                },
            }
        } else {
            None
        };

        let summary = if input.auto_summarize {
            self.summarizer
                .extract_key_points(&input.content, 1)
                .await
                .generated()
                .and_then(|points| points.into_iter().next())
        } else {
            None
        };

        let now = Utc::now();
        let entry = LongTermEntry {
            id: Uuid::new_v4().to_string(),
            content: input.content,
            kind: input.kind,
            embedding_id,
            importance: clamp_importance(input.importance.unwrap_or(self.default_importance)),
            access_count: 0,
            summary,
            metadata: input.metadata,
            created_at: now,
            last_accessed_at: now,
            updated_at: now,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };

        self.repository.put(entry.clone()).await?;
        debug!(
            "Added long-term memory {} (embedded: {}, summarized: {})",
            entry.id,
            entry.embedding_id.is_some(),
            entry.summary.is_some()
        );

        Ok(entry)
    }

    /// `add` with auto-summarization switched on
    pub async fn add_with_summary(
        &self,
        content: impl Into<String>,
        importance: f64,
    ) -> MemoryResult<LongTermEntry> {
        self.add(
            NewLongTermMemory::new(content)
                .with_importance(importance)
                .with_auto_summary(),
        )
        .await
    }

    /// Semantic search, in the vector index's score order
    pub async fn search(&self, request: SearchQuery) -> MemoryResult<Vec<SearchHit>> {
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        let candidates = match self.vectors.search(&request.query, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Vector search failed, returning no results: {}", e);
                return Ok(vec![]);
            },
        };
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let by_embedding: HashMap<String, LongTermEntry> = self
            .repository
            .list_all()
            .await?
            .into_iter()
            .filter_map(|entry| entry.embedding_id.clone().map(|eid| (eid, entry)))
            .collect();

        let mut results = Vec::with_capacity(candidates.len());
        for hit in candidates {
            let Some(entry) = by_embedding.get(&hit.id) else {
                warn!(
                    "Vector hit {} has no matching long-term memory, dropping (index drift?)",
                    hit.id
                );
                continue;
            };

            if request
                .min_importance
                .is_some_and(|min| entry.importance < min)
            {
                continue;
            }
            if request.kind.is_some_and(|kind| entry.kind != kind) {
                continue;
            }

            results.push(SearchHit {
                id: entry.id.clone(),
                content: entry.content.clone(),
                importance: entry.importance,
                score: hit.score,
                created_at: entry.created_at,
            });
        }

        debug!("LongTermStore: found {} results for query", results.len());
        Ok(results)
    }

    /// Read by ID, counting the access
    pub async fn get(&self, id: &str) -> MemoryResult<Option<LongTermEntry>> {
        let entry = self
            .repository
            .update(
                id,
                Box::new(|entry: &mut LongTermEntry| {
                    entry.access_count += 1;
                    entry.last_accessed_at = strictly_after(entry.last_accessed_at);
                }),
            )
            .await?;
        Ok(entry)
    }

    /// Read by ID without touching access statistics
    pub async fn peek(&self, id: &str) -> MemoryResult<Option<LongTermEntry>> {
        Ok(self.repository.get(id).await?)
    }

    /// Page through all entries in retrieval order
    pub async fn list_all(&self, limit: usize, offset: usize) -> MemoryResult<Vec<LongTermEntry>> {
        let mut entries = self.repository.list_all().await?;
        entries.sort_by(retrieval_order);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn update_importance(
        &self,
        id: &str,
        delta: f64,
    ) -> MemoryResult<Option<LongTermEntry>> {
        let entry = self
            .repository
            .update(
                id,
                Box::new(move |entry: &mut LongTermEntry| {
                    let next = entry.importance + delta;
                    if !next.is_nan() {
                        entry.importance = clamp_importance(next);
                    }
                    entry.updated_at = Utc::now();
                }),
            )
            .await?;
        Ok(entry)
    }

    pub async fn delete(&self, id: &str) -> MemoryResult<DeleteOutcome> {
        let Some(entry) = self.repository.delete(id).await? else {
            return Ok(DeleteOutcome::NotFound);
        };
        debug!("Deleted long-term memory {}", id);

        Ok(self.release_embedding(&entry).await)
    }

    /// Best-effort removal of an entry's embedding from the vector index
    async fn release_embedding(&self, entry: &LongTermEntry) -> DeleteOutcome {
        let Some(ref embedding_id) = entry.embedding_id else {
            return DeleteOutcome::Removed;
        };

        match self.vectors.delete_embedding(embedding_id).await {
            Ok(true) => DeleteOutcome::Removed,
            Ok(false) => {
                warn!(
                    "Embedding {} of memory {} was unknown to the vector index",
                    embedding_id, entry.id
                );
                DeleteOutcome::Removed
            },
            Err(e) => {
                warn!(
                    "Failed to delete embedding {} of memory {}: {}",
                    embedding_id, entry.id, e
                );
                DeleteOutcome::RemovedWithOrphanedEmbedding {
                    embedding_id: embedding_id.clone(),
                    reason: e.to_string(),
                }
            },
        }
    }

    /// Create a directed edge; endpoints are not required to exist
    pub fn link(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        weight: f64,
    ) -> RelationEdge {
        self.relations
            .link(source_id, target_id, relation_type, weight)
    }

    pub fn relations_of(&self, id: &str) -> Vec<RelationEdge> {
        self.relations.edges_from(id)
    }

    /// Memories reachable from `id` within `depth` hops, nearest first
    pub async fn get_related(
        &self,
        id: &str,
        relation_type: Option<RelationType>,
        depth: usize,
    ) -> MemoryResult<Vec<LongTermEntry>> {
        let mut related = Vec::new();
        for node in self.relations.reachable(id, relation_type, depth) {
            match self.repository.get(&node).await? {
                Some(entry) => related.push(entry),
                None => debug!("Related memory {} is not stored, skipping", node),
            }
        }
        Ok(related)
    }

    /// Delete entries below `threshold` that are at least `retention_days` old
    pub async fn archive_low_importance(
        &self,
        threshold: f64,
        retention_days: i64,
    ) -> MemoryResult<usize> {
        let now = Utc::now();
        let retention = Duration::try_days(retention_days).unwrap_or(Duration::MAX);

        let archived = self
            .repository
            .remove_where(&|entry: &LongTermEntry| {
                entry.importance < threshold && now.signed_duration_since(entry.created_at) >= retention
            })
            .await?;

        let orphaned = join_all(archived.iter().map(|entry| self.release_embedding(entry)))
            .await
            .into_iter()
            .filter(|outcome| matches!(outcome, DeleteOutcome::RemovedWithOrphanedEmbedding { .. }))
            .count();

        if !archived.is_empty() {
            info!(
                "Archived {} low-importance long-term memories ({} orphaned embeddings)",
                archived.len(),
                orphaned
            );
        }

        Ok(archived.len())
    }

    pub async fn len(&self) -> MemoryResult<usize> {
        Ok(self.repository.count().await?)
    }

    pub async fn is_empty(&self) -> MemoryResult<bool> {
        Ok(self.len().await? == 0)
    }
}
