//! Memory entities shared by both tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::storage::Record;

/// Opaque key-value metadata attached to an entry
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Clamp an importance score into [0, 1]. NaN maps to 0.
pub fn clamp_importance(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Session-scoped, TTL-bounded memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermEntry {
    pub id: String,
    pub content: String,
    pub session_id: String,
    pub importance: f64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub metadata: Option<Metadata>,
    /// Insertion order within the owning store
    pub sequence: u64,
}

impl ShortTermEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

impl Record for ShortTermEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Category of a long-term memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Experiences and events
    Episodic,
    /// Facts and knowledge
    #[default]
    Semantic,
    /// Skills and processes
    Procedural,
}

/// Importance-scored, optionally embedding-indexed memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermEntry {
    pub id: String,
    pub content: String,
    pub kind: MemoryKind,
    /// Handle into the vector index; `None` when embedding failed or was skipped
    pub embedding_id: Option<String>,
    pub importance: f64,
    pub access_count: u64,
    pub summary: Option<String>,
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sequence: u64,
}

impl Record for LongTermEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Anything ranked by the retrieval ordering
pub trait Ranked {
    fn importance(&self) -> f64;
    fn created_at(&self) -> DateTime<Utc>;
    fn sequence(&self) -> u64;
}

impl Ranked for ShortTermEntry {
    fn importance(&self) -> f64 {
        self.importance
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Ranked for LongTermEntry {
    fn importance(&self) -> f64 {
        self.importance
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Importance descending, then most recent first, then insertion order
pub fn retrieval_order<T: Ranked>(a: &T, b: &T) -> Ordering {
    b.importance()
        .total_cmp(&a.importance())
        .then_with(|| b.created_at().cmp(&a.created_at()))
        .then_with(|| a.sequence().cmp(&b.sequence()))
}

/// Type of a directed edge between two long-term memories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    #[default]
    Related,
    Causal,
    Similar,
    Contradicts,
}

/// Directed, typed, weighted link between two long-term memories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation_type: RelationType,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// A ranked semantic search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub importance: f64,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}
