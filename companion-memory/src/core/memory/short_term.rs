//! Short-term memory: session-scoped entries with a TTL
//!
//! Entries are immutable once written. They disappear through an explicit
//! [`ShortTermStore::delete`] or the expiry sweep run by the cleanup task.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{Metadata, ShortTermEntry, clamp_importance, retrieval_order};
use crate::core::config::MemoryConfig;
use crate::core::storage::{InMemoryRepository, Repository};
use crate::models::error::{MemoryError, MemoryResult};

/// Parameters for a new short-term entry
#[derive(Debug, Clone)]
pub struct NewShortTermMemory {
    pub content: String,
    pub session_id: String,
    /// Defaults to the store's configured importance
    pub importance: Option<f64>,
    /// Defaults to the store's configured TTL; zero or negative means
    /// already expired
    pub ttl_seconds: Option<i64>,
    pub metadata: Option<Metadata>,
}

impl NewShortTermMemory {
    pub fn new(content: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            session_id: session_id.into(),
            importance: None,
            ttl_seconds: None,
            metadata: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// `now + ttl_seconds`, saturating at the representable range
fn expiry_after(now: DateTime<Utc>, ttl_seconds: i64) -> DateTime<Utc> {
    Duration::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(if ttl_seconds < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Session-scoped, TTL-bounded memory store
pub struct ShortTermStore {
    repository: Arc<dyn Repository<ShortTermEntry>>,
    default_ttl_seconds: i64,
    default_importance: f64,
    next_sequence: AtomicU64,
}

impl ShortTermStore {
    pub fn new(repository: Arc<dyn Repository<ShortTermEntry>>, config: &MemoryConfig) -> Self {
        Self {
            repository,
            default_ttl_seconds: config.short_term_ttl_seconds,
            default_importance: config.default_importance,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Store backed by an [`InMemoryRepository`] with default settings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRepository::new()),
            &MemoryConfig::default(),
        )
    }

    pub async fn add(&self, input: NewShortTermMemory) -> MemoryResult<ShortTermEntry> {
        if input.session_id.trim().is_empty() {
            return Err(MemoryError::InvalidInput(
                "short-term memory requires a session id".to_string(),
            ));
        }

        let now = Utc::now();
        let ttl = input.ttl_seconds.unwrap_or(self.default_ttl_seconds);
        let entry = ShortTermEntry {
            id: Uuid::new_v4().to_string(),
            content: input.content,
            session_id: input.session_id,
            importance: clamp_importance(input.importance.unwrap_or(self.default_importance)),
            expires_at: expiry_after(now, ttl),
            created_at: now,
            last_accessed_at: now,
            metadata: input.metadata,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };

        self.repository.put(entry.clone()).await?;
        debug!(
            "Added short-term memory {} to session {} (ttl {}s)",
            entry.id, entry.session_id, ttl
        );

        Ok(entry)
    }

    /// Entries of a session, most important first
    ///
    /// Works on a snapshot: writes that land after the snapshot is taken are
    /// not reflected in the returned list.
    pub async fn list(
        &self,
        session_id: &str,
        include_expired: bool,
    ) -> MemoryResult<Vec<ShortTermEntry>> {
        let snapshot = self.repository.list_all().await?;
        let now = Utc::now();

        let mut entries: Vec<ShortTermEntry> = snapshot
            .into_iter()
            .filter(|e| e.session_id == session_id)
            .filter(|e| include_expired || !e.is_expired_at(now))
            .collect();
        entries.sort_by(retrieval_order);

        Ok(entries)
    }

    /// Read one entry, refreshing its `last_accessed_at`
    pub async fn get(&self, id: &str) -> MemoryResult<Option<ShortTermEntry>> {
        let touched = self
            .repository
            .update(
                id,
                Box::new(|entry: &mut ShortTermEntry| entry.last_accessed_at = Utc::now()),
            )
            .await?;
        Ok(touched)
    }

    /// `true` if an entry was removed
    pub async fn delete(&self, id: &str) -> MemoryResult<bool> {
        let removed = self.repository.delete(id).await?.is_some();
        if removed {
            debug!("Deleted short-term memory {}", id);
        }
        Ok(removed)
    }

    /// Remove every entry that expired strictly before now
    pub async fn sweep_expired(&self) -> MemoryResult<usize> {
        let now = Utc::now();
        let removed = self
            .repository
            .remove_where(&|entry: &ShortTermEntry| entry.is_expired_at(now))
            .await?;

        if !removed.is_empty() {
            info!("Swept {} expired short-term memories", removed.len());
        }
        Ok(removed.len())
    }

    pub async fn len(&self) -> MemoryResult<usize> {
        Ok(self.repository.count().await?)
    }

    pub async fn is_empty(&self) -> MemoryResult<bool> {
        Ok(self.len().await? == 0)
    }
}
