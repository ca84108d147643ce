//! In-memory storage implementation
//!
//! Data is held in a `HashMap` behind a `parking_lot::RwLock` and is lost
//! when the process exits.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use super::traits::{Mutation, Predicate, Record, Repository};

/// In-memory implementation of [`Repository`]
///
/// Every read takes the whole-map read lock, so `list_all` is a consistent
/// point-in-time snapshot. Mutations take the write lock, which makes
/// `update` atomic per record.
pub struct InMemoryRepository<T: Record> {
    records: RwLock<HashMap<String, T>>,
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn put(&self, record: T) -> Result<()> {
        let id = record.id().to_string();
        self.records.write().insert(id, record);
        Ok(())
    }

    async fn update(&self, id: &str, mutation: Mutation<'_, T>) -> Result<Option<T>> {
        let mut records = self.records.write();
        Ok(records.get_mut(id).map(|record| {
            mutation(record);
            record.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.write().remove(id))
    }

    async fn list_all(&self) -> Result<Vec<T>> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn remove_where(&self, predicate: Predicate<'_, T>) -> Result<Vec<T>> {
        let mut records = self.records.write();
        let matching: Vec<String> = records
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| id.clone())
            .collect();

        let removed: Vec<T> = matching
            .iter()
            .filter_map(|id| records.remove(id))
            .collect();

        if !removed.is_empty() {
            debug!("Removed {} records in bulk", removed.len());
        }

        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: String,
        hits: u32,
    }

    impl Record for Note {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str) -> Note {
        Note {
            id: id.to_string(),
            hits: 0,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let repo = InMemoryRepository::new();
        repo.put(note("a")).await.unwrap();

        assert_eq!(repo.get("a").await.unwrap(), Some(note("a")));
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.delete("a").await.unwrap(), Some(note("a")));
        assert_eq!(repo.delete("a").await.unwrap(), None);
        assert!(repo.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let repo: InMemoryRepository<Note> = InMemoryRepository::new();
        let updated = repo
            .update("missing", Box::new(|n: &mut Note| n.hits += 1))
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_remove_where_only_matching() {
        let repo = InMemoryRepository::new();
        for id in ["keep-1", "drop-1", "drop-2"] {
            repo.put(note(id)).await.unwrap();
        }

        let removed = repo
            .remove_where(&|n: &Note| n.id.starts_with("drop"))
            .await
            .unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get("keep-1").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.put(note("shared")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    repo.update("shared", Box::new(|n: &mut Note| n.hits += 1))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.get("shared").await.unwrap().unwrap().hits, 400);
    }
}
