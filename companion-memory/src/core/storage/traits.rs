//! Storage trait definitions
//!
//! These traits define the interface for storage backends.
//! Implementations can be in-memory or backed by any other storage system.

use anyhow::Result;
use async_trait::async_trait;

/// A value that can be kept in a [`Repository`]
pub trait Record: Clone + Send + Sync + 'static {
    /// Primary key of the record
    fn id(&self) -> &str;
}

/// In-place change applied atomically to a single record
pub type Mutation<'a, T> = Box<dyn FnOnce(&mut T) + Send + 'a>;

/// Selection predicate for bulk removal
pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Trait for record storage backends
///
/// Implementations must be thread-safe (Send + Sync) as they will be
/// shared between callers and the background cleanup task.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Get a record by ID
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Insert or replace a record
    async fn put(&self, record: T) -> Result<()>;

    /// Apply `mutation` to the record with the given ID and return the
    /// updated copy. No other writer observes the record mid-mutation.
    async fn update(&self, id: &str, mutation: Mutation<'_, T>) -> Result<Option<T>>;

    /// Remove a record, returning it if it existed
    async fn delete(&self, id: &str) -> Result<Option<T>>;

    /// Snapshot of every record
    async fn list_all(&self) -> Result<Vec<T>>;

    /// Remove every record matching `predicate` in one step
    async fn remove_where(&self, predicate: Predicate<'_, T>) -> Result<Vec<T>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;
}
