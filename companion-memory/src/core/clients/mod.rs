//! Collaborator interfaces consumed by the memory core
//!
//! - [`VectorSearchClient`]: embedding generation and similarity search
//! - [`TextCompletionClient`]: free-form text generation for summaries
//!
//! Both may fail at any time; the stores treat every failure as recoverable.

mod completion;
mod vector;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use completion::{OpenAiCompatibleClient, UnavailableCompletion};
pub use vector::{DisabledVectorIndex, InMemoryVectorIndex};

/// Candidate returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    /// Embedding ID as returned by [`VectorSearchClient::embed`]
    pub id: String,
    /// Similarity score, higher is closer
    pub score: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorSearchClient: Send + Sync {
    /// Index `text` and return an opaque embedding ID
    async fn embed(&self, text: &str) -> Result<String>;

    /// Up to `top_k` candidates, best match first
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>>;

    /// Remove an embedding; `false` if it was unknown
    async fn delete_embedding(&self, embedding_id: &str) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextCompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
