//! Two-tier memory for a conversational companion
//!
//! - **Short-term** ([`ShortTermStore`]): per-session entries that expire
//!   after a TTL
//! - **Long-term** ([`LongTermStore`]): importance-scored entries, searchable
//!   through the vector collaborator and linked by a relation graph
//!
//! [`MemorySummarizer`] condenses content through the completion
//! collaborator and decides what gets promoted; [`MemoryCleanupTask`] keeps
//! both tiers trimmed in the background. [`MemoryService`] wires them
//! together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let service = MemoryService::builder(Settings::new()?).build().await?;
//!
//! service
//!     .short_term()
//!     .add(NewShortTermMemory::new("User is learning Rust", "session-1").with_importance(0.8))
//!     .await?;
//! let promoted = service.promote_session("session-1", None).await?;
//! let hits = service.long_term().search(SearchQuery::new("Rust")).await?;
//! ```

pub mod cleanup;
pub mod long_term;
pub mod relations;
pub mod service;
pub mod short_term;
pub mod summarizer;
pub mod types;

pub use cleanup::{CleanupPolicy, CleanupReport, CleanupState, CleanupStats, MemoryCleanupTask};
pub use long_term::{DeleteOutcome, LongTermStore, NewLongTermMemory, SearchQuery};
pub use relations::RelationGraph;
pub use service::{MemoryService, MemoryServiceBuilder};
pub use short_term::{NewShortTermMemory, ShortTermStore};
pub use summarizer::{MemorySummarizer, Promotable, PromotionCandidate, Summarized};
pub use types::{
    LongTermEntry, MemoryKind, Metadata, RelationEdge, RelationType, SearchHit, ShortTermEntry,
};
