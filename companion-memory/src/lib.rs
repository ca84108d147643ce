//! Memory core for an AI companion
//!
//! Session-scoped short-term memory, importance-scored long-term memory
//! with semantic search and relations, LLM-backed summarization and a
//! background cleanup task. External services are reached through the
//! collaborator traits in [`core::clients`].

pub mod core;
pub mod models;
pub mod telemetry;

use crate::core::config::Settings;
use crate::core::memory::MemoryService;
use crate::models::error::MemoryResult;

pub mod prelude {
    pub use crate::core::clients::{TextCompletionClient, VectorHit, VectorSearchClient};
    pub use crate::core::config::Settings;
    pub use crate::core::memory::{
        CleanupReport, DeleteOutcome, LongTermEntry, MemoryKind, MemoryService, NewLongTermMemory,
        NewShortTermMemory, RelationType, SearchHit, SearchQuery, ShortTermEntry, Summarized,
    };
    pub use crate::models::error::{MemoryError, MemoryResult};
}

/// Load `.env`, install tracing, read settings and build the service
pub async fn bootstrap() -> MemoryResult<MemoryService> {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let settings = Settings::new()?;
    MemoryService::builder(settings).build().await
}
