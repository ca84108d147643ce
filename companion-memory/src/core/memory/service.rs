//! Wiring of the memory tiers into a single context object

use std::sync::Arc;
use tracing::{debug, info};

use super::cleanup::{CleanupPolicy, MemoryCleanupTask};
use super::long_term::{LongTermStore, NewLongTermMemory};
use super::short_term::ShortTermStore;
use super::summarizer::MemorySummarizer;
use super::types::{LongTermEntry, ShortTermEntry};
use crate::core::clients::{
    DisabledVectorIndex, InMemoryVectorIndex, OpenAiCompatibleClient, TextCompletionClient,
    UnavailableCompletion, VectorSearchClient,
};
use crate::core::config::Settings;
use crate::core::storage::{InMemoryRepository, Repository};
use crate::models::error::{MemoryError, MemoryResult};

pub struct MemoryServiceBuilder {
    settings: Settings,
    vector_client: Option<Arc<dyn VectorSearchClient>>,
    completion_client: Option<Arc<dyn TextCompletionClient>>,
    short_term_repository: Option<Arc<dyn Repository<ShortTermEntry>>>,
    long_term_repository: Option<Arc<dyn Repository<LongTermEntry>>>,
}

impl MemoryServiceBuilder {
    pub fn vector_client(mut self, client: Arc<dyn VectorSearchClient>) -> Self {
        self.vector_client = Some(client);
        self
    }

    pub fn completion_client(mut self, client: Arc<dyn TextCompletionClient>) -> Self {
        self.completion_client = Some(client);
        self
    }

    pub fn short_term_repository(mut self, repository: Arc<dyn Repository<ShortTermEntry>>) -> Self {
        self.short_term_repository = Some(repository);
        self
    }

    pub fn long_term_repository(mut self, repository: Arc<dyn Repository<LongTermEntry>>) -> Self {
        self.long_term_repository = Some(repository);
        self
    }

    fn default_vector_client(&self) -> Arc<dyn VectorSearchClient> {
        if self.settings.vector.enabled {
            Arc::new(InMemoryVectorIndex::new())
        } else {
            Arc::new(DisabledVectorIndex)
        }
    }

    fn default_completion_client(&self) -> MemoryResult<Arc<dyn TextCompletionClient>> {
        if !self.settings.completion.enabled {
            return Ok(Arc::new(UnavailableCompletion));
        }

        let client = OpenAiCompatibleClient::new(self.settings.completion.clone())
            .map_err(|e| MemoryError::collaborator("completion", e.to_string()))?;
        Ok(Arc::new(client))
    }

    /// Validate settings and assemble the service
    ///
    /// Starts the cleanup loop when `memory.cleanup_on_start` is set.
    pub async fn build(self) -> MemoryResult<MemoryService> {
        self.settings.validate()?;

        let vectors = match self.vector_client.clone() {
            Some(client) => client,
            None => self.default_vector_client(),
        };
        let completion = match self.completion_client.clone() {
            Some(client) => client,
            None => self.default_completion_client()?,
        };

        let memory = &self.settings.memory;
        let summarizer = Arc::new(MemorySummarizer::new(completion));
        let short_term_repository: Arc<dyn Repository<ShortTermEntry>> =
            match self.short_term_repository {
                Some(repository) => repository,
                None => Arc::new(InMemoryRepository::new()),
            };
        let long_term_repository: Arc<dyn Repository<LongTermEntry>> =
            match self.long_term_repository {
                Some(repository) => repository,
                None => Arc::new(InMemoryRepository::new()),
            };

        let short_term = Arc::new(ShortTermStore::new(short_term_repository, memory));
        let long_term = Arc::new(LongTermStore::new(
            long_term_repository,
            vectors,
            summarizer.clone(),
            memory,
        ));
        let cleanup = Arc::new(MemoryCleanupTask::new(
            short_term.clone(),
            long_term.clone(),
            CleanupPolicy::from(memory),
        ));

        let service = MemoryService {
            short_term,
            long_term,
            summarizer,
            cleanup,
            promotion_threshold: memory.promotion_threshold,
        };

        if self.settings.memory.cleanup_on_start {
            service.cleanup.start().await;
        }
        info!(
            "Memory service ready (vector search: {}, completion: {})",
            self.settings.vector.enabled || self.vector_client.is_some(),
            self.settings.completion.enabled || self.completion_client.is_some()
        );

        Ok(service)
    }
}

/// Both memory tiers plus their summarizer and cleanup task
pub struct MemoryService {
    short_term: Arc<ShortTermStore>,
    long_term: Arc<LongTermStore>,
    summarizer: Arc<MemorySummarizer>,
    cleanup: Arc<MemoryCleanupTask>,
    promotion_threshold: f64,
}

impl MemoryService {
    pub fn builder(settings: Settings) -> MemoryServiceBuilder {
        MemoryServiceBuilder {
            settings,
            vector_client: None,
            completion_client: None,
            short_term_repository: None,
            long_term_repository: None,
        }
    }

    pub fn short_term(&self) -> &Arc<ShortTermStore> {
        &self.short_term
    }

    pub fn long_term(&self) -> &Arc<LongTermStore> {
        &self.long_term
    }

    pub fn summarizer(&self) -> &Arc<MemorySummarizer> {
        &self.summarizer
    }

    pub fn cleanup(&self) -> &Arc<MemoryCleanupTask> {
        &self.cleanup
    }

    /// Move the promotable live entries of a session into long-term memory
    ///
    /// Importance and metadata carry over; promoted short-term entries are
    /// deleted afterwards.
    pub async fn promote_session(
        &self,
        session_id: &str,
        threshold: Option<f64>,
    ) -> MemoryResult<Vec<LongTermEntry>> {
        let threshold = threshold.unwrap_or(self.promotion_threshold);
        let live = self.short_term.list(session_id, false).await?;
        let selected = MemorySummarizer::evaluate_promotion(&live, threshold);

        let mut promoted = Vec::with_capacity(selected.len());
        for entry in selected {
            let mut input =
                NewLongTermMemory::new(entry.content.clone()).with_importance(entry.importance);
            if let Some(metadata) = entry.metadata.clone() {
                input = input.with_metadata(metadata);
            }

            promoted.push(self.long_term.add(input).await?);
            self.short_term.delete(&entry.id).await?;
        }

        debug!(
            "Promoted {} of {} short-term memories from session {}",
            promoted.len(),
            live.len(),
            session_id
        );
        Ok(promoted)
    }

    pub async fn shutdown(&self) {
        self.cleanup.stop().await;
        info!("Memory service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clients::MockTextCompletionClient;
    use crate::core::memory::cleanup::CleanupState;
    use crate::core::memory::short_term::NewShortTermMemory;
    use serde_json::json;

    #[tokio::test]
    async fn test_promote_session_moves_selected_entries() {
        let service = MemoryService::builder(Settings::default())
            .build()
            .await
            .unwrap();
        let short_term = service.short_term();

        let mut metadata = crate::core::memory::types::Metadata::new();
        metadata.insert("source".to_string(), json!("chat"));
        short_term
            .add(
                NewShortTermMemory::new("user is moving to Lyon", "s")
                    .with_importance(0.9)
                    .with_metadata(metadata.clone()),
            )
            .await
            .unwrap();
        short_term
            .add(NewShortTermMemory::new("user said hi", "s").with_importance(0.6))
            .await
            .unwrap();
        short_term
            .add(NewShortTermMemory::new("other session", "t").with_importance(1.0))
            .await
            .unwrap();

        let promoted = service.promote_session("s", None).await.unwrap();

        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].content, "user is moving to Lyon");
        assert_eq!(promoted[0].importance, 0.9);
        assert_eq!(promoted[0].metadata, Some(metadata));
        assert!(promoted[0].embedding_id.is_some());

        let left = short_term.list("s", true).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content, "user said hi");
        assert_eq!(service.long_term().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_promote_session_below_threshold_is_noop() {
        let service = MemoryService::builder(Settings::default())
            .build()
            .await
            .unwrap();
        service
            .short_term()
            .add(NewShortTermMemory::new("small talk", "s").with_importance(0.2))
            .await
            .unwrap();

        assert!(service.promote_session("s", None).await.unwrap().is_empty());
        assert_eq!(service.short_term().len().await.unwrap(), 1);
        assert_eq!(service.promote_session("s", Some(0.1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_completion_client_is_used() {
        let mut completion = MockTextCompletionClient::new();
        completion
            .expect_complete()
            .times(1)
            .returning(|_| Ok("a summary".to_string()));

        let service = MemoryService::builder(Settings::default())
            .completion_client(Arc::new(completion))
            .build()
            .await
            .unwrap();

        let summary = service
            .summarizer()
            .summarize(&["something happened".to_string()], "")
            .await;
        assert_eq!(summary.into_value(), "a summary");
    }

    #[tokio::test]
    async fn test_cleanup_on_start_and_shutdown() {
        let mut settings = Settings::default();
        settings.memory.cleanup_on_start = true;

        let service = MemoryService::builder(settings).build().await.unwrap();
        assert_eq!(service.cleanup().state().await, CleanupState::Running);

        service.shutdown().await;
        assert_eq!(service.cleanup().state().await, CleanupState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.memory.search_top_k = 0;

        let result = MemoryService::builder(settings).build().await;
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
    }
}
