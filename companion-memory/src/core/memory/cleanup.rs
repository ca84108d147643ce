//! Background maintenance of both memory tiers
//!
//! The task sweeps expired short-term entries and archives stale,
//! low-importance long-term entries every `interval`. It is an explicit
//! Idle/Running state machine: [`MemoryCleanupTask::stop`] cancels the loop
//! and waits for it to exit before returning.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::long_term::LongTermStore;
use super::short_term::ShortTermStore;
use crate::core::config::MemoryConfig;
use crate::models::error::MemoryResult;

/// What a cleanup pass removes and how often it runs
#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    pub interval: Duration,
    pub archive_threshold: f64,
    pub archive_retention_days: i64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::from(&MemoryConfig::default())
    }
}

impl From<&MemoryConfig> for CleanupPolicy {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            interval: config.cleanup_interval(),
            archive_threshold: config.archive_threshold,
            archive_retention_days: config.archive_retention_days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupState {
    Idle,
    Running,
}

/// Result of one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub expired_short_term: usize,
    pub archived_long_term: usize,
    /// Edges are never cascaded, so this stays 0
    pub deleted_relations: usize,
}

/// Counters accumulated by the background loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub runs: u64,
    pub failures: u64,
    pub last_report: Option<CleanupReport>,
}

/// Shared state of the task, owned jointly by the handle and the loop
struct Sweeper {
    short_term: Arc<ShortTermStore>,
    long_term: Arc<LongTermStore>,
    policy: CleanupPolicy,
    stats: Mutex<CleanupStats>,
}

impl Sweeper {
    /// Both sweeps run even when the other fails; the first error wins
    async fn cleanup_all(&self) -> MemoryResult<CleanupReport> {
        let short_term = self.short_term.sweep_expired().await;
        if let Err(ref e) = short_term {
            warn!("Short-term sweep failed: {}", e);
        }

        let long_term = self
            .long_term
            .archive_low_importance(
                self.policy.archive_threshold,
                self.policy.archive_retention_days,
            )
            .await;
        if let Err(ref e) = long_term {
            warn!("Long-term archival failed: {}", e);
        }

        Ok(CleanupReport {
            expired_short_term: short_term?,
            archived_long_term: long_term?,
            deleted_relations: 0,
        })
    }

    /// One loop iteration; failures are recorded, never propagated
    async fn run_once(&self) {
        let result = self.cleanup_all().await;
        let mut stats = self.stats.lock();
        stats.runs += 1;

        match result {
            Ok(report) => {
                if report.expired_short_term > 0 || report.archived_long_term > 0 {
                    info!(
                        "Memory cleanup: {} expired short-term, {} archived long-term",
                        report.expired_short_term, report.archived_long_term
                    );
                } else {
                    debug!("Memory cleanup: nothing to do");
                }
                stats.last_report = Some(report);
            },
            Err(e) => {
                stats.failures += 1;
                error!("Memory cleanup failed ({:?}): {}", e.kind(), e);
            },
        }
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        info!(
            "Memory cleanup loop started (interval {}s)",
            self.policy.interval.as_secs()
        );

        loop {
            self.run_once().await;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.policy.interval) => {},
            }
        }

        info!("Memory cleanup loop stopped");
    }
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct MemoryCleanupTask {
    sweeper: Arc<Sweeper>,
    running: AsyncMutex<Option<RunningLoop>>,
}

impl MemoryCleanupTask {
    pub fn new(
        short_term: Arc<ShortTermStore>,
        long_term: Arc<LongTermStore>,
        policy: CleanupPolicy,
    ) -> Self {
        Self {
            sweeper: Arc::new(Sweeper {
                short_term,
                long_term,
                policy,
                stats: Mutex::new(CleanupStats::default()),
            }),
            running: AsyncMutex::new(None),
        }
    }

    pub fn policy(&self) -> &CleanupPolicy {
        &self.sweeper.policy
    }

    /// Spawn the cleanup loop; no-op when already running
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Memory cleanup already running");
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(self.sweeper.clone().run_loop(token.clone()));
        *running = Some(RunningLoop { token, handle });
    }

    /// Cancel the loop and wait for it to exit; no-op when idle
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(RunningLoop { token, handle }) = running.take() else {
            return;
        };

        token.cancel();
        if let Err(e) = handle.await {
            warn!("Memory cleanup loop ended abnormally: {}", e);
        }
    }

    pub async fn state(&self) -> CleanupState {
        if self.running.lock().await.is_some() {
            CleanupState::Running
        } else {
            CleanupState::Idle
        }
    }

    /// Run one full pass immediately, outside the loop schedule
    pub async fn cleanup_all(&self) -> MemoryResult<CleanupReport> {
        self.sweeper.cleanup_all().await
    }

    pub async fn cleanup_short_term_only(&self) -> MemoryResult<usize> {
        self.sweeper.short_term.sweep_expired().await
    }

    pub async fn cleanup_long_term_only(
        &self,
        threshold: f64,
        retention_days: i64,
    ) -> MemoryResult<usize> {
        self.sweeper
            .long_term
            .archive_low_importance(threshold, retention_days)
            .await
    }

    pub fn stats(&self) -> CleanupStats {
        self.sweeper.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clients::{InMemoryVectorIndex, UnavailableCompletion};
    use crate::core::memory::long_term::NewLongTermMemory;
    use crate::core::memory::short_term::NewShortTermMemory;
    use crate::core::memory::summarizer::MemorySummarizer;
    use crate::core::memory::types::ShortTermEntry;
    use crate::core::storage::{InMemoryRepository, Mutation, Predicate, Repository};
    use crate::models::error::ErrorKind;
    use anyhow::anyhow;
    use async_trait::async_trait;

    fn stores() -> (Arc<ShortTermStore>, Arc<LongTermStore>) {
        let long_term = LongTermStore::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(MemorySummarizer::new(Arc::new(UnavailableCompletion))),
            &MemoryConfig::default(),
        );
        (Arc::new(ShortTermStore::in_memory()), Arc::new(long_term))
    }

    fn policy(interval: Duration) -> CleanupPolicy {
        CleanupPolicy {
            interval,
            archive_threshold: 0.1,
            archive_retention_days: 0,
        }
    }

    #[tokio::test]
    async fn test_start_stop_state_machine() {
        let (short_term, long_term) = stores();
        let task = MemoryCleanupTask::new(short_term, long_term, policy(Duration::from_secs(3600)));

        assert_eq!(task.state().await, CleanupState::Idle);
        task.stop().await;
        assert_eq!(task.state().await, CleanupState::Idle);

        task.start().await;
        task.start().await;
        assert_eq!(task.state().await, CleanupState::Running);

        task.stop().await;
        assert_eq!(task.state().await, CleanupState::Idle);
        // first iteration runs before the first wait
        assert_eq!(task.stats().runs, 1);

        task.start().await;
        task.stop().await;
        assert_eq!(task.stats().runs, 2);
    }

    #[tokio::test]
    async fn test_loop_sweeps_periodically() {
        let (short_term, long_term) = stores();
        let task = MemoryCleanupTask::new(
            short_term.clone(),
            long_term,
            policy(Duration::from_millis(20)),
        );

        task.start().await;
        short_term
            .add(NewShortTermMemory::new("stale", "s").with_ttl_seconds(-1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        task.stop().await;

        let stats = task.stats();
        assert!(stats.runs >= 2);
        assert_eq!(stats.failures, 0);
        assert!(short_term.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_all_report() {
        let (short_term, long_term) = stores();
        short_term
            .add(NewShortTermMemory::new("gone", "s").with_ttl_seconds(-1))
            .await
            .unwrap();
        short_term.add(NewShortTermMemory::new("kept", "s")).await.unwrap();
        long_term
            .add(NewLongTermMemory::new("trivial").with_importance(0.01))
            .await
            .unwrap();
        long_term
            .add(NewLongTermMemory::new("vital").with_importance(0.95))
            .await
            .unwrap();

        let task = MemoryCleanupTask::new(short_term.clone(), long_term.clone(), policy(Duration::from_secs(60)));
        let report = task.cleanup_all().await.unwrap();

        assert_eq!(
            report,
            CleanupReport {
                expired_short_term: 1,
                archived_long_term: 1,
                deleted_relations: 0,
            }
        );
        assert_eq!(short_term.len().await.unwrap(), 1);
        assert_eq!(long_term.len().await.unwrap(), 1);
        assert_eq!(task.cleanup_all().await.unwrap(), CleanupReport::default());
    }

    #[tokio::test]
    async fn test_out_of_band_passes() {
        let (short_term, long_term) = stores();
        long_term
            .add(NewLongTermMemory::new("low").with_importance(0.3))
            .await
            .unwrap();
        let task = MemoryCleanupTask::new(short_term, long_term, CleanupPolicy::default());

        assert_eq!(task.cleanup_short_term_only().await.unwrap(), 0);
        assert_eq!(task.cleanup_long_term_only(0.1, 0).await.unwrap(), 0);
        assert_eq!(task.cleanup_long_term_only(0.5, 0).await.unwrap(), 1);
    }

    /// Short-term repository whose bulk removal always fails
    struct BrokenSweepRepository {
        inner: InMemoryRepository<ShortTermEntry>,
    }

    #[async_trait]
    impl Repository<ShortTermEntry> for BrokenSweepRepository {
        async fn get(&self, id: &str) -> anyhow::Result<Option<ShortTermEntry>> {
            self.inner.get(id).await
        }

        async fn put(&self, record: ShortTermEntry) -> anyhow::Result<()> {
            self.inner.put(record).await
        }

        async fn update(
            &self,
            id: &str,
            mutation: Mutation<'_, ShortTermEntry>,
        ) -> anyhow::Result<Option<ShortTermEntry>> {
            self.inner.update(id, mutation).await
        }

        async fn delete(&self, id: &str) -> anyhow::Result<Option<ShortTermEntry>> {
            self.inner.delete(id).await
        }

        async fn list_all(&self) -> anyhow::Result<Vec<ShortTermEntry>> {
            self.inner.list_all().await
        }

        async fn remove_where(
            &self,
            _predicate: Predicate<'_, ShortTermEntry>,
        ) -> anyhow::Result<Vec<ShortTermEntry>> {
            Err(anyhow!("disk gone"))
        }

        async fn count(&self) -> anyhow::Result<usize> {
            self.inner.count().await
        }
    }

    fn broken_short_term() -> Arc<ShortTermStore> {
        Arc::new(ShortTermStore::new(
            Arc::new(BrokenSweepRepository {
                inner: InMemoryRepository::new(),
            }),
            &MemoryConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_loop_survives_failing_iterations() {
        let (_, long_term) = stores();
        let task = MemoryCleanupTask::new(
            broken_short_term(),
            long_term,
            policy(Duration::from_millis(10)),
        );

        task.start().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(task.state().await, CleanupState::Running);
        task.stop().await;

        let stats = task.stats();
        assert!(stats.runs >= 3);
        assert_eq!(stats.failures, stats.runs);
        assert!(stats.last_report.is_none());
        assert_eq!(task.state().await, CleanupState::Idle);
    }

    #[tokio::test]
    async fn test_cleanup_all_reports_sweep_failure() {
        let (_, long_term) = stores();
        let task = MemoryCleanupTask::new(broken_short_term(), long_term, CleanupPolicy::default());

        let err = task.cleanup_all().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(task.cleanup_short_term_only().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_short_term_sweep_still_archives_long_term() {
        let (_, long_term) = stores();
        long_term
            .add(NewLongTermMemory::new("trivial").with_importance(0.01))
            .await
            .unwrap();
        let task = MemoryCleanupTask::new(
            broken_short_term(),
            long_term.clone(),
            policy(Duration::from_secs(60)),
        );

        assert!(task.cleanup_all().await.is_err());
        assert!(long_term.is_empty().await.unwrap());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = CleanupPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(300));
        assert_eq!(policy.archive_threshold, 0.1);
        assert_eq!(policy.archive_retention_days, 30);
    }
}
