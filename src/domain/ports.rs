use crate::domain::model::{
    ArchiveFilter, FetchOutcome, QueueEntry, QueueState, QueueStats, ThesisDocument,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistent work queue of register numbers.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn is_seeded(&self) -> Result<bool>;
    async fn mark_seeded(&self) -> Result<()>;

    /// Inserts each register as pending unless it is already queued.
    /// Returns how many were newly inserted.
    async fn enqueue_batch(&self, registros: &[String]) -> Result<u64>;

    /// Atomically moves one pending entry to processing and returns it.
    async fn claim_next(&self) -> Result<Option<QueueEntry>>;

    async fn mark_completed(&self, registro: &str) -> Result<()>;
    async fn mark_failed(&self, registro: &str, message: &str) -> Result<()>;

    /// Moves failed entries back to pending; `None` means all of them.
    async fn requeue_failed(&self, limit: Option<u64>) -> Result<u64>;

    /// Moves entries claimed before `claimed_before` back to pending.
    async fn requeue_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64>;

    async fn count(&self, state: Option<QueueState>) -> Result<u64>;

    async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            total: self.count(None).await?,
            pending: self.count(Some(QueueState::Pending)).await?,
            processing: self.count(Some(QueueState::Processing)).await?,
            completed: self.count(Some(QueueState::Completed)).await?,
            failed: self.count(Some(QueueState::Failed)).await?,
        })
    }
}

/// Archive of embedded theses.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn is_processed(&self, registro: &str) -> Result<bool>;
    async fn upsert(&self, document: &ThesisDocument) -> Result<()>;

    /// Most recently updated processed documents, newest first.
    async fn latest(&self, filter: &ArchiveFilter, limit: usize) -> Result<Vec<ThesisDocument>>;
}

#[async_trait]
pub trait ThesisSource: Send + Sync {
    async fn fetch(&self, registro: &str) -> Result<FetchOutcome>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Both halves of the persistence layer, shared by the worker and dashboard.
#[derive(Clone)]
pub struct Stores {
    pub queue: Arc<dyn QueueStore>,
    pub archive: Arc<dyn ArchiveStore>,
}

impl Stores {
    pub fn new(queue: Arc<dyn QueueStore>, archive: Arc<dyn ArchiveStore>) -> Self {
        Self { queue, archive }
    }

    /// For backends that implement both traits on one handle.
    pub fn shared<T>(store: Arc<T>) -> Self
    where
        T: QueueStore + ArchiveStore + 'static,
    {
        Self {
            queue: store.clone(),
            archive: store,
        }
    }
}
