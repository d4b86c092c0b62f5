use crate::domain::model::{ArchiveFilter, QueueEntry, QueueState, ThesisDocument};
use crate::domain::ports::{ArchiveStore, QueueStore};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    seeded: bool,
    entries: Vec<QueueEntry>,
    index: HashMap<String, usize>,
    // positions in `entries`; stale positions are skipped on claim
    pending: VecDeque<usize>,
    archive: HashMap<String, ThesisDocument>,
}

impl MemoryState {
    fn entry_mut(&mut self, registro: &str) -> Option<&mut QueueEntry> {
        let pos = *self.index.get(registro)?;
        self.entries.get_mut(pos)
    }

    fn requeue_where<F>(&mut self, limit: Option<u64>, mut predicate: F) -> u64
    where
        F: FnMut(&QueueEntry) -> bool,
    {
        let now = Utc::now();
        let mut moved = 0u64;
        for (pos, entry) in self.entries.iter_mut().enumerate() {
            if limit.is_some_and(|l| moved >= l) {
                break;
            }
            if predicate(entry) {
                entry.estado = QueueState::Pending;
                entry.reintentado_en = Some(now);
                self.pending.push_back(pos);
                moved += 1;
            }
        }
        moved
    }
}

/// Process-local store for development runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry(&self, registro: &str) -> Option<QueueEntry> {
        let state = self.state.lock().await;
        state
            .index
            .get(registro)
            .and_then(|pos| state.entries.get(*pos))
            .cloned()
    }

    pub async fn document(&self, registro: &str) -> Option<ThesisDocument> {
        self.state.lock().await.archive.get(registro).cloned()
    }

    pub async fn archive_len(&self) -> usize {
        self.state.lock().await.archive.len()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn is_seeded(&self) -> Result<bool> {
        Ok(self.state.lock().await.seeded)
    }

    async fn mark_seeded(&self) -> Result<()> {
        self.state.lock().await.seeded = true;
        Ok(())
    }

    async fn enqueue_batch(&self, registros: &[String]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut inserted = 0u64;

        for registro in registros {
            if state.index.contains_key(registro) {
                continue;
            }
            let pos = state.entries.len();
            state.entries.push(QueueEntry::pending(registro.clone(), now));
            state.index.insert(registro.clone(), pos);
            state.pending.push_back(pos);
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn claim_next(&self) -> Result<Option<QueueEntry>> {
        let mut state = self.state.lock().await;

        while let Some(pos) = state.pending.pop_front() {
            let Some(entry) = state.entries.get_mut(pos) else {
                continue;
            };
            if entry.estado != QueueState::Pending {
                continue;
            }
            entry.estado = QueueState::Processing;
            entry.tomado_en = Some(Utc::now());
            entry.intentos += 1;
            return Ok(Some(entry.clone()));
        }

        Ok(None)
    }

    async fn mark_completed(&self, registro: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entry_mut(registro) {
            entry.estado = QueueState::Completed;
            entry.completado_en = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(&self, registro: &str, message: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entry_mut(registro) {
            entry.estado = QueueState::Failed;
            entry.error_en = Some(Utc::now());
            entry.mensaje_error = Some(message.to_string());
        }
        Ok(())
    }

    async fn requeue_failed(&self, limit: Option<u64>) -> Result<u64> {
        let mut state = self.state.lock().await;
        Ok(state.requeue_where(limit, |e| e.estado == QueueState::Failed))
    }

    async fn requeue_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        Ok(state.requeue_where(None, |e| {
            e.estado == QueueState::Processing && e.tomado_en.is_some_and(|t| t < claimed_before)
        }))
    }

    async fn count(&self, state_filter: Option<QueueState>) -> Result<u64> {
        let state = self.state.lock().await;
        let count = match state_filter {
            None => state.entries.len(),
            Some(s) => state.entries.iter().filter(|e| e.estado == s).count(),
        };
        Ok(count as u64)
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn is_processed(&self, registro: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.archive.get(registro).is_some_and(|d| d.procesado))
    }

    async fn upsert(&self, document: &ThesisDocument) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .archive
            .insert(document.registro.clone(), document.clone());
        Ok(())
    }

    async fn latest(&self, filter: &ArchiveFilter, limit: usize) -> Result<Vec<ThesisDocument>> {
        let state = self.state.lock().await;
        let mut docs: Vec<ThesisDocument> = state
            .archive
            .values()
            .filter(|d| d.procesado && filter.matches(d))
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.actualizado_en.cmp(&a.actualizado_en));
        docs.truncate(limit);
        Ok(docs)
    }
}
