use crate::domain::model::{FetchOutcome, QueueEntry, ThesisDocument, ThesisPayload, SOURCE_BICENTENARIO};
use crate::domain::ports::{Embedder, Stores, ThesisSource};
use crate::domain::services::embedding_text;
use crate::utils::error::Result;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed,
    /// Already archived by an earlier run.
    Skipped,
    /// `transient` failures count towards the upstream back-off.
    Failed { reason: String, transient: bool },
}

impl ProcessOutcome {
    pub fn is_transient_failure(&self) -> bool {
        matches!(self, ProcessOutcome::Failed { transient: true, .. })
    }
}

/// Fetch, embed and archive a single queued register.
pub struct RecordProcessor {
    stores: Stores,
    source: Arc<dyn ThesisSource>,
    embedder: Arc<dyn Embedder>,
}

impl RecordProcessor {
    pub fn new(stores: Stores, source: Arc<dyn ThesisSource>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            stores,
            source,
            embedder,
        }
    }

    /// Never fails: every problem ends up recorded on the queue entry.
    pub async fn process_entry(&self, entry: &QueueEntry) -> ProcessOutcome {
        let registro = entry.registro.as_str();

        match self.try_process(registro).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("⚠️ Error processing {}: {}", registro, e);
                let reason = e.to_string();
                if let Err(mark_err) = self.stores.queue.mark_failed(registro, &reason).await {
                    tracing::error!("Could not record failure for {}: {}", registro, mark_err);
                }
                ProcessOutcome::Failed {
                    reason,
                    transient: e.is_transient(),
                }
            }
        }
    }

    async fn try_process(&self, registro: &str) -> Result<ProcessOutcome> {
        if self.stores.archive.is_processed(registro).await? {
            tracing::debug!("⏭️ {} already archived", registro);
            self.stores.queue.mark_completed(registro).await?;
            return Ok(ProcessOutcome::Skipped);
        }

        let payload = match self.source.fetch(registro).await? {
            FetchOutcome::Found(payload) => payload,
            FetchOutcome::Status(code) => {
                let transient = code >= 500 || code == 429;
                return self.fail(registro, format!("HTTP {}", code), transient).await;
            }
        };

        if payload.rubro.is_empty() || payload.texto.is_empty() {
            return self
                .fail(registro, "missing rubro or texto".to_string(), false)
                .await;
        }

        tracing::info!("🧠 Processing {}...", registro);
        let vector = match self
            .embedder
            .embed(&embedding_text(&payload.rubro, &payload.texto))
            .await
        {
            Ok(vector) => vector,
            Err(e) => {
                return self
                    .fail(registro, format!("embedding failed: {}", e), true)
                    .await
            }
        };

        self.stores
            .archive
            .upsert(&archive_document(registro, payload, vector))
            .await?;
        self.stores.queue.mark_completed(registro).await?;
        Ok(ProcessOutcome::Completed)
    }

    async fn fail(&self, registro: &str, reason: String, transient: bool) -> Result<ProcessOutcome> {
        tracing::warn!("⚠️ {}: {}", registro, reason);
        self.stores.queue.mark_failed(registro, &reason).await?;
        Ok(ProcessOutcome::Failed { reason, transient })
    }
}

fn archive_document(registro: &str, payload: ThesisPayload, vector: Vec<f32>) -> ThesisDocument {
    ThesisDocument {
        registro: registro.to_string(),
        rubro: payload.rubro,
        texto: payload.texto,
        epoca: payload.epoca,
        materia: payload.materia,
        vector_busqueda: vector,
        fuente: Some(SOURCE_BICENTENARIO.to_string()),
        procesado: true,
        actualizado_en: Some(Utc::now()),
    }
}
