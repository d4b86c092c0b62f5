use crate::config::MongoConfig;
use crate::domain::model::{
    ArchiveFilter, QueueEntry, QueueState, ThesisDocument, NOT_AVAILABLE,
};
use crate::domain::ports::{ArchiveStore, QueueStore};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use std::time::Duration;

const SEEDED_MARKER: &str = "cola_inicializada";
const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    archive: Collection<Document>,
    queue: Collection<Document>,
    meta: Collection<Document>,
}

impl MongoStore {
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout_secs));
        options.app_name = Some("acervo-etl".to_string());

        let client = Client::with_options(options)?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 }).await?;

        let store = Self {
            archive: db.collection(&config.archive_collection),
            queue: db.collection(&config.queue_collection),
            meta: db.collection(&config.meta_collection),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Keeps trying until the server answers a ping.
    pub async fn connect_with_retry(config: &MongoConfig) -> Self {
        let delay = Duration::from_secs(config.connect_retry_secs.max(1));
        loop {
            match Self::connect(config).await {
                Ok(store) => {
                    tracing::info!("🔗 Connected to MongoDB database '{}'", config.database);
                    return store;
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ MongoDB connection failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// The unique queue index is required: `enqueue_batch` relies on it for
    /// insert-if-absent. The lookup indexes only speed things up.
    async fn ensure_indexes(&self) -> Result<()> {
        self.queue
            .create_index(unique_registro_index())
            .await
            .map_err(|e| {
                EtlError::store(format!(
                    "cannot create unique index on queue registro (duplicate entries?): {}",
                    e
                ))
            })?;

        for (collection, model, label) in [
            (&self.queue, IndexModel::builder().keys(doc! { "estado": 1 }).build(), "queue estado"),
            (&self.archive, IndexModel::builder().keys(doc! { "registro": 1 }).build(), "archive registro"),
        ] {
            if let Err(e) = collection.create_index(model).await {
                tracing::warn!("Could not create {} index: {}", label, e);
            }
        }
        Ok(())
    }
}

pub(crate) fn unique_registro_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "registro": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn now() -> bson::DateTime {
    bson::DateTime::now()
}

fn read_datetime(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get_datetime(key).ok().map(|dt| dt.to_chrono())
}

fn read_u32(doc: &Document, key: &str) -> u32 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => (*v).max(0) as u32,
        Some(Bson::Int64(v)) => (*v).clamp(0, u32::MAX as i64) as u32,
        Some(Bson::Double(v)) if *v >= 0.0 => *v as u32,
        _ => 0,
    }
}

fn read_string(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key).ok().map(str::to_string)
}

fn read_vector(doc: &Document) -> Vec<f32> {
    doc.get_array("vector_busqueda")
        .map(|values| {
            values
                .iter()
                .filter_map(|v| match v {
                    Bson::Double(f) => Some(*f as f32),
                    Bson::Int32(i) => Some(*i as f32),
                    Bson::Int64(i) => Some(*i as f32),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn entry_from_document(doc: &Document) -> Result<QueueEntry> {
    let registro = read_string(doc, "registro")
        .ok_or_else(|| EtlError::store("queue entry without registro"))?;
    let estado = doc
        .get_str("estado")
        .ok()
        .and_then(QueueState::parse)
        .ok_or_else(|| EtlError::store(format!("queue entry {} has unknown estado", registro)))?;

    Ok(QueueEntry {
        estado,
        intentos: read_u32(doc, "intentos"),
        creado_en: read_datetime(doc, "creado_en").unwrap_or_else(Utc::now),
        tomado_en: read_datetime(doc, "tomado_en"),
        completado_en: read_datetime(doc, "completado_en"),
        error_en: read_datetime(doc, "error_en"),
        mensaje_error: read_string(doc, "mensaje_error"),
        reintentado_en: read_datetime(doc, "reintentado_en"),
        registro,
    })
}

pub(crate) fn thesis_from_document(doc: &Document) -> ThesisDocument {
    let text = |key: &str| read_string(doc, key).unwrap_or_default();
    let or_na = |key: &str| read_string(doc, key).unwrap_or_else(|| NOT_AVAILABLE.to_string());

    ThesisDocument {
        registro: text("registro"),
        rubro: text("rubro"),
        texto: text("texto"),
        epoca: or_na("epoca"),
        materia: or_na("materia"),
        vector_busqueda: read_vector(doc),
        fuente: read_string(doc, "fuente"),
        procesado: doc.get_bool("procesado").unwrap_or(false),
        actualizado_en: read_datetime(doc, "actualizado_en"),
    }
}

pub(crate) fn thesis_to_document(thesis: &ThesisDocument) -> Document {
    let vector: Vec<Bson> = thesis
        .vector_busqueda
        .iter()
        .map(|v| Bson::Double(f64::from(*v)))
        .collect();

    let mut document = doc! {
        "registro": thesis.registro.as_str(),
        "rubro": thesis.rubro.as_str(),
        "texto": thesis.texto.as_str(),
        "epoca": thesis.epoca.as_str(),
        "materia": thesis.materia.as_str(),
        "vector_busqueda": vector,
        "procesado": thesis.procesado,
    };
    if let Some(fuente) = &thesis.fuente {
        document.insert("fuente", fuente.as_str());
    }
    if let Some(updated) = thesis.actualizado_en {
        document.insert("actualizado_en", bson::DateTime::from_chrono(updated));
    }
    document
}

fn archive_query(filter: &ArchiveFilter) -> Document {
    let mut query = doc! { "procesado": true };
    if let Some(epoca) = &filter.epoca {
        query.insert("epoca", epoca.as_str());
    }
    if let Some(materia) = &filter.materia {
        query.insert("materia", materia.as_str());
    }
    query
}

#[async_trait]
impl QueueStore for MongoStore {
    async fn is_seeded(&self) -> Result<bool> {
        let marker = self.meta.find_one(doc! { "tipo": SEEDED_MARKER }).await?;
        Ok(marker.is_some())
    }

    async fn mark_seeded(&self) -> Result<()> {
        self.meta
            .update_one(
                doc! { "tipo": SEEDED_MARKER },
                doc! { "$set": { "fecha": now() } },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn enqueue_batch(&self, registros: &[String]) -> Result<u64> {
        if registros.is_empty() {
            return Ok(0);
        }

        let created = now();
        let documents: Vec<Document> = registros
            .iter()
            .map(|registro| {
                doc! {
                    "registro": registro.as_str(),
                    "estado": QueueState::Pending.as_str(),
                    "intentos": 0,
                    "creado_en": created,
                }
            })
            .collect();

        // The unique index turns re-enqueues into duplicate-key write errors.
        match self.queue.insert_many(documents).ordered(false).await {
            Ok(result) => Ok(result.inserted_ids.len() as u64),
            Err(e) => {
                let tolerated = match e.kind.as_ref() {
                    ErrorKind::InsertMany(failure) if failure.write_concern_error.is_none() => {
                        let write_errors = failure.write_errors.as_deref().unwrap_or_default();
                        write_errors
                            .iter()
                            .all(|w| w.code == DUPLICATE_KEY)
                            .then(|| (registros.len() - write_errors.len()) as u64)
                    }
                    _ => None,
                };
                tolerated.ok_or_else(|| e.into())
            }
        }
    }

    async fn claim_next(&self) -> Result<Option<QueueEntry>> {
        let claimed = self
            .queue
            .find_one_and_update(
                doc! { "estado": QueueState::Pending.as_str() },
                doc! {
                    "$set": {
                        "estado": QueueState::Processing.as_str(),
                        "tomado_en": now(),
                    },
                    "$inc": { "intentos": 1 },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;

        claimed.as_ref().map(entry_from_document).transpose()
    }

    async fn mark_completed(&self, registro: &str) -> Result<()> {
        self.queue
            .update_one(
                doc! { "registro": registro },
                doc! {
                    "$set": {
                        "estado": QueueState::Completed.as_str(),
                        "completado_en": now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, registro: &str, message: &str) -> Result<()> {
        self.queue
            .update_one(
                doc! { "registro": registro },
                doc! {
                    "$set": {
                        "estado": QueueState::Failed.as_str(),
                        "error_en": now(),
                        "mensaje_error": message,
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn requeue_failed(&self, limit: Option<u64>) -> Result<u64> {
        let failed = doc! { "estado": QueueState::Failed.as_str() };
        let update = doc! {
            "$set": {
                "estado": QueueState::Pending.as_str(),
                "reintentado_en": now(),
            }
        };

        let Some(limit) = limit else {
            let result = self.queue.update_many(failed, update).await?;
            return Ok(result.modified_count);
        };

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids: Vec<Bson> = self
            .queue
            .find(failed.clone())
            .projection(doc! { "_id": 1 })
            .limit(limit)
            .await?
            .try_collect::<Vec<Document>>()
            .await?
            .into_iter()
            .filter_map(|d| d.get("_id").cloned())
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        let mut scoped = failed;
        scoped.insert("_id", doc! { "$in": ids });
        let result = self.queue.update_many(scoped, update).await?;
        Ok(result.modified_count)
    }

    async fn requeue_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let result = self
            .queue
            .update_many(
                doc! {
                    "estado": QueueState::Processing.as_str(),
                    "tomado_en": { "$lt": bson::DateTime::from_chrono(claimed_before) },
                },
                doc! {
                    "$set": {
                        "estado": QueueState::Pending.as_str(),
                        "reintentado_en": now(),
                    }
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn count(&self, state: Option<QueueState>) -> Result<u64> {
        let filter = match state {
            Some(s) => doc! { "estado": s.as_str() },
            None => doc! {},
        };
        Ok(self.queue.count_documents(filter).await?)
    }
}

#[async_trait]
impl ArchiveStore for MongoStore {
    async fn is_processed(&self, registro: &str) -> Result<bool> {
        let found = self
            .archive
            .find_one(doc! { "registro": registro, "procesado": true })
            .projection(doc! { "_id": 1 })
            .await?;
        Ok(found.is_some())
    }

    async fn upsert(&self, document: &ThesisDocument) -> Result<()> {
        self.archive
            .update_one(
                doc! { "registro": document.registro.as_str() },
                doc! { "$set": thesis_to_document(document) },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn latest(&self, filter: &ArchiveFilter, limit: usize) -> Result<Vec<ThesisDocument>> {
        let documents: Vec<Document> = self
            .archive
            .find(archive_query(filter))
            .projection(doc! { "vector_busqueda": 0 })
            .sort(doc! { "actualizado_en": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;

        Ok(documents.iter().map(thesis_from_document).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_index_enforces_unique_registro() {
        let index = unique_registro_index();
        assert_eq!(index.keys, doc! { "registro": 1 });
        assert_eq!(index.options.and_then(|o| o.unique), Some(true));
    }

    #[test]
    fn test_entry_from_document_accepts_int64_attempts() {
        let taken = bson::DateTime::now();
        let doc = doc! {
            "registro": "2031000",
            "estado": "procesando",
            "intentos": 3_i64,
            "creado_en": taken,
            "tomado_en": taken,
        };

        let entry = entry_from_document(&doc).unwrap();
        assert_eq!(entry.registro, "2031000");
        assert_eq!(entry.estado, QueueState::Processing);
        assert_eq!(entry.intentos, 3);
        assert_eq!(entry.tomado_en, Some(taken.to_chrono()));
        assert!(entry.mensaje_error.is_none());
    }

    #[test]
    fn test_entry_from_document_rejects_unknown_state() {
        let doc = doc! { "registro": "1", "estado": "hecho" };
        assert!(entry_from_document(&doc).is_err());
    }

    #[test]
    fn test_thesis_document_mapping() {
        let thesis = ThesisDocument {
            registro: "L-CFF-38".to_string(),
            rubro: "CFF ARTÍCULO 38".to_string(),
            texto: "Los actos administrativos...".to_string(),
            epoca: "LEY VIGENTE".to_string(),
            materia: "FISCAL".to_string(),
            vector_busqueda: vec![0.5, -0.25],
            fuente: None,
            procesado: true,
            actualizado_en: None,
        };

        let document = thesis_to_document(&thesis);
        assert!(!document.contains_key("fuente"));
        assert!(!document.contains_key("actualizado_en"));

        let back = thesis_from_document(&document);
        assert_eq!(back, thesis);
    }

    #[test]
    fn test_archive_query_includes_filters() {
        let filter = ArchiveFilter::new(Some("Quinta Época".to_string()), None);
        let query = archive_query(&filter);
        assert!(query.get_bool("procesado").unwrap());
        assert_eq!(query.get_str("epoca").unwrap(), "Quinta Época");
        assert!(!query.contains_key("materia"));
    }
}
