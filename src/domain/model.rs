use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SOURCE_BICENTENARIO: &str = "Repositorio Bicentenario";
pub const NOT_AVAILABLE: &str = "N/A";

/// Lifecycle of a register number in the work queue.
///
/// The serialized names are the values stored in the `estado` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueState {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "procesando")]
    Processing,
    #[serde(rename = "completado")]
    Completed,
    #[serde(rename = "error")]
    Failed,
}

impl QueueState {
    pub const ALL: [QueueState; 4] = [
        QueueState::Pending,
        QueueState::Processing,
        QueueState::Completed,
        QueueState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Pending => "pendiente",
            QueueState::Processing => "procesando",
            QueueState::Completed => "completado",
            QueueState::Failed => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub registro: String,
    pub estado: QueueState,
    pub intentos: u32,
    pub creado_en: DateTime<Utc>,
    pub tomado_en: Option<DateTime<Utc>>,
    pub completado_en: Option<DateTime<Utc>>,
    pub error_en: Option<DateTime<Utc>>,
    pub mensaje_error: Option<String>,
    pub reintentado_en: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn pending(registro: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            registro: registro.into(),
            estado: QueueState::Pending,
            intentos: 0,
            creado_en: now,
            tomado_en: None,
            completado_en: None,
            error_en: None,
            mensaje_error: None,
            reintentado_en: None,
        }
    }
}

/// A thesis (or statute) stored in the archive with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisDocument {
    pub registro: String,
    pub rubro: String,
    pub texto: String,
    pub epoca: String,
    pub materia: String,
    pub vector_busqueda: Vec<f32>,
    pub fuente: Option<String>,
    pub procesado: bool,
    pub actualizado_en: Option<DateTime<Utc>>,
}

/// Fields pulled out of an upstream thesis response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThesisPayload {
    pub rubro: String,
    pub texto: String,
    pub epoca: String,
    pub materia: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(ThesisPayload),
    Status(u16),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveFilter {
    pub epoca: Option<String>,
    pub materia: Option<String>,
}

impl ArchiveFilter {
    /// Blank query parameters mean "no filter".
    pub fn new(epoca: Option<String>, materia: Option<String>) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            epoca: clean(epoca),
            materia: clean(materia),
        }
    }

    pub fn matches(&self, doc: &ThesisDocument) -> bool {
        self.epoca.as_deref().map_or(true, |e| doc.epoca == e)
            && self.materia.as_deref().map_or(true, |m| doc.materia == m)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Half-open range `[start, end)` of register numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegisterRange {
    pub start: u64,
    pub end: u64,
}

impl RegisterRange {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&QueueState::Failed).unwrap(),
            "\"error\""
        );
        assert_eq!(QueueState::parse("procesando"), Some(QueueState::Processing));
        assert_eq!(QueueState::parse("done"), None);
    }

    #[test]
    fn test_archive_filter_ignores_blank_values() {
        let filter = ArchiveFilter::new(Some("  ".to_string()), Some("FISCAL".to_string()));
        assert_eq!(filter.epoca, None);
        assert_eq!(filter.materia.as_deref(), Some("FISCAL"));
    }
}
