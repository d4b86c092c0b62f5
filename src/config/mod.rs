#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::model::RegisterRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SCJN_ENDPOINT: &str =
    "https://bicentenario.scjn.gob.mx/repositorio-scjn/api/v1/tesis";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Register ranges the queue is seeded with: the statute-era blocks plus the
/// bulk sweep of the historical repository. Overlaps are merged at seed time.
pub const DEFAULT_BLOCKS: &[RegisterRange] = &[
    RegisterRange::new(206000, 207000),
    RegisterRange::new(160000, 161000),
    RegisterRange::new(2023000, 2028000),
    RegisterRange::new(292564, 1600000),
    RegisterRange::new(161000, 206000),
    RegisterRange::new(207000, 2023000),
    RegisterRange::new(2028000, 2031780),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mongo: MongoConfig,
    pub source: SourceConfig,
    pub embedding: EmbeddingConfig,
    pub worker: WorkerConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub archive_collection: String,
    pub queue_collection: String,
    pub meta_collection: String,
    pub server_selection_timeout_secs: u64,
    pub connect_retry_secs: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "tepantlatia_db".to_string(),
            archive_collection: "acervo_historico".to_string(),
            queue_collection: "cola_tesis".to_string(),
            meta_collection: "meta".to_string(),
            server_selection_timeout_secs: 5,
            connect_retry_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SCJN_ENDPOINT.to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub pacing_ms: u64,
    pub idle_wait_secs: u64,
    pub max_consecutive_errors: u32,
    pub backoff_base_secs: u64,
    pub throughput_window: usize,
    pub throughput_min_samples: usize,
    pub seed_batch_size: usize,
    pub load_fundamental_laws: bool,
    /// Return abandoned claims to pending at start-up.
    pub recover_stale_claims: bool,
    /// Age after which a claim counts as abandoned.
    pub stale_claim_minutes: u64,
    /// Log process stats every N processed entries when monitoring is on.
    pub monitor_every: usize,
    pub blocks: Vec<RegisterRange>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 400,
            idle_wait_secs: 10,
            max_consecutive_errors: 5,
            backoff_base_secs: 3,
            throughput_window: 20,
            throughput_min_samples: 5,
            seed_batch_size: 1000,
            load_fundamental_laws: true,
            recover_stale_claims: true,
            stale_claim_minutes: 30,
            monitor_every: 100,
            blocks: DEFAULT_BLOCKS.to_vec(),
        }
    }
}

impl WorkerConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_secs(self.idle_wait_secs)
    }

    /// Pause applied after `consecutive` transient failures in a row.
    pub fn backoff(&self, consecutive: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_mul(u64::from(consecutive)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind_addr: String,
    pub recent_limit: usize,
    pub rubro_preview_chars: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            recent_limit: 10,
            rubro_preview_chars: 80,
        }
    }
}
