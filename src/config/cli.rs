use crate::config::AppConfig;
use crate::utils::error::Result;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// MongoDB (production)
    Mongo,
    /// Process-local store, lost on exit
    Memory,
}

/// Flags shared by every binary; settings not given here come from the
/// config file and environment.
#[derive(Debug, Clone, Parser)]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ACERVO_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long, env = "ACERVO_JSON_LOGS")]
    pub json_logs: bool,

    /// Log process CPU and memory usage while working
    #[arg(long)]
    pub monitor: bool,

    /// Storage backend
    #[arg(long, value_enum, default_value = "mongo")]
    pub store: StoreKind,

    /// Dashboard listen address, e.g. 0.0.0.0:8000
    #[arg(long)]
    pub bind: Option<String>,

    /// Skip queue seeding even if the queue was never initialised
    #[arg(long)]
    pub no_seed: bool,
}

impl CliArgs {
    /// Defaults, then the config file, then `.env`/process environment, then flags.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                AppConfig::from_file(path)?
            }
            None => AppConfig::default(),
        };

        config.apply_process_env();

        if let Some(bind) = &self.bind {
            config.dashboard.bind_addr = bind.clone();
        }

        Ok(config)
    }
}
