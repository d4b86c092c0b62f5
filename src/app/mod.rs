//! Wiring shared by the binaries: store selection, engine construction and
//! the three run modes (worker, dashboard, both).

use crate::adapters::{MemoryStore, MongoStore, OpenAiEmbedder, ScjnClient};
use crate::config::cli::{CliArgs, StoreKind};
use crate::config::{AppConfig, MongoConfig};
use crate::core::etl::EtlEngine;
use crate::dashboard::{self, DashboardState};
use crate::domain::ports::Stores;
use crate::utils::error::{EtlError, ErrorSeverity, Result};
use crate::utils::shutdown;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Worker,
    Api,
    Combined,
}

impl Mode {
    fn runs_worker(&self) -> bool {
        matches!(self, Mode::Worker | Mode::Combined)
    }
}

pub fn load_config(args: &CliArgs, mode: Mode) -> Result<AppConfig> {
    let config = args.load_config()?;
    if mode.runs_worker() {
        config.validate_for_worker()?;
    } else {
        config.validate_config()?;
    }
    tracing::debug!("Effective configuration: {:?}", redacted(&config));
    Ok(config)
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut copy = config.clone();
    if copy.embedding.api_key.is_some() {
        copy.embedding.api_key = Some("***".to_string());
    }
    if let Some((_, host)) = copy.mongo.uri.rsplit_once('@') {
        copy.mongo.uri = format!("mongodb://***@{}", host);
    }
    copy
}

pub async fn connect_stores(kind: StoreKind, config: &MongoConfig) -> Stores {
    match kind {
        StoreKind::Memory => {
            tracing::warn!("🧪 Using the in-memory store; nothing will be persisted");
            Stores::shared(Arc::new(MemoryStore::new()))
        }
        StoreKind::Mongo => Stores::shared(Arc::new(MongoStore::connect_with_retry(config).await)),
    }
}

pub fn build_engine(config: &AppConfig, stores: Stores, args: &CliArgs) -> Result<EtlEngine> {
    let source = Arc::new(ScjnClient::new(&config.source)?);
    let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);

    let engine = EtlEngine::new_with_monitoring(
        stores,
        source,
        embedder,
        config.worker.clone(),
        args.monitor,
    );
    Ok(if args.no_seed {
        engine.without_seeding()
    } else {
        engine
    })
}

pub async fn run_worker(args: &CliArgs, config: AppConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let stores = tokio::select! {
        stores = connect_stores(args.store, &config.mongo) => stores,
        _ = shutdown::wait_for(shutdown.clone()) => {
            tracing::info!("🛑 Shutdown requested before the store was reachable");
            return Ok(());
        }
    };
    build_engine(&config, stores, args)?.run(shutdown).await
}

pub async fn run_api(args: &CliArgs, config: AppConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let state = DashboardState::new(config.dashboard.clone());

    let installer = state.clone();
    let kind = args.store;
    let mongo = config.mongo.clone();
    tokio::spawn(async move {
        installer.install(connect_stores(kind, &mongo).await);
        tracing::info!("🚀 Dashboard connected to the store");
    });

    dashboard::serve(
        &config.dashboard.bind_addr,
        state,
        shutdown::wait_for(shutdown),
    )
    .await
}

/// Dashboard in the foreground, worker as a background task sharing its stores.
///
/// A worker failure stops the dashboard too, so the process exits non-zero
/// instead of serving a dashboard for a dead worker.
pub async fn run_combined(
    args: &CliArgs,
    config: AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let state = DashboardState::new(config.dashboard.clone());

    let installer = state.clone();
    let worker_args = args.clone();
    let worker_config = config.clone();
    let worker_shutdown = shutdown.clone();
    let mut worker = tokio::spawn(async move {
        let stores = connect_stores(worker_args.store, &worker_config.mongo).await;
        installer.install(stores.clone());
        tracing::info!("🚀 Worker started in background");

        let result = match build_engine(&worker_config, stores, &worker_args) {
            Ok(engine) => engine.run(worker_shutdown).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::error!("❌ Worker stopped: {}", e);
        }
        result
    });

    let readiness = state.clone();
    let server = dashboard::serve(
        &config.dashboard.bind_addr,
        state,
        shutdown::wait_for(shutdown),
    );
    tokio::pin!(server);

    tokio::select! {
        served = &mut server => {
            served?;
            // still waiting for the database: nothing to drain
            if !readiness.is_ready() {
                worker.abort();
            }
            worker_result(worker.await)
        }
        joined = &mut worker => {
            worker_result(joined)?;
            // the worker only returns Ok after shutdown was requested
            server.await
        }
    }
}

fn worker_result(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(EtlError::ProcessingError {
            message: format!("worker task failed: {}", e),
        }),
    }
}

/// Exit code by severity; 0 is reserved for success.
pub fn exit_code(error: &EtlError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

/// Reports a fatal error the way every binary does and terminates.
pub fn exit_with(error: EtlError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());
    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 {}", error.recovery_suggestion());
    std::process::exit(exit_code(&error).max(1))
}
