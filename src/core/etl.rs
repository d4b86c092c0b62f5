use crate::config::WorkerConfig;
use crate::core::laws::load_fundamental_laws;
use crate::core::queue::seed_queue;
use crate::core::worker::{ProcessOutcome, RecordProcessor};
use crate::domain::ports::{Embedder, Stores, ThesisSource};
use crate::utils::error::Result;
use crate::utils::monitor::{SystemMonitor, ThroughputTracker};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Idle,
    Processed {
        registro: String,
        outcome: ProcessOutcome,
    },
}

/// Drives the queue: start-up housekeeping, then claim/process until shutdown.
pub struct EtlEngine {
    stores: Stores,
    embedder: Arc<dyn Embedder>,
    processor: RecordProcessor,
    config: WorkerConfig,
    monitor: SystemMonitor,
    seed: bool,
    consecutive_failures: u32,
    throughput: ThroughputTracker,
    processed: u64,
}

impl EtlEngine {
    pub fn new(
        stores: Stores,
        source: Arc<dyn ThesisSource>,
        embedder: Arc<dyn Embedder>,
        config: WorkerConfig,
    ) -> Self {
        Self::new_with_monitoring(stores, source, embedder, config, false)
    }

    pub fn new_with_monitoring(
        stores: Stores,
        source: Arc<dyn ThesisSource>,
        embedder: Arc<dyn Embedder>,
        config: WorkerConfig,
        monitor_enabled: bool,
    ) -> Self {
        let processor = RecordProcessor::new(stores.clone(), source, embedder.clone());
        let throughput =
            ThroughputTracker::new(config.throughput_window, config.throughput_min_samples);

        Self {
            stores,
            embedder,
            processor,
            config,
            monitor: SystemMonitor::new(monitor_enabled),
            seed: true,
            consecutive_failures: 0,
            throughput,
            processed: 0,
        }
    }

    pub fn without_seeding(mut self) -> Self {
        self.seed = false;
        self
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Statute loading, queue seeding and recovery of abandoned claims.
    pub async fn prepare(&self) -> Result<()> {
        if self.config.load_fundamental_laws {
            load_fundamental_laws(self.stores.archive.as_ref(), self.embedder.as_ref()).await?;
        }

        if self.seed {
            seed_queue(
                self.stores.queue.as_ref(),
                &self.config.blocks,
                self.config.seed_batch_size,
            )
            .await?;
        }

        let cutoff = i64::try_from(self.config.stale_claim_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .and_then(|age| Utc::now().checked_sub_signed(age));
        if let (true, Some(cutoff)) = (self.config.recover_stale_claims, cutoff) {
            let recovered = self.stores.queue.requeue_stale(cutoff).await?;
            if recovered > 0 {
                tracing::info!("♻️ Returned {} abandoned claims to the queue", recovered);
            }
        }

        self.monitor.log_stats("Startup");
        Ok(())
    }

    /// Claims and processes at most one entry.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        let Some(entry) = self.stores.queue.claim_next().await? else {
            return Ok(StepOutcome::Idle);
        };

        let outcome = self.processor.process_entry(&entry).await;
        self.observe(&outcome);

        Ok(StepOutcome::Processed {
            registro: entry.registro,
            outcome,
        })
    }

    fn observe(&mut self, outcome: &ProcessOutcome) {
        if outcome.is_transient_failure() {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }

        self.processed += 1;
        self.throughput.record();
        if let Some(rate) = self.throughput.rate() {
            tracing::info!("⚡ Throughput: {:.2} theses/second", rate);
        }

        if self.monitor.is_enabled()
            && self.config.monitor_every > 0
            && self.processed % self.config.monitor_every as u64 == 0
        {
            self.monitor.log_stats("Worker");
        }
    }

    /// Back-off owed after the latest step, resetting the failure streak.
    pub fn take_backoff(&mut self) -> Option<Duration> {
        if self.consecutive_failures < self.config.max_consecutive_errors {
            return None;
        }
        let wait = self.config.backoff(self.consecutive_failures);
        self.consecutive_failures = 0;
        Some(wait)
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!("🚀 Worker starting");
        self.prepare().await?;

        while !*shutdown.borrow() {
            let wait = match self.step().await {
                Ok(StepOutcome::Idle) => {
                    tracing::info!("⏸️ No pending entries in the queue. Waiting...");
                    self.config.idle_wait()
                }
                Ok(StepOutcome::Processed { .. }) => match self.take_backoff() {
                    Some(backoff) => {
                        tracing::warn!("⏳ Upstream unstable, pausing for {:?}", backoff);
                        backoff
                    }
                    None => self.config.pacing(),
                },
                Err(e) => {
                    tracing::error!("❌ Could not claim from the queue: {}", e);
                    self.config.idle_wait()
                }
            };

            if pause(wait, &mut shutdown).await {
                break;
            }
        }

        tracing::info!("🛑 Worker stopped after {} entries", self.processed);
        self.monitor.log_stats("Shutdown");
        Ok(())
    }
}

/// Sleeps for `duration`; returns true if shutdown was requested meanwhile.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        return *shutdown.borrow();
    }
    let sender_gone = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => changed.is_err(),
    };
    sender_gone || *shutdown.borrow()
}
