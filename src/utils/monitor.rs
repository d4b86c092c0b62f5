use std::collections::VecDeque;
use std::time::Instant;

#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::Duration;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Sliding window of completion timestamps used to report records/second.
#[derive(Debug)]
pub struct ThroughputTracker {
    samples: VecDeque<Instant>,
    capacity: usize,
    min_samples: usize,
}

impl ThroughputTracker {
    pub fn new(capacity: usize, min_samples: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            min_samples: min_samples.clamp(2, capacity),
        }
    }

    pub fn record(&mut self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&mut self, at: Instant) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Records per second across the window, once enough samples exist.
    pub fn rate(&self) -> Option<f64> {
        if self.samples.len() < self.min_samples {
            return None;
        }
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        let elapsed = last.duration_since(*first).as_secs_f64();
        if elapsed <= f64::EPSILON {
            return None;
        }
        Some(self.samples.len() as f64 / elapsed)
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ProcessStats {
    pub cpu_percent: f32,
    pub rss_mb: u64,
    pub rss_percent: f32,
    pub peak_rss_mb: u64,
    pub uptime: Duration,
}

#[cfg(feature = "cli")]
struct Sampler {
    system: System,
    peak_rss_mb: u64,
}

/// Samples this process's CPU and resident memory for periodic log lines.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    sampler: Option<Mutex<Sampler>>,
    pid: Option<Pid>,
    started: Instant,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let sampler = enabled.then(|| {
            let mut system = System::new();
            system.refresh_memory();
            Mutex::new(Sampler {
                system,
                peak_rss_mb: 0,
            })
        });

        Self {
            sampler,
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
        }
    }

    pub fn get_stats(&self) -> Option<ProcessStats> {
        let pid = self.pid?;
        let mut sampler = self.sampler.as_ref()?.lock().ok()?;

        sampler.system.refresh_memory();
        sampler
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let total_mb = sampler.system.total_memory() / 1024 / 1024;
        let process = sampler.system.process(pid)?;
        let rss_mb = process.memory() / 1024 / 1024;
        let cpu_percent = process.cpu_usage();

        sampler.peak_rss_mb = sampler.peak_rss_mb.max(rss_mb);
        let rss_percent = if total_mb > 0 {
            rss_mb as f32 / total_mb as f32 * 100.0
        } else {
            0.0
        };

        Some(ProcessStats {
            cpu_percent,
            rss_mb,
            rss_percent,
            peak_rss_mb: sampler.peak_rss_mb,
            uptime: self.started.elapsed(),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB, Uptime: {:?}",
                phase,
                stats.cpu_percent,
                stats.rss_mb,
                stats.rss_percent,
                stats.peak_rss_mb,
                stats.uptime
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sampler.is_some()
    }
}

// Without the cli feature there is no sysinfo, so monitoring is a no-op.
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
