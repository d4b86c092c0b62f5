use crate::domain::model::RegisterRange;
use crate::domain::ports::QueueStore;
use crate::domain::services::merge_ranges;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub skipped: bool,
    pub scanned: u64,
    pub inserted: u64,
}

/// Fills the queue with every register in `ranges`, once per store.
///
/// Runs are idempotent: registers already queued are left untouched, and the
/// marker written at the end makes later runs return immediately.
pub async fn seed_queue<Q>(store: &Q, ranges: &[RegisterRange], batch_size: usize) -> Result<SeedReport>
where
    Q: QueueStore + ?Sized,
{
    if store.is_seeded().await? {
        tracing::info!("📦 Queue already initialised, skipping seeding");
        return Ok(SeedReport {
            skipped: true,
            ..SeedReport::default()
        });
    }

    let merged = merge_ranges(ranges);
    let expected: u64 = merged.iter().map(RegisterRange::len).sum();
    tracing::info!(
        "📦 Initialising queue with {} registers across {} ranges...",
        expected,
        merged.len()
    );

    let batch_size = batch_size.max(1);
    let mut report = SeedReport::default();
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);

    for range in &merged {
        for registro in range.start..range.end {
            batch.push(registro.to_string());
            if batch.len() >= batch_size {
                report.inserted += store.enqueue_batch(&batch).await?;
                report.scanned += batch.len() as u64;
                batch.clear();
            }
        }
        tracing::debug!("Enqueued range {}..{}", range.start, range.end);
    }
    if !batch.is_empty() {
        report.inserted += store.enqueue_batch(&batch).await?;
        report.scanned += batch.len() as u64;
    }

    store.mark_seeded().await?;
    tracing::info!(
        "✅ Queue initialised: {} new of {} registers",
        report.inserted,
        report.scanned
    );
    Ok(report)
}
