// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::error::FetchError;
use crate::ingest::scheduler::Job;
use crate::ingest::types::{NewsFeed, NewsRecord};
use crate::store::{InsertOutcome, NewsStore};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_ingest_runs_total", "Ingestion ticks started.");
        describe_counter!(
            "news_ingest_inserted_total",
            "Records stored for the first time."
        );
        describe_counter!(
            "news_ingest_already_present_total",
            "Records skipped because their id was already stored."
        );
        describe_counter!(
            "news_ingest_invalid_total",
            "Feed items rejected by validation."
        );
        describe_counter!(
            "news_ingest_item_errors_total",
            "Per-item storage failures."
        );
        describe_counter!("news_fetch_errors_total", "Feed fetch failures.");
        describe_counter!(
            "news_ingest_skipped_ticks_total",
            "Ticks skipped because the previous one was still running."
        );
        describe_histogram!("news_fetch_ms", "Feed round trip in milliseconds.");
        describe_histogram!("news_parse_ms", "Feed body parse time in milliseconds.");
        describe_gauge!(
            "news_ingest_last_run_ts",
            "Unix ts when the ingest pipeline last completed a fetch."
        );
    });
}

/// Outcome counts of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub invalid: usize,
    pub failed: usize,
}

/// Fetch-then-insert-if-absent pipeline.
///
/// Overlapping runs are safe: the store's conditional write is the only
/// deduplication mechanism and needs no lock here.
#[derive(Clone)]
pub struct NewsIngestor {
    feed: Arc<dyn NewsFeed>,
    store: Arc<dyn NewsStore>,
}

impl NewsIngestor {
    pub fn new(feed: Arc<dyn NewsFeed>, store: Arc<dyn NewsStore>) -> Self {
        Self { feed, store }
    }

    /// Run ingest once. A fetch failure aborts the run; item failures are
    /// counted and skipped.
    pub async fn run_once(&self) -> Result<IngestReport, FetchError> {
        ensure_metrics_described();
        counter!("news_ingest_runs_total").increment(1);

        let batch = match self.feed.fetch_latest().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, provider = self.feed.name(), "feed fetch failed");
                counter!("news_fetch_errors_total").increment(1);
                return Err(e);
            }
        };

        let mut report = IngestReport {
            fetched: batch.len(),
            ..IngestReport::default()
        };

        for (idx, item) in batch.into_iter().enumerate() {
            let record = match item.and_then(NewsRecord::try_from) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "ingest", index = idx, error = %e, "invalid feed item");
                    report.invalid += 1;
                    continue;
                }
            };

            match self.store.insert_if_absent(&record).await {
                Ok(InsertOutcome::Inserted) => report.inserted += 1,
                Ok(InsertOutcome::AlreadyPresent) => report.already_present += 1,
                Err(e) => {
                    tracing::warn!(
                        target: "ingest",
                        id = %record.id,
                        error = %e,
                        "storing item failed"
                    );
                    report.failed += 1;
                }
            }
        }

        // Telemetry
        counter!("news_ingest_inserted_total").increment(report.inserted as u64);
        counter!("news_ingest_already_present_total").increment(report.already_present as u64);
        counter!("news_ingest_invalid_total").increment(report.invalid as u64);
        counter!("news_ingest_item_errors_total").increment(report.failed as u64);
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        gauge!("news_ingest_last_run_ts").set(now as f64);

        tracing::info!(
            target: "ingest",
            provider = self.feed.name(),
            fetched = report.fetched,
            inserted = report.inserted,
            already_present = report.already_present,
            invalid = report.invalid,
            failed = report.failed,
            "ingest run finished"
        );

        Ok(report)
    }
}

#[async_trait::async_trait]
impl Job for NewsIngestor {
    async fn run(&self) -> anyhow::Result<()> {
        self.run_once().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "news-ingest"
    }
}
