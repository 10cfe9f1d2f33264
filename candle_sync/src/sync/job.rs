//! Multi-pair sync: every instrument times every granularity.

use std::{fmt, num::NonZeroUsize, sync::Arc};

use candle_ingestor::models::{granularity::Granularity, instrument::Instrument};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, info};

use crate::sync::{CandleSync, SyncError, SyncOutcome};

/// One (instrument, granularity) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    /// Instrument to fetch.
    pub instrument: Instrument,
    /// Candle granularity.
    pub granularity: Granularity,
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.instrument, self.granularity)
    }
}

/// A matrix of pairs over one date range.
#[derive(Debug, Clone)]
pub struct SyncJob {
    /// Instruments, in the order they are reported.
    pub instruments: Vec<Instrument>,
    /// Granularities fetched for every instrument.
    pub granularities: Vec<Granularity>,
    /// Range start.
    pub from: DateTime<Utc>,
    /// Range end; `None` means now.
    pub to: Option<DateTime<Utc>>,
    /// Pairs processed at once.
    pub max_parallel_pairs: NonZeroUsize,
}

/// Per-pair results of a [`SyncJob`], in instrument-major order.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Outcome of every pair.
    pub outcomes: IndexMap<Pair, Result<SyncOutcome, SyncError>>,
}

impl SyncReport {
    /// Pairs that completed (possibly with gaps).
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|r| r.is_ok()).count()
    }

    /// Pairs that returned an error.
    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|r| r.is_err()).count()
    }

    /// Rows added across all pairs.
    pub fn total_inserted(&self) -> usize {
        self.outcomes
            .values()
            .filter_map(|r| r.as_ref().ok())
            .map(|o| o.inserted)
            .sum()
    }
}

impl SyncJob {
    /// Every (instrument, granularity) combination, instrument-major.
    pub fn pairs(&self) -> Vec<Pair> {
        self.instruments
            .iter()
            .flat_map(|instrument| {
                self.granularities.iter().map(move |&granularity| Pair {
                    instrument: instrument.clone(),
                    granularity,
                })
            })
            .collect()
    }

    /// Runs every pair through `pipeline`, at most `max_parallel_pairs` at a time.
    ///
    /// A failing pair is logged and recorded; the others carry on.
    pub async fn run(&self, pipeline: Arc<CandleSync>) -> SyncReport {
        let pairs = self.pairs();
        info!(
            pairs = pairs.len(),
            max_parallel_pairs = self.max_parallel_pairs.get(),
            from = %self.from,
            "starting sync job"
        );

        let limit = Arc::new(Semaphore::new(self.max_parallel_pairs.get()));
        let mut tasks = JoinSet::new();
        for (position, pair) in pairs.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&pipeline);
            let limit = Arc::clone(&limit);
            let (from, to) = (self.from, self.to);
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                let result = pipeline
                    .fetch_and_store(&pair.instrument, pair.granularity, from, to)
                    .await;
                (position, result)
            });
        }

        let mut results: Vec<Option<Result<SyncOutcome, SyncError>>> =
            std::iter::repeat_with(|| None).take(pairs.len()).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => {
                    match &result {
                        Ok(outcome) => info!(
                            pair = %pairs[position],
                            inserted = outcome.inserted,
                            failed_chunks = outcome.failed_chunks,
                            "pair synced"
                        ),
                        Err(e) => error!(pair = %pairs[position], error = %e, "pair failed"),
                    }
                    results[position] = Some(result);
                }
                Err(e) => error!(error = %e, "pair task did not finish"),
            }
        }

        let mut report = SyncReport::default();
        for (pair, result) in pairs.into_iter().zip(results) {
            let result = result.unwrap_or_else(|| {
                Err(SyncError::Store {
                    instrument: pair.instrument.clone(),
                    granularity: pair.granularity,
                    source: crate::store::StoreError::Join("pair task did not finish".into()),
                })
            });
            report.outcomes.insert(pair, result);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            inserted = report.total_inserted(),
            "sync job finished"
        );
        report
    }
}
