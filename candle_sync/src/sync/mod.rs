//! Fetch, normalize and store for one (instrument, granularity) pair.
//!
//! [`CandleSync`] ties a [`ParallelFetcher`] to a [`CandleStore`]. The store is
//! blocking, so every store call runs on tokio's blocking pool.
//!
//! [`job`] runs the same pipeline over a matrix of pairs.

pub mod job;

use std::sync::Arc;

use candle_ingestor::{
    errors::Error as IngestError,
    models::{candle::CandleBatch, granularity::Granularity, instrument::Instrument},
    normalize::normalize,
    requests::historical::ParallelFetcher,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{CandleStore, StoreError};

pub use job::{SyncJob, SyncReport};

/// A pipeline failure for one pair.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching or normalizing failed.
    #[error("{instrument} {granularity}: {source}")]
    Ingest {
        /// Pair instrument.
        instrument: Instrument,
        /// Pair granularity.
        granularity: Granularity,
        /// Underlying error.
        source: IngestError,
    },

    /// Persisting failed; nothing from this run was written.
    #[error("{instrument} {granularity}: {source}")]
    Store {
        /// Pair instrument.
        instrument: Instrument,
        /// Pair granularity.
        granularity: Granularity,
        /// Underlying error.
        source: StoreError,
    },
}

/// What one pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Table the candles went to.
    pub table: String,
    /// Requests planned (1 in count mode).
    pub planned_chunks: usize,
    /// Requests that failed and left a gap.
    pub failed_chunks: usize,
    /// Complete candles after normalization.
    pub fetched: usize,
    /// Rows actually added; lower than `fetched` when some were already stored.
    pub inserted: usize,
}

/// Fetch-and-store pipeline for single pairs.
pub struct CandleSync {
    fetcher: ParallelFetcher,
    store: Arc<dyn CandleStore>,
}

impl CandleSync {
    /// Creates a pipeline over an existing fetcher and store.
    pub fn new(fetcher: ParallelFetcher, store: Arc<dyn CandleStore>) -> Self {
        Self { fetcher, store }
    }

    /// The store this pipeline writes to.
    pub fn store(&self) -> &Arc<dyn CandleStore> {
        &self.store
    }

    /// Fetches `[from, to)` (`to = None` means now) and stores every complete candle.
    ///
    /// Chunk failures leave gaps and are counted in
    /// [`failed_chunks`](SyncOutcome::failed_chunks); they do not fail the run.
    pub async fn fetch_and_store(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<SyncOutcome, SyncError> {
        let table = self.ensure_table(instrument, granularity).await?;

        let fetched = self
            .fetcher
            .fetch_range(instrument, granularity, from, to)
            .await
            .map_err(|source| SyncError::Ingest {
                instrument: instrument.clone(),
                granularity,
                source,
            })?;

        if !fetched.is_complete() {
            warn!(
                %instrument,
                %granularity,
                failed = fetched.failures.len(),
                planned = fetched.planned_chunks,
                "some chunks failed, stored data will have gaps"
            );
        }

        let mut outcome = self.store_batches(instrument, granularity, &fetched.batches).await?;
        outcome.table = table;
        outcome.planned_chunks = fetched.planned_chunks;
        outcome.failed_chunks = fetched.failures.len();
        Ok(outcome)
    }

    /// Fetches the latest `count` candles and stores the complete ones.
    pub async fn fetch_latest(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        count: u32,
    ) -> Result<SyncOutcome, SyncError> {
        let table = self.ensure_table(instrument, granularity).await?;

        let batch = self
            .fetcher
            .fetch_latest(instrument, granularity, count)
            .await
            .map_err(|source| SyncError::Ingest {
                instrument: instrument.clone(),
                granularity,
                source,
            })?;

        let mut outcome = self
            .store_batches(instrument, granularity, std::slice::from_ref(&batch))
            .await?;
        outcome.table = table;
        outcome.planned_chunks = 1;
        Ok(outcome)
    }

    async fn ensure_table(&self, instrument: &Instrument, granularity: Granularity) -> Result<String, SyncError> {
        let owned = instrument.clone();
        self.blocking(instrument, granularity, move |store| {
            store.ensure_table(&owned, granularity)
        })
        .await
    }

    async fn store_batches(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        batches: &[CandleBatch],
    ) -> Result<SyncOutcome, SyncError> {
        if batches.iter().all(|b| b.candles.is_empty()) {
            info!(%instrument, %granularity, "no candles returned, nothing to store");
            return Ok(SyncOutcome::default());
        }

        let series = normalize(batches).map_err(|source| SyncError::Ingest {
            instrument: instrument.clone(),
            granularity,
            source,
        })?;
        if series.is_empty() {
            info!(%instrument, %granularity, "only incomplete candles returned, nothing to store");
            return Ok(SyncOutcome::default());
        }

        let fetched = series.len();
        let owned = instrument.clone();
        let inserted = self
            .blocking(instrument, granularity, move |store| {
                store.insert(&owned, granularity, &series)
            })
            .await?;

        Ok(SyncOutcome {
            fetched,
            inserted,
            ..SyncOutcome::default()
        })
    }

    /// Runs a store call on the blocking pool, tagging errors with the pair.
    async fn blocking<T, F>(&self, instrument: &Instrument, granularity: Granularity, f: F) -> Result<T, SyncError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CandleStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .unwrap_or_else(|e| Err(StoreError::Join(e.to_string())))
            .map_err(|source| SyncError::Store {
                instrument: instrument.clone(),
                granularity,
                source,
            })
    }
}
