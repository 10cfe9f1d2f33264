//! Historical candle retrieval against a size- and rate-limited API.
//!
//! [`ParallelFetcher`] plans a date range into request-sized chunks (see
//! [`crate::time::split_into_chunks`]), runs one [`CandleSource`] call per chunk on a
//! bounded set of tokio tasks, and gathers whatever succeeds. A failed chunk leaves a
//! gap and a [`ChunkFailure`]; it never aborts the other chunks.
//!
//! Two limits apply to every request:
//! - the fetcher's own worker width, [`FetchOptions::max_concurrency`];
//! - the injected admission semaphore, which may be shared by many fetchers to cap
//!   the total number of requests in flight against one API account.

mod batch_request;
mod single_request;

use std::{num::NonZeroU32, num::NonZeroUsize, sync::Arc, time::Duration};

use nonzero_ext::nonzero;
use tokio::sync::Semaphore;

use crate::{
    models::candle::CandleBatch,
    providers::{CandleSource, ProviderError},
    time::Chunk,
};

/// Upstream cap on candles returned by a single request.
pub const MAX_CANDLES_PER_REQUEST: NonZeroU32 = nonzero!(5000u32);

/// Tuning knobs for a [`ParallelFetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Chunk requests one `fetch_range` call may have running at once.
    pub max_concurrency: NonZeroUsize,
    /// Upper bound on candles per chunk.
    pub max_candles_per_request: NonZeroU32,
    /// Per-request deadline; an elapsed deadline fails only that chunk.
    pub request_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: nonzero!(10usize),
            max_candles_per_request: MAX_CANDLES_PER_REQUEST,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A chunk that produced no batch, and why.
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk: Chunk,
    pub error: ProviderError,
}

/// Best-effort result of [`ParallelFetcher::fetch_range`].
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Candles the range implies, per [`crate::time::candle_count`].
    pub total_candles: i64,
    /// Number of chunks the range was split into.
    pub planned_chunks: usize,
    /// Successful batches, in chronological chunk order.
    pub batches: Vec<CandleBatch>,
    /// Chunks that failed; each one is a gap in the data.
    pub failures: Vec<ChunkFailure>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fans a date range out over a [`CandleSource`] with bounded concurrency.
pub struct ParallelFetcher {
    source: Arc<dyn CandleSource>,
    admission: Arc<Semaphore>,
    options: FetchOptions,
}

impl ParallelFetcher {
    /// `admission` caps requests in flight across every fetcher that shares it.
    pub fn new(source: Arc<dyn CandleSource>, admission: Arc<Semaphore>, options: FetchOptions) -> Self {
        Self {
            source,
            admission,
            options,
        }
    }

    /// A fetcher with a private admission semaphore as wide as its worker pool.
    pub fn standalone(source: Arc<dyn CandleSource>, options: FetchOptions) -> Self {
        let admission = Arc::new(Semaphore::new(options.max_concurrency.get()));
        Self::new(source, admission, options)
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }
}
