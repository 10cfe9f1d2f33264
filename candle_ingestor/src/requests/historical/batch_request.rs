use std::{collections::BTreeSet, num::NonZeroU32, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
    errors::Error,
    models::{
        candle::CandleBatch, granularity::Granularity, instrument::Instrument,
        request_params::CandleRequest,
    },
    providers::{CandleSource, ProviderError},
    requests::historical::{
        ChunkFailure, FetchOutcome, ParallelFetcher, single_request::fetch_with_timeout,
    },
    time::{DateRange, candle_count, split_into_chunks},
};

/// Waits for a worker slot, then an admission slot, then runs the request.
///
/// Both permits are held until the request returns.
async fn run_chunk(
    source: Arc<dyn CandleSource>,
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    request: CandleRequest,
    timeout: Duration,
) -> Result<CandleBatch, ProviderError> {
    let _worker = workers
        .acquire_owned()
        .await
        .map_err(|_| ProviderError::Other("worker pool closed".into()))?;
    let _slot = admission
        .acquire_owned()
        .await
        .map_err(|_| ProviderError::Other("admission semaphore closed".into()))?;
    fetch_with_timeout(source.as_ref(), &request, timeout).await
}

/// Candles to plan per chunk so no request window holds more than `max` bucket starts.
///
/// When `range` ends inside a partial bucket the last chunk is stretched over it, which
/// adds one bucket start to that request.
fn per_request_cap(granularity: Granularity, range: DateRange, max: NonZeroU32) -> NonZeroU32 {
    let bucket_ms = granularity.minutes() * 60_000;
    if range.duration().num_milliseconds() % bucket_ms == 0 {
        return max;
    }
    NonZeroU32::new(max.get() - 1).unwrap_or(max)
}

impl ParallelFetcher {
    /// Fetches every candle in `[from, to)`, one request per chunk.
    ///
    /// `to = None` means now. Chunks run concurrently, bounded by
    /// [`max_concurrency`](super::FetchOptions::max_concurrency) and the shared admission
    /// semaphore. Individual chunk failures (including timeouts and panicked tasks) are
    /// logged and reported in [`FetchOutcome::failures`]; if every chunk fails the
    /// outcome simply has no batches.
    ///
    /// Dropping the returned future aborts the chunk requests still outstanding.
    ///
    /// # Errors
    ///
    /// Only [`Error::InvalidRange`] when `from` lies after `to`.
    pub async fn fetch_range(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome, Error> {
        let range = DateRange::new(from, to.unwrap_or_else(Utc::now))?;
        let total_candles = candle_count(granularity, range.from(), Some(range.to()));
        let chunks = split_into_chunks(
            granularity,
            range.from(),
            range.to(),
            total_candles,
            per_request_cap(granularity, range, self.options.max_candles_per_request),
        );

        info!(
            %instrument,
            %granularity,
            from = %range.from(),
            to = %range.to(),
            total_candles,
            chunks = chunks.len(),
            "fetching candles"
        );

        let workers = Arc::new(Semaphore::new(self.options.max_concurrency.get()));
        let mut tasks = JoinSet::new();
        for (position, chunk) in chunks.iter().enumerate() {
            let request = CandleRequest::range(instrument.clone(), granularity, chunk.range);
            debug!(%instrument, %granularity, position, from = %chunk.range.from(), to = %chunk.range.to(), "submitting chunk");

            let task = run_chunk(
                Arc::clone(&self.source),
                Arc::clone(&workers),
                Arc::clone(&self.admission),
                request,
                self.options.request_timeout,
            );
            tasks.spawn(async move { (position, task.await) });
        }

        let mut slots: Vec<Option<CandleBatch>> = vec![None; chunks.len()];
        let mut failures = Vec::new();
        let mut pending: BTreeSet<usize> = (0..chunks.len()).collect();
        let mut lost_tasks = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, Ok(batch))) => {
                    pending.remove(&position);
                    debug!(%instrument, %granularity, position, candles = batch.candles.len(), "chunk complete");
                    slots[position] = Some(batch);
                }
                Ok((position, Err(err))) => {
                    pending.remove(&position);
                    let chunk = chunks[position];
                    warn!(
                        %instrument,
                        %granularity,
                        from = %chunk.range.from(),
                        to = %chunk.range.to(),
                        kind = %err.kind(),
                        error = %err,
                        "chunk fetch failed, leaving a gap"
                    );
                    failures.push(ChunkFailure { chunk, error: err });
                }
                Err(join_err) => {
                    error!(%instrument, %granularity, error = %join_err, "chunk task did not finish");
                    lost_tasks.push(join_err.to_string());
                }
            }
        }

        // A task that panicked never reported its position; whatever is still pending is it.
        for (position, reason) in pending.into_iter().zip(
            lost_tasks
                .into_iter()
                .chain(std::iter::repeat("chunk task lost".to_string())),
        ) {
            failures.push(ChunkFailure {
                chunk: chunks[position],
                error: ProviderError::Other(reason),
            });
        }
        failures.sort_by_key(|f| f.chunk.range.from());

        let batches: Vec<CandleBatch> = slots.into_iter().flatten().collect();
        info!(
            %instrument,
            %granularity,
            succeeded = batches.len(),
            failed = failures.len(),
            "finished fetching candles"
        );

        Ok(FetchOutcome {
            total_candles,
            planned_chunks: chunks.len(),
            batches,
            failures,
        })
    }
}
