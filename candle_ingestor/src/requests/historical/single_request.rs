use std::time::Duration;

use tracing::{info, warn};

use crate::{
    errors::Error,
    models::{
        candle::CandleBatch, granularity::Granularity, instrument::Instrument,
        request_params::CandleRequest,
    },
    providers::{CandleSource, ProviderError},
    requests::historical::ParallelFetcher,
};

/// Runs one source call under `timeout`; an elapsed deadline becomes [`ProviderError::Timeout`].
pub(super) async fn fetch_with_timeout(
    source: &dyn CandleSource,
    request: &CandleRequest,
    timeout: Duration,
) -> Result<CandleBatch, ProviderError> {
    match tokio::time::timeout(timeout, source.fetch_candles(request)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

impl ParallelFetcher {
    /// Fetches the most recent `count` candles with a single request.
    ///
    /// `count` must be between 1 and the per-request cap. Unlike
    /// [`fetch_range`](Self::fetch_range) there is nothing partial to keep, so a failed
    /// request is returned as an error.
    pub async fn fetch_latest(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        count: u32,
    ) -> Result<CandleBatch, Error> {
        let cap = self.options.max_candles_per_request.get();
        if count > cap {
            return Err(ProviderError::InvalidRequest(format!(
                "requested {count} candles, at most {cap} fit in one request"
            ))
            .into());
        }
        let request = CandleRequest::new(instrument.clone(), granularity, Some(count), None)?;

        let _slot = self
            .admission
            .acquire()
            .await
            .map_err(|_| ProviderError::Other("admission semaphore closed".into()))?;

        match fetch_with_timeout(self.source.as_ref(), &request, self.options.request_timeout).await {
            Ok(batch) => {
                info!(
                    %instrument,
                    %granularity,
                    count,
                    received = batch.candles.len(),
                    "fetched latest candles"
                );
                Ok(batch)
            }
            Err(e) => {
                warn!(%instrument, %granularity, kind = %e.kind(), error = %e, "latest candles request failed");
                Err(e.into())
            }
        }
    }
}
