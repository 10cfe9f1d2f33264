//! Candle source abstraction for market data APIs.
//!
//! This module defines the [`CandleSource`] trait, the single seam between the
//! ingestion pipeline and a remote market data vendor. A source answers one request
//! at a time; chunking, concurrency and timeouts are handled by the caller
//! ([`ParallelFetcher`](crate::requests::historical::ParallelFetcher)).
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`Arc<dyn CandleSource>`), so the concrete vendor can be picked at runtime and
//! replaced by a stub in tests.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use candle_ingestor::models::candle::CandleBatch;
//! use candle_ingestor::models::request_params::CandleRequest;
//! use candle_ingestor::providers::{CandleSource, ProviderError};
//!
//! struct EmptySource;
//!
//! #[async_trait]
//! impl CandleSource for EmptySource {
//!     async fn fetch_candles(&self, request: &CandleRequest) -> Result<CandleBatch, ProviderError> {
//!         Ok(CandleBatch {
//!             instrument: request.instrument.to_string(),
//!             granularity: request.granularity,
//!             candles: vec![],
//!         })
//!     }
//! }
//! ```

pub mod errors;
pub mod oanda_rest;

use async_trait::async_trait;

pub use errors::{ProviderError, ProviderInitError, TransportKind};

use crate::models::{candle::CandleBatch, request_params::CandleRequest};

/// Fetches raw candles for a single request from a market data vendor.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetches the candles selected by `request`.
    ///
    /// # Returns
    ///
    /// * `Ok(CandleBatch)` - The raw batch, complete and in-progress candles alike.
    /// * `Err(ProviderError)` - Validation or transport failure, classified by kind.
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<CandleBatch, ProviderError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::models::{granularity::Granularity, request_params::CandleSelector};

    use super::*;

    struct OandaStub;
    struct FailingStub;

    #[async_trait]
    impl CandleSource for OandaStub {
        async fn fetch_candles(&self, request: &CandleRequest) -> Result<CandleBatch, ProviderError> {
            Ok(CandleBatch {
                instrument: request.instrument.to_string(),
                granularity: request.granularity,
                candles: vec![],
            })
        }
    }

    #[async_trait]
    impl CandleSource for FailingStub {
        async fn fetch_candles(&self, _request: &CandleRequest) -> Result<CandleBatch, ProviderError> {
            Err(ProviderError::Connection("refused".into()))
        }
    }

    // Picked at runtime; only possible through `dyn CandleSource`.
    fn get_source(name: &str) -> Arc<dyn CandleSource> {
        if name == "oanda" {
            Arc::new(OandaStub)
        } else {
            Arc::new(FailingStub)
        }
    }

    #[tokio::test]
    async fn test_dynamic_source() {
        let request = CandleRequest {
            instrument: "EUR_USD".into(),
            granularity: Granularity::H1,
            selector: CandleSelector::Count(10),
        };

        let batch = get_source("oanda").fetch_candles(&request).await.unwrap();
        assert_eq!(batch.instrument, "EUR_USD");
        assert_eq!(batch.granularity, Granularity::H1);

        let err = get_source("other").fetch_candles(&request).await.unwrap_err();
        assert_eq!(err.kind(), TransportKind::Connection);
    }
}
