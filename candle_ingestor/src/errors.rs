use thiserror::Error;

use crate::{
    models::granularity::{Granularity, UnsupportedGranularity},
    providers::ProviderError,
    time::{InvalidRange, ParseError},
};

/// The unified error type for the `candle_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A date string could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A granularity code outside the supported set.
    #[error(transparent)]
    UnsupportedGranularity(#[from] UnsupportedGranularity),

    /// A date range with its start after its end.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    /// An error originating from a candle source (request validation or transport).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A complete candle whose fields could not be converted.
    #[error("Malformed {instrument} {granularity} candle at {time:?}: {reason}")]
    MalformedCandle {
        instrument: String,
        granularity: Granularity,
        time: String,
        reason: String,
    },

    /// Normalization was asked to work on nothing.
    #[error("No candle data provided")]
    EmptyInput,
}
