use serde::{Deserialize, Serialize};

use crate::{
    models::{granularity::Granularity, instrument::Instrument},
    providers::ProviderError,
    time::DateRange,
};

/// Which candles to ask for: the latest `n`, or every candle inside a range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleSelector {
    /// The most recent `n` candles.
    Count(u32),
    /// Candles whose bucket starts in `[from, to)`.
    Range(DateRange),
}

/// Parameters for one [`CandleSource`](crate::providers::CandleSource) call.
///
/// Source-agnostic: each provider maps it onto its own query format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleRequest {
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub selector: CandleSelector,
}

impl CandleRequest {
    /// Builds a request from loosely specified inputs.
    ///
    /// Exactly one of `count` and `range` must be given; a zero count is also rejected.
    pub fn new(
        instrument: impl Into<Instrument>,
        granularity: Granularity,
        count: Option<u32>,
        range: Option<DateRange>,
    ) -> Result<Self, ProviderError> {
        let selector = match (count, range) {
            (Some(0), None) => {
                return Err(ProviderError::InvalidRequest(
                    "candle count must be greater than zero".into(),
                ));
            }
            (Some(n), None) => CandleSelector::Count(n),
            (None, Some(r)) => CandleSelector::Range(r),
            (None, None) => {
                return Err(ProviderError::InvalidRequest(
                    "either a candle count or a date range is required".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ProviderError::InvalidRequest(
                    "a candle count and a date range are mutually exclusive".into(),
                ));
            }
        };

        Ok(Self {
            instrument: instrument.into(),
            granularity,
            selector,
        })
    }

    /// Range-mode request; infallible since the selector is already unambiguous.
    pub fn range(instrument: impl Into<Instrument>, granularity: Granularity, range: DateRange) -> Self {
        Self {
            instrument: instrument.into(),
            granularity,
            selector: CandleSelector::Range(range),
        }
    }
}
