//! In-memory candle representations.
//!
//! Two shapes live here:
//! - [`CandleBatch`] / [`RawCandle`]: one upstream response, exactly as the API sends
//!   it (ISO-8601 time string, decimal-string prices, completeness flag). This is what
//!   every [`CandleSource`](crate::providers::CandleSource) returns.
//! - [`Candle`] / [`CandleSeries`]: the validated, typed form produced by
//!   [`normalize`](crate::normalize::normalize) and consumed by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::granularity::Granularity;

/// Open/high/low/close quoted as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrice {
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
}

/// A single candle as returned by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    /// Bucket start, ISO-8601 / RFC 3339.
    pub time: String,

    /// `false` while the bucket is still in progress.
    pub complete: bool,

    /// Tick volume for the bucket.
    pub volume: i64,

    /// Mid prices. Required by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<RawPrice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<RawPrice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<RawPrice>,
}

/// One upstream response: the candles for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleBatch {
    pub instrument: String,
    pub granularity: Granularity,
    #[serde(default)]
    pub candles: Vec<RawCandle>,
}

/// A single complete OHLCV candle.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Bucket start (UTC).
    pub timestamp: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Tick volume during the bucket.
    pub volume: i64,
}

/// Candles ordered strictly ascending by timestamp, without duplicates.
///
/// The ordering invariant is established by the constructors, so a series handed to
/// the store never needs re-sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Sorts `candles` by timestamp and keeps the first candle seen for each timestamp.
    pub fn from_unsorted(mut candles: Vec<Candle>) -> Self {
        // stable: equal timestamps keep their input order, so dedup keeps the first
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn into_vec(self) -> Vec<Candle> {
        self.candles
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
