//! Raw upstream batches to a typed, ordered [`CandleSeries`].
//!
//! Only complete candles survive. A complete candle must carry mid prices that parse
//! as finite numbers and a valid RFC 3339 time; anything else fails the whole call with
//! [`Error::MalformedCandle`] rather than silently dropping a row.

use chrono::{DateTime, Utc};

use crate::{
    errors::Error,
    models::candle::{Candle, CandleBatch, CandleSeries, RawCandle, RawPrice},
};

/// Merges `batches` into one series, sorted by timestamp with duplicates removed.
///
/// Batches may arrive in any order and may overlap; the first candle seen for a
/// timestamp wins. Incomplete (in-progress) candles are skipped, so a batch made only
/// of incomplete candles contributes nothing.
///
/// # Errors
///
/// * [`Error::EmptyInput`] - no batches, or no raw candles in any of them.
/// * [`Error::MalformedCandle`] - a complete candle with a bad time or price.
pub fn normalize(batches: &[CandleBatch]) -> Result<CandleSeries, Error> {
    if batches.iter().all(|b| b.candles.is_empty()) {
        return Err(Error::EmptyInput);
    }

    let mut candles = Vec::with_capacity(batches.iter().map(|b| b.candles.len()).sum());
    for batch in batches {
        for raw in batch.candles.iter().filter(|c| c.complete) {
            candles.push(to_candle(batch, raw)?);
        }
    }

    Ok(CandleSeries::from_unsorted(candles))
}

fn to_candle(batch: &CandleBatch, raw: &RawCandle) -> Result<Candle, Error> {
    let malformed = |reason: String| Error::MalformedCandle {
        instrument: batch.instrument.clone(),
        granularity: batch.granularity,
        time: raw.time.clone(),
        reason,
    };

    let timestamp = DateTime::parse_from_rfc3339(&raw.time)
        .map_err(|e| malformed(format!("bad time: {e}")))?
        .with_timezone(&Utc);

    let mid: &RawPrice = raw
        .mid
        .as_ref()
        .ok_or_else(|| malformed("missing mid prices".into()))?;

    let price = |field: &str, value: &str| -> Result<f64, Error> {
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(v) => Err(malformed(format!("{field} is not finite: {v}"))),
            Err(_) => Err(malformed(format!("{field} is not a number: {value:?}"))),
        }
    };

    Ok(Candle {
        timestamp,
        open: price("open", &mid.o)?,
        high: price("high", &mid.h)?,
        low: price("low", &mid.l)?,
        close: price("close", &mid.c)?,
        volume: raw.volume,
    })
}
