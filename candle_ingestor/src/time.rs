//! Date parsing and candle-interval arithmetic.
//!
//! What this module provides:
//! - [`parse_date_time`]: day-first `DD/MM/YYYY HH:MM:SS` strings to UTC instants.
//! - [`candle_count`]: how many whole buckets of a [`Granularity`] fit in a range.
//! - [`split_into_chunks`]: tile a range with request-sized [`Chunk`]s.
//! - [`is_trading_session`]: Monday–Friday check used for the `in_session` column.
//!
//! All arithmetic is UTC. Input strings carry no offset and are read as UTC wall-clock.
//!
//! ```
//! use std::num::NonZeroU32;
//! use candle_ingestor::models::granularity::Granularity;
//! use candle_ingestor::time::{candle_count, parse_date_time, split_into_chunks};
//!
//! let from = parse_date_time("01/01/2023 00:00:00").unwrap();
//! let to = parse_date_time("01/01/2023 02:00:00").unwrap();
//! let total = candle_count(Granularity::M1, from, Some(to));
//! assert_eq!(total, 120);
//!
//! let chunks = split_into_chunks(Granularity::M1, from, to, total, NonZeroU32::new(5000).unwrap());
//! assert_eq!(chunks.len(), 1);
//! ```

use std::num::NonZeroU32;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::granularity::Granularity;

/// Canonical input format, day first.
pub const DAY_FIRST_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// ISO-like fallback accepted for the same wall-clock semantics.
pub const ISO_LIKE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The input string is not a date in either accepted format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {input:?} as a date; expected DD/MM/YYYY HH:MM:SS")]
pub struct ParseError {
    pub input: String,
}

/// A range whose start lies after its end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date range: {from} is after {to}")]
pub struct InvalidRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Half-open UTC interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl DateRange {
    /// Creates a range, rejecting `from > to`. Empty ranges are allowed.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, InvalidRange> {
        if from > to {
            return Err(InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parses both ends with [`parse_date_time`]; a missing `to` means now.
    pub fn parse(from: &str, to: Option<&str>) -> Result<Self, crate::errors::Error> {
        let from = parse_date_time(from)?;
        let to = match to {
            Some(s) => parse_date_time(s)?,
            None => Utc::now(),
        };
        Ok(Self::new(from, to)?)
    }

    pub const fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub const fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }
}

/// A request-sized slice of a larger range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub range: DateRange,
    /// Number of candles the chunk was planned for.
    pub candles: u32,
}

/// Parses a day-first `DD/MM/YYYY HH:MM:SS` string into a UTC instant.
///
/// `YYYY-MM-DD HH:MM:SS` is accepted too. Surrounding whitespace is ignored.
pub fn parse_date_time(s: &str) -> Result<DateTime<Utc>, ParseError> {
    let trimmed = s.trim();
    NaiveDateTime::parse_from_str(trimmed, DAY_FIRST_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, ISO_LIKE_FORMAT))
        .map(|naive| naive.and_utc())
        .map_err(|_| ParseError {
            input: s.to_string(),
        })
}

/// Number of whole `granularity` buckets in `[from, to)`, floored.
///
/// `to = None` counts up to the current time. A reversed range yields a negative
/// count, which [`split_into_chunks`] turns into no chunks at all.
pub fn candle_count(granularity: Granularity, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> i64 {
    let to = to.unwrap_or_else(Utc::now);
    let bucket_ms = granularity.minutes() * 60_000;
    (to - from).num_milliseconds().div_euclid(bucket_ms)
}

/// Splits `[from, to)` into consecutive chunks of at most `max_per_request` candles.
///
/// Chunks are built greedily from `from`: each takes `min(max_per_request, remaining)`
/// candles and advances the cursor by that many buckets. The last chunk is stretched to
/// `to` when the range ends inside a partial bucket, so the chunks tile the range with
/// no gaps or overlaps. A stretched chunk holds one more bucket start than its
/// `candles`; callers that must respect a hard per-request cap plan against one less.
///
/// Planning stops early if a chunk end would fall outside the representable time range.
pub fn split_into_chunks(
    granularity: Granularity,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    total_candles: i64,
    max_per_request: NonZeroU32,
) -> Vec<Chunk> {
    if total_candles <= 0 {
        return Vec::new();
    }

    let max = i64::from(max_per_request.get());
    let minutes = granularity.minutes();
    let planned = total_candles / max + i64::from(total_candles % max != 0);
    let mut chunks = Vec::with_capacity(usize::try_from(planned.min(1024)).unwrap_or_default());
    let mut remaining = total_candles;
    let mut cursor = from;

    while remaining > 0 {
        let in_chunk = remaining.min(max);
        let Some(mut end) =
            Duration::try_minutes(in_chunk * minutes).and_then(|span| cursor.checked_add_signed(span))
        else {
            break;
        };
        if in_chunk == remaining && end < to {
            end = to;
        }
        remaining -= in_chunk;

        chunks.push(Chunk {
            range: DateRange { from: cursor, to: end },
            candles: in_chunk as u32,
        });
        cursor = end;
    }

    chunks
}

/// `true` on weekdays, when the market is treated as open.
pub fn is_trading_session(ts: DateTime<Utc>) -> bool {
    !matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Formats an instant the way it is stored: RFC 3339, millisecond precision, `Z` suffix.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn max(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn parses_day_first_as_utc() {
        let got = parse_date_time("01/01/2023 12:00:00").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap());

        // day first: 02/03 is the 2nd of March
        let got = parse_date_time("02/03/2023 00:00:00").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2023, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_iso_like_fallback() {
        let got = parse_date_time(" 2014-08-31 00:00:00 ").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2014, 8, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_dates() {
        for bad in ["", "31/02/2023 00:00:00", "01/01/2023", "yesterday", "01/13/2023 00:00:00"] {
            let err = parse_date_time(bad).unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn counts_whole_buckets_only() {
        let from = parse_date_time("01/01/2023 00:00:00").unwrap();

        let to = parse_date_time("01/01/2023 02:00:00").unwrap();
        assert_eq!(candle_count(Granularity::M1, from, Some(to)), 120);

        let to = parse_date_time("01/01/2023 01:23:00").unwrap();
        assert_eq!(candle_count(Granularity::M1, from, Some(to)), 83);
        assert_eq!(candle_count(Granularity::M5, from, Some(to)), 16);
        assert_eq!(candle_count(Granularity::H1, from, Some(to)), 1);
        assert_eq!(candle_count(Granularity::D, from, Some(to)), 0);
    }

    #[test]
    fn reversed_range_floors_below_zero() {
        let from = parse_date_time("01/01/2023 01:00:00").unwrap();
        let to = parse_date_time("01/01/2023 00:59:30").unwrap();
        assert_eq!(candle_count(Granularity::M1, from, Some(to)), -1);
        assert!(split_into_chunks(Granularity::M1, from, to, -1, max(10)).is_empty());
    }

    #[test]
    fn open_ended_count_runs_to_now() {
        let from = Utc::now() - Duration::hours(3);
        let n = candle_count(Granularity::H1, from, None);
        assert!((2..=3).contains(&n), "got {n}");
    }

    #[test]
    fn small_range_is_one_chunk_spanning_everything() {
        let from = parse_date_time("01/01/2023 00:00:00").unwrap();
        let to = parse_date_time("01/01/2023 02:00:00").unwrap();
        let total = candle_count(Granularity::M1, from, Some(to));

        let chunks = split_into_chunks(Granularity::M1, from, to, total, max(5000));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].range.from(), from);
        assert_eq!(chunks[0].range.to(), to);
        assert_eq!(chunks[0].candles, 120);
    }

    #[test]
    fn two_days_of_minutes_split_into_three() {
        let from = parse_date_time("01/01/2023 00:00:00").unwrap();
        let to = parse_date_time("03/01/2023 00:00:00").unwrap();

        let chunks = split_into_chunks(Granularity::M1, from, to, 2880, max(1000));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].range.duration(), Duration::minutes(1000));
        assert_eq!(chunks[1].range.duration(), Duration::minutes(1000));
        assert_eq!(chunks[2].range.duration(), Duration::minutes(880));
        assert_eq!(chunks[2].range.to(), to);
        assert_eq!(chunks.iter().map(|c| c.candles).sum::<u32>(), 2880);
    }

    #[test]
    fn partial_trailing_bucket_is_folded_into_last_chunk() {
        let from = parse_date_time("01/01/2023 00:00:00").unwrap();
        let to = parse_date_time("01/01/2023 10:30:00").unwrap();
        let total = candle_count(Granularity::H1, from, Some(to));
        assert_eq!(total, 10);

        let chunks = split_into_chunks(Granularity::H1, from, to, total, max(4));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].candles, 2);
        assert_eq!(chunks[2].range.from(), parse_date_time("01/01/2023 08:00:00").unwrap());
        assert_eq!(chunks[2].range.to(), to);
    }

    #[test]
    fn huge_totals_do_not_overflow() {
        let from = parse_date_time("01/01/2023 00:00:00").unwrap();
        let to = from + Duration::weeks(1);

        let chunks = split_into_chunks(Granularity::W, from, to, i64::MAX, max(5000));
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].range.from(), from);
        assert!(chunks.windows(2).all(|w| w[0].range.to() == w[1].range.from()));

        let chunks = split_into_chunks(Granularity::M1, from, to, i64::from(u32::MAX) * 2, max(u32::MAX));
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.candles == u32::MAX));
    }

    #[test]
    fn zero_candles_yield_no_chunks() {
        let from = parse_date_time("01/01/2023 00:00:00").unwrap();
        assert!(split_into_chunks(Granularity::M1, from, from, 0, max(10)).is_empty());
    }

    #[test]
    fn date_range_rejects_reversed_bounds() {
        let a = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert!(DateRange::new(b, a).is_ok());
        assert_eq!(DateRange::new(a, b).unwrap_err(), InvalidRange { from: a, to: b });
        assert!(DateRange::parse("02/01/2023 00:00:00", Some("01/01/2023 00:00:00")).is_err());
    }

    #[test]
    fn weekends_are_outside_the_session() {
        // 2023-01-06 is a Friday
        assert!(is_trading_session(Utc.with_ymd_and_hms(2023, 1, 6, 23, 59, 0).unwrap()));
        assert!(!is_trading_session(Utc.with_ymd_and_hms(2023, 1, 7, 0, 0, 0).unwrap()));
        assert!(!is_trading_session(Utc.with_ymd_and_hms(2023, 1, 8, 12, 0, 0).unwrap()));
        assert!(is_trading_session(Utc.with_ymd_and_hms(2023, 1, 9, 0, 0, 0).unwrap()));
    }

    #[test]
    fn storage_format_has_millis_and_z() {
        let ts = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(to_rfc3339_millis(ts), "2023-01-01T12:00:00.000Z");
    }
}
