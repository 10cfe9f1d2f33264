//! Candle granularities supported by the ingestion pipeline.
//!
//! Every [`Granularity`] maps to a fixed bucket width in minutes, which is what the
//! chunk planner in [`crate::time`] relies on. Upstream codes with no fixed width
//! (monthly candles) or widths below one minute (the `S*` codes) are rejected when
//! parsed, with [`UnsupportedGranularity`].

use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The granularity code is not one of the fixed-width codes this crate knows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported granularity: {0}")]
pub struct UnsupportedGranularity(pub String);

/// Width of a single candle bucket, named by its upstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    M1,
    M2,
    M4,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D,
    W,
}

impl Granularity {
    /// All supported granularities, narrowest first.
    pub const ALL: [Granularity; 16] = [
        Granularity::M1,
        Granularity::M2,
        Granularity::M4,
        Granularity::M5,
        Granularity::M10,
        Granularity::M15,
        Granularity::M30,
        Granularity::H1,
        Granularity::H2,
        Granularity::H3,
        Granularity::H4,
        Granularity::H6,
        Granularity::H8,
        Granularity::H12,
        Granularity::D,
        Granularity::W,
    ];

    /// Bucket width in minutes.
    pub const fn minutes(self) -> i64 {
        match self {
            Granularity::M1 => 1,
            Granularity::M2 => 2,
            Granularity::M4 => 4,
            Granularity::M5 => 5,
            Granularity::M10 => 10,
            Granularity::M15 => 15,
            Granularity::M30 => 30,
            Granularity::H1 => 60,
            Granularity::H2 => 120,
            Granularity::H3 => 180,
            Granularity::H4 => 240,
            Granularity::H6 => 360,
            Granularity::H8 => 480,
            Granularity::H12 => 720,
            Granularity::D => 1_440,
            Granularity::W => 10_080,
        }
    }

    /// Bucket width as a [`Duration`].
    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// The code the upstream API uses for this granularity.
    pub const fn code(self) -> &'static str {
        match self {
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M4 => "M4",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H3 => "H3",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
            Granularity::W => "W",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Granularity {
    type Err = UnsupportedGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Granularity::ALL
            .into_iter()
            .find(|g| g.code() == code)
            .ok_or_else(|| UnsupportedGranularity(s.to_string()))
    }
}

impl TryFrom<String> for Granularity {
    type Error = UnsupportedGranularity;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.code().to_string()
    }
}
