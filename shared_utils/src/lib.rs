//! Small helpers shared by the candle ingestion crates.

pub mod env;
