//! OANDA v20 REST candle source.
//!
//! - [`provider`]: the [`OandaProvider`] client and its [`OandaConfig`].
//! - [`params`]: mapping a [`CandleRequest`](crate::models::request_params::CandleRequest)
//!   onto the `/instruments/{instrument}/candles` query string.
//! - [`response`]: error-body decoding.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{OandaConfig, OandaProvider, PRACTICE_URL};
