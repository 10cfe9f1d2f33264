use std::{fmt, time::Duration};

use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};
use thiserror::Error;

/// Errors that can occur within a `CandleSource` implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request itself is ambiguous or out of bounds; nothing was sent.
    #[error("Invalid candle request: {0}")]
    InvalidRequest(String),

    /// The API rejected the request (HTTP 4xx).
    #[error("API client error {status}: {message}")]
    Client { status: u16, message: String },

    /// The connection could not be established or was dropped.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No response within the allotted time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Anything else: server errors, undecodable bodies, unexpected failures.
    #[error("Request failed: {0}")]
    Other(String),
}

/// Coarse classification of a [`ProviderError`], for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    InvalidRequest,
    Client,
    Connection,
    Timeout,
    Other,
}

impl ProviderError {
    pub fn kind(&self) -> TransportKind {
        match self {
            ProviderError::InvalidRequest(_) => TransportKind::InvalidRequest,
            ProviderError::Client { .. } => TransportKind::Client,
            ProviderError::Connection(_) => TransportKind::Connection,
            ProviderError::Timeout(_) => TransportKind::Timeout,
            ProviderError::Other(_) => TransportKind::Other,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::InvalidRequest => "invalid_request",
            TransportKind::Client => "client",
            TransportKind::Connection => "connection",
            TransportKind::Timeout => "timeout",
            TransportKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"), context(false))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"), context(false))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API token contains characters not allowed in a header.
    #[snafu(display("Invalid API token format: {source}"), context(false))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// Base URL is not an absolute http(s) URL.
    #[snafu(display("Invalid base URL: {url:?}"))]
    InvalidBaseUrl { url: String, backtrace: Backtrace },
}
