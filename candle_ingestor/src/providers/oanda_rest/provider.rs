use std::{num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, Url, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{get_env_var, get_env_var_opt};
use snafu::ensure;
use tracing::debug;

use crate::{
    models::{candle::CandleBatch, request_params::CandleRequest},
    providers::{
        CandleSource, ProviderError,
        errors::{InvalidBaseUrlSnafu, ProviderInitError},
        oanda_rest::{
            params::{PriceComponents, construct_params},
            response::api_error_message,
        },
    },
};

/// Practice (fxTrade Practice) REST endpoint.
pub const PRACTICE_URL: &str = "https://api-fxpractice.oanda.com/v3";

/// Connection settings for [`OandaProvider`].
#[derive(Debug)]
pub struct OandaConfig {
    pub base_url: String,
    pub token: SecretString,
    /// Whole-request timeout, connect included.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Client-side cap on request rate.
    pub requests_per_second: NonZeroU32,
    pub price: PriceComponents,
}

impl OandaConfig {
    pub fn new(token: SecretString) -> Self {
        Self {
            base_url: PRACTICE_URL.to_string(),
            token,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            requests_per_second: nonzero!(100u32),
            price: PriceComponents::default(),
        }
    }

    /// Reads the token from `API_KEY` and, when set, the base URL from `OANDA_URL`.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        let token = SecretString::new(get_env_var("API_KEY")?.into());
        let mut config = Self::new(token);
        if let Some(url) = get_env_var_opt("OANDA_URL") {
            config.base_url = url;
        }
        Ok(config)
    }
}

pub struct OandaProvider {
    client: Client,
    candles_base: String,
    limiter: DefaultDirectRateLimiter,
    request_timeout: Duration,
    price: PriceComponents,
}

impl OandaProvider {
    /// Creates a new OANDA provider.
    ///
    /// The bearer token goes into a sensitive default header; it is never logged.
    pub fn new(config: OandaConfig) -> Result<Self, ProviderInitError> {
        let trimmed = config.base_url.trim_end_matches('/');
        let valid = Url::parse(trimmed)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        ensure!(
            valid,
            InvalidBaseUrlSnafu {
                url: config.base_url.clone()
            }
        );

        let mut auth = header::HeaderValue::from_str(&format!(
            "Bearer {}",
            config.token.expose_secret()
        ))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            "Accept-Datetime-Format",
            header::HeaderValue::from_static("RFC3339"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            candles_base: trimmed.to_string(),
            limiter: RateLimiter::direct(Quota::per_second(config.requests_per_second)),
            request_timeout: config.request_timeout,
            price: config.price,
        })
    }

    /// Builds a provider from `API_KEY` / `OANDA_URL`.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        Self::new(OandaConfig::from_env()?)
    }

    fn candles_url(&self, request: &CandleRequest) -> String {
        format!(
            "{}/instruments/{}/candles",
            self.candles_base,
            request.instrument.as_str()
        )
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.request_timeout)
        } else if err.is_connect() {
            ProviderError::Connection(err.to_string())
        } else if err.is_decode() {
            ProviderError::Other(format!("undecodable candles response: {err}"))
        } else {
            ProviderError::Other(err.to_string())
        }
    }
}

#[async_trait]
impl CandleSource for OandaProvider {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<CandleBatch, ProviderError> {
        self.limiter.until_ready().await;

        let url = self.candles_url(request);
        let query = construct_params(request, self.price);
        debug!(
            instrument = %request.instrument,
            granularity = %request.granularity,
            selector = ?request.selector,
            "requesting candles"
        );

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);
            return Err(if status.is_client_error() {
                ProviderError::Client {
                    status: status.as_u16(),
                    message,
                }
            } else {
                ProviderError::Other(format!("HTTP {status}: {message}"))
            });
        }

        let batch = response
            .json::<CandleBatch>()
            .await
            .map_err(|e| self.classify(e))?;
        debug!(
            instrument = %batch.instrument,
            granularity = %batch.granularity,
            candles = batch.candles.len(),
            "received candles"
        );
        Ok(batch)
    }
}
