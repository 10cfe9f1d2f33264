#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use candle_ingestor::{
    models::{
        candle::{CandleBatch, RawCandle, RawPrice},
        request_params::{CandleRequest, CandleSelector},
    },
    providers::{CandleSource, ProviderError},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Answers every range request with one complete candle per bucket.
///
/// Chunks starting at an instant listed in `slow` sleep for `delay` first; chunks
/// starting at an instant in `failing` return a connection error, and those in
/// `panicking` panic. `calls` counts requests started, `finished` those answered.
#[derive(Default)]
pub struct ScriptedSource {
    pub slow: HashSet<DateTime<Utc>>,
    pub failing: HashSet<DateTime<Utc>>,
    pub panicking: HashSet<DateTime<Utc>>,
    pub delay: Duration,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    pub finished: AtomicUsize,
    pub requests: Mutex<Vec<CandleRequest>>,
}

impl ScriptedSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn raw_candle(time: DateTime<Utc>, complete: bool) -> RawCandle {
    RawCandle {
        time: time.to_rfc3339(),
        complete,
        volume: 3,
        mid: Some(RawPrice {
            o: "1.1".into(),
            h: "1.3".into(),
            l: "1.0".into(),
            c: "1.2".into(),
        }),
        bid: None,
        ask: None,
    }
}

#[async_trait]
impl CandleSource for ScriptedSource {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<CandleBatch, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let step = ChronoDuration::minutes(request.granularity.minutes());
        let candles = match &request.selector {
            CandleSelector::Range(range) => {
                if self.failing.contains(&range.from()) {
                    return Err(ProviderError::Connection("connection reset".into()));
                }
                if self.panicking.contains(&range.from()) {
                    panic!("boom");
                }
                if self.slow.contains(&range.from()) {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                } else if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let mut out = Vec::new();
                let mut t = range.from();
                while t + step <= range.to() {
                    out.push(raw_candle(t, true));
                    t += step;
                }
                out
            }
            CandleSelector::Count(n) => {
                let start = DateTime::parse_from_rfc3339("2023-01-02T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc);
                let mut out: Vec<RawCandle> = (0..*n as i32)
                    .map(|i| raw_candle(start + step * i, true))
                    .collect();
                if let Some(last) = out.last_mut() {
                    last.complete = false;
                }
                out
            }
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(CandleBatch {
            instrument: request.instrument.to_string(),
            granularity: request.granularity,
            candles,
        })
    }
}
