use std::{net::SocketAddr, time::Duration};

use candle_ingestor::{
    models::{granularity::Granularity, request_params::CandleRequest},
    providers::{
        CandleSource, ProviderError, TransportKind,
        oanda_rest::{OandaConfig, OandaProvider},
    },
    time::{DateRange, parse_date_time},
};
use secrecy::SecretString;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

/// Serves exactly one HTTP response and hands back the raw request head it saw.
async fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let _ = tx.send(String::from_utf8_lossy(&head).into_owned());

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (addr, rx)
}

fn provider(base_url: String) -> OandaProvider {
    let mut config = OandaConfig::new(SecretString::new("s3cr3t".into()));
    config.base_url = base_url;
    config.request_timeout = Duration::from_secs(2);
    OandaProvider::new(config).unwrap()
}

const CANDLES: &str = r#"{
  "instrument": "EUR_USD",
  "granularity": "H1",
  "candles": [
    {"complete": true, "volume": 120, "time": "2023-01-01T00:00:00.000000000Z",
     "mid": {"o": "1.07000", "h": "1.07100", "l": "1.06900", "c": "1.07050"}},
    {"complete": false, "volume": 4, "time": "2023-01-01T01:00:00.000000000Z",
     "mid": {"o": "1.07050", "h": "1.07060", "l": "1.07040", "c": "1.07055"}}
  ]
}"#;

#[tokio::test]
async fn range_request_hits_candles_endpoint() {
    let (addr, head) = serve_once("200 OK", CANDLES).await;
    let provider = provider(format!("http://{addr}/v3"));

    let range = DateRange::new(
        parse_date_time("01/01/2023 00:00:00").unwrap(),
        parse_date_time("01/01/2023 02:00:00").unwrap(),
    )
    .unwrap();
    let request = CandleRequest::range("EUR_USD", Granularity::H1, range);
    let batch = provider.fetch_candles(&request).await.unwrap();

    assert_eq!(batch.instrument, "EUR_USD");
    assert_eq!(batch.granularity, Granularity::H1);
    assert_eq!(batch.candles.len(), 2);
    assert!(!batch.candles[1].complete);

    let head = head.await.unwrap();
    let request_line = head.lines().next().unwrap();
    assert!(request_line.starts_with("GET /v3/instruments/EUR_USD/candles?"), "{request_line}");
    assert!(request_line.contains("granularity=H1"));
    assert!(request_line.contains("price=MBA"));
    assert!(request_line.contains("from=1672531200"));
    assert!(request_line.contains("to=1672538400"));
    assert!(!request_line.contains("count="));

    let lower = head.to_ascii_lowercase();
    assert!(lower.contains("authorization: bearer s3cr3t"));
    assert!(lower.contains("accept-datetime-format: rfc3339"));
}

#[tokio::test]
async fn count_request_sends_count_only() {
    let (addr, head) = serve_once("200 OK", CANDLES).await;
    let provider = provider(format!("http://{addr}/v3/"));

    let request = CandleRequest::new("EUR_USD", Granularity::H1, Some(2), None).unwrap();
    provider.fetch_candles(&request).await.unwrap();

    let head = head.await.unwrap();
    let request_line = head.lines().next().unwrap();
    assert!(request_line.contains("count=2"));
    assert!(!request_line.contains("from="));
}

#[tokio::test]
async fn client_error_carries_api_message() {
    let (addr, _head) = serve_once(
        "400 Bad Request",
        r#"{"errorMessage":"Invalid value specified for 'granularity'"}"#,
    )
    .await;
    let provider = provider(format!("http://{addr}/v3"));

    let request = CandleRequest::new("EUR_USD", Granularity::H1, Some(2), None).unwrap();
    let err = provider.fetch_candles(&request).await.unwrap_err();

    assert_eq!(err.kind(), TransportKind::Client);
    match err {
        ProviderError::Client { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid value specified for 'granularity'");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn server_error_is_other() {
    let (addr, _head) = serve_once("503 Service Unavailable", "").await;
    let provider = provider(format!("http://{addr}/v3"));

    let request = CandleRequest::new("EUR_USD", Granularity::H1, Some(2), None).unwrap();
    let err = provider.fetch_candles(&request).await.unwrap_err();
    assert_eq!(err.kind(), TransportKind::Other);
    assert!(err.to_string().contains("503"), "{err}");
}

#[tokio::test]
async fn refused_connection_is_classified() {
    // bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let provider = provider(format!("http://{addr}/v3"));

    let request = CandleRequest::new("EUR_USD", Granularity::H1, Some(2), None).unwrap();
    let err = provider.fetch_candles(&request).await.unwrap_err();
    assert_eq!(err.kind(), TransportKind::Connection, "{err}");
}
