pub mod candle;
pub mod granularity;
pub mod instrument;
pub mod request_params;
