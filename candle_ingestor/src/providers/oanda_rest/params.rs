use serde::{Deserialize, Serialize};

use crate::models::request_params::{CandleRequest, CandleSelector};

/// Price components to request. The normalizer reads `mid`; bid/ask ride along.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum PriceComponents {
    #[default]
    #[serde(rename = "MBA")]
    MidBidAsk,
    #[serde(rename = "M")]
    Mid,
}

impl PriceComponents {
    pub const fn as_str(self) -> &'static str {
        match self {
            PriceComponents::MidBidAsk => "MBA",
            PriceComponents::Mid => "M",
        }
    }
}

/// Builds the query string for a candles request.
///
/// Range bounds are sent as Unix epoch seconds.
pub fn construct_params(request: &CandleRequest, price: PriceComponents) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("granularity", request.granularity.code().to_string()),
        ("price", price.as_str().to_string()),
    ];

    match &request.selector {
        CandleSelector::Count(n) => query.push(("count", n.to_string())),
        CandleSelector::Range(range) => {
            query.push(("from", range.from().timestamp().to_string()));
            query.push(("to", range.to().timestamp().to_string()));
        }
    }

    query
}
