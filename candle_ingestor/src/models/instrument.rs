use std::fmt;

use serde::{Deserialize, Serialize};

/// Upstream instrument identifier, e.g. `EUR_USD` or `XAU_USD`.
///
/// Opaque to the pipeline: it names the upstream resource and, together with a
/// granularity, the table the candles end up in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Instrument {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Instrument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
