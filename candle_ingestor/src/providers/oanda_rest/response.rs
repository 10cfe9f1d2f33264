use serde::Deserialize;

/// Error body returned by the v20 API on non-2xx responses.
#[derive(Deserialize, Debug)]
pub struct OandaErrorBody {
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

/// Extracts `errorMessage` from an error body, falling back to the raw text.
pub fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<OandaErrorBody>(body) {
        Ok(parsed) => parsed.error_message,
        Err(_) if body.trim().is_empty() => "Unknown API error".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
