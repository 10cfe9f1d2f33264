use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated as missing, so `API_KEY=` in a `.env` file does not
/// silently produce an empty bearer token.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_env_var_opt(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Reads an optional environment variable, trimming whitespace.
///
/// Returns `None` when the variable is unset, not valid unicode, or blank.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
