use std::fmt;

use boardmirror_core::CoreError;
use integration_trello::DEFAULT_TRELLO_API_URL;

pub const ENV_DB_PATH: &str = "BOARDMIRROR_DB_PATH";
pub const ENV_TRELLO_API_KEY: &str = "TRELLO_API_KEY";
pub const ENV_TRELLO_API_TOKEN: &str = "TRELLO_API_TOKEN";
pub const ENV_TRELLO_API_URL: &str = "TRELLO_API_URL";
pub const ENV_BATCH_LIMIT: &str = "BOARDMIRROR_BATCH_LIMIT";

pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Built once in `main` from the process environment and handed to the
/// store and source constructors; business logic never reads the
/// environment itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: String,
    pub trello_api_key: String,
    pub trello_api_token: String,
    pub trello_api_url: String,
    pub batch_limit: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("db_path", &self.db_path)
            .field("trello_api_key", &"<redacted>")
            .field("trello_api_token", &"<redacted>")
            .field("trello_api_url", &self.trello_api_url)
            .field("batch_limit", &self.batch_limit)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            db_path: required_env(ENV_DB_PATH)?,
            trello_api_key: required_env(ENV_TRELLO_API_KEY)?,
            trello_api_token: required_env(ENV_TRELLO_API_TOKEN)?,
            trello_api_url: optional_env(ENV_TRELLO_API_URL)
                .unwrap_or_else(|| DEFAULT_TRELLO_API_URL.to_owned()),
            batch_limit: parse_batch_limit(optional_env(ENV_BATCH_LIMIT))?,
        })
    }
}

fn required_env(name: &str) -> Result<String, CoreError> {
    let value = std::env::var(name).map_err(|_| {
        CoreError::Configuration(format!(
            "{name} is not set. Export a valid value before starting boardmirror-app."
        ))
    })?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(CoreError::Configuration(format!(
            "{name} is empty. Provide a non-empty value."
        )));
    }
    Ok(value)
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub fn parse_batch_limit(raw: Option<String>) -> Result<usize, CoreError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_BATCH_LIMIT);
    };
    let limit = raw.trim().parse::<usize>().map_err(|_| {
        CoreError::Configuration(format!(
            "{ENV_BATCH_LIMIT} must be a positive integer, got '{raw}'."
        ))
    })?;
    if limit == 0 {
        return Err(CoreError::Configuration(format!(
            "{ENV_BATCH_LIMIT} must be greater than zero."
        )));
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::{parse_batch_limit, AppConfig, DEFAULT_BATCH_LIMIT};
    use boardmirror_core::CoreError;

    #[test]
    fn batch_limit_defaults_when_unset() {
        assert_eq!(
            parse_batch_limit(None).expect("default"),
            DEFAULT_BATCH_LIMIT
        );
    }

    #[test]
    fn batch_limit_parses_positive_integers() {
        assert_eq!(
            parse_batch_limit(Some("25".to_owned())).expect("parse 25"),
            25
        );
    }

    #[test]
    fn batch_limit_rejects_zero_and_garbage() {
        let zero = parse_batch_limit(Some("0".to_owned())).expect_err("zero rejected");
        assert!(matches!(zero, CoreError::Configuration(_)));

        let garbage = parse_batch_limit(Some("many".to_owned())).expect_err("garbage rejected");
        assert!(matches!(garbage, CoreError::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let config = AppConfig {
            db_path: "./mirror.db".to_owned(),
            trello_api_key: "super-secret-key".to_owned(),
            trello_api_token: "super-secret-token".to_owned(),
            trello_api_url: "https://api.trello.com/1".to_owned(),
            batch_limit: 100,
        };

        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("super-secret-token"));
    }
}
