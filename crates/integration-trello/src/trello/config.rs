use std::fmt;

use crate::interface::SourceError;

pub const DEFAULT_TRELLO_API_URL: &str = "https://api.trello.com/1";
pub(crate) const DEFAULT_TRELLO_REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Clone, PartialEq, Eq)]
pub struct TrelloConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_token: String,
}

impl fmt::Debug for TrelloConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TrelloConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_TRELLO_API_URL.to_owned(),
            api_key: String::new(),
            api_token: String::new(),
        }
    }
}

impl TrelloConfig {
    pub fn from_settings(
        api_key: impl Into<String>,
        api_token: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let api_key = api_key.into().trim().to_owned();
        if api_key.is_empty() {
            return Err(SourceError::Configuration(
                "TRELLO_API_KEY is empty. Provide a non-empty API key.".to_owned(),
            ));
        }

        let api_token = api_token.into().trim().to_owned();
        if api_token.is_empty() {
            return Err(SourceError::Configuration(
                "TRELLO_API_TOKEN is empty. Provide a non-empty API token.".to_owned(),
            ));
        }

        let api_url = api_url.into().trim().to_owned();
        let api_url = if api_url.is_empty() {
            DEFAULT_TRELLO_API_URL.to_owned()
        } else {
            api_url
        };

        Ok(Self {
            api_url,
            api_key,
            api_token,
        })
    }
}
