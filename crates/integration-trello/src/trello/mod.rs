mod config;

pub use config::{TrelloConfig, DEFAULT_TRELLO_API_URL};

use std::time::Duration;

use async_trait::async_trait;
use boardmirror_core::{BoardExternalId, CardExternalId, ListExternalId};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::interface::{CardSource, RemoteCardSummary, SourceError};
use config::DEFAULT_TRELLO_REQUEST_TIMEOUT_SECS;

const CARD_SUMMARY_FIELDS: &str = "idList,idBoard,closed";

#[derive(Clone, Debug)]
pub struct TrelloCardSource {
    config: TrelloConfig,
    client: Client,
}

impl TrelloCardSource {
    pub fn new(config: TrelloConfig) -> Result<Self, SourceError> {
        if config.api_key.trim().is_empty() {
            return Err(SourceError::Configuration(
                "TRELLO_API_KEY is empty. Provide a non-empty API key.".to_owned(),
            ));
        }
        if config.api_token.trim().is_empty() {
            return Err(SourceError::Configuration(
                "TRELLO_API_TOKEN is empty. Provide a non-empty API token.".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TRELLO_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| {
                SourceError::Configuration(format!("failed to build Trello HTTP client: {error}"))
            })?;

        Ok(Self { config, client })
    }

    pub fn scaffold_default() -> Self {
        let mut config = TrelloConfig::default();
        if config.api_key.trim().is_empty() {
            config.api_key = "scaffold-key".to_owned();
        }
        if config.api_token.trim().is_empty() {
            config.api_token = "scaffold-token".to_owned();
        }
        Self::new(config).expect("construct default trello source")
    }

    pub fn config(&self) -> &TrelloConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.api_url.trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        format!("{base}/{suffix}")
    }
}

#[async_trait]
impl CardSource for TrelloCardSource {
    async fn fetch_card_summary(
        &self,
        card_external_id: &CardExternalId,
    ) -> Result<RemoteCardSummary, SourceError> {
        let card_id = card_external_id.as_str();
        let request = self
            .client
            .get(self.endpoint(&format!("cards/{card_id}")))
            .query(&[
                ("fields", CARD_SUMMARY_FIELDS),
                ("key", self.config.api_key.as_str()),
                ("token", self.config.api_token.as_str()),
            ]);

        let response = request.send().await.map_err(|error| {
            SourceError::Transient(format!("Trello API request for card '{card_id}' failed: {error}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            SourceError::Transient(format!(
                "Trello API response read for card '{card_id}' failed: {error}"
            ))
        })?;

        if !status.is_success() {
            return Err(classify_failure_status(card_id, status, &body));
        }

        parse_card_summary(card_id, &body)
    }
}

fn classify_failure_status(card_id: &str, status: StatusCode, body: &str) -> SourceError {
    if status == StatusCode::NOT_FOUND {
        return SourceError::NotFound(format!(
            "Trello API returned {status} for card '{card_id}': {body}"
        ));
    }

    // Everything else is worth retrying on a later run: rate limits and
    // server faults clear on their own, and auth/validation failures need
    // operator intervention rather than a local skip-forever marker.
    SourceError::Transient(format!(
        "Trello API request for card '{card_id}' failed with status {status}: {body}"
    ))
}

fn parse_card_summary(card_id: &str, body: &str) -> Result<RemoteCardSummary, SourceError> {
    let card: TrelloCard = serde_json::from_str(body).map_err(|error| {
        SourceError::Malformed(format!(
            "Trello card payload for '{card_id}' was malformed JSON: {error}"
        ))
    })?;

    Ok(RemoteCardSummary {
        current_list_external_id: non_empty(card.id_list).map(ListExternalId::new),
        current_board_external_id: non_empty(card.id_board).map(BoardExternalId::new),
        closed: card.closed,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
}

#[derive(Debug, Deserialize)]
struct TrelloCard {
    #[serde(default, rename = "idList")]
    id_list: Option<String>,
    #[serde(default, rename = "idBoard")]
    id_board: Option<String>,
    #[serde(default)]
    closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_card_summary_reads_all_fields() {
        let summary = parse_card_summary(
            "c1",
            r#"{"id":"c1","idList":"l1","idBoard":"b1","closed":false}"#,
        )
        .expect("parse full payload");

        assert_eq!(
            summary.current_list_external_id,
            Some(ListExternalId::new("l1"))
        );
        assert_eq!(
            summary.current_board_external_id,
            Some(BoardExternalId::new("b1"))
        );
        assert!(!summary.closed);
    }

    #[test]
    fn parse_card_summary_tolerates_missing_list_and_board() {
        let summary =
            parse_card_summary("c1", r#"{"id":"c1","closed":true}"#).expect("parse sparse payload");
        assert_eq!(summary.current_list_external_id, None);
        assert_eq!(summary.current_board_external_id, None);
        assert!(summary.closed);
    }

    #[test]
    fn parse_card_summary_treats_null_and_blank_ids_as_absent() {
        let summary = parse_card_summary(
            "c1",
            r#"{"idList":null,"idBoard":"   ","closed":false}"#,
        )
        .expect("parse payload with nullish ids");
        assert_eq!(summary.current_list_external_id, None);
        assert_eq!(summary.current_board_external_id, None);
    }

    #[test]
    fn parse_card_summary_defaults_closed_to_open() {
        let summary = parse_card_summary("c1", r#"{"idList":"l1"}"#).expect("parse payload");
        assert!(!summary.closed);
    }

    #[test]
    fn parse_card_summary_rejects_malformed_bodies() {
        let error = parse_card_summary("c1", "surprise, not json").expect_err("malformed body");
        assert!(matches!(error, SourceError::Malformed(_)));
    }

    #[test]
    fn status_classification_separates_permanent_from_transient() {
        let not_found =
            classify_failure_status("c1", StatusCode::NOT_FOUND, "The requested resource was not found.");
        assert!(matches!(not_found, SourceError::NotFound(_)));

        let rate_limited = classify_failure_status("c1", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(rate_limited, SourceError::Transient(_)));

        let server_fault =
            classify_failure_status("c1", StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(matches!(server_fault, SourceError::Transient(_)));
    }

    #[test]
    fn failure_messages_carry_status_and_body() {
        let error = classify_failure_status("c1", StatusCode::TOO_MANY_REQUESTS, "API_TOKEN_LIMIT_EXCEEDED");
        let message = error.to_string();
        assert!(message.contains("429"));
        assert!(message.contains("API_TOKEN_LIMIT_EXCEEDED"));
        assert!(message.contains("c1"));
    }

    #[test]
    fn endpoint_joins_base_and_path_without_duplicate_slashes() {
        let source = TrelloCardSource::scaffold_default();
        assert_eq!(
            source.endpoint("/cards/c1"),
            "https://api.trello.com/1/cards/c1"
        );
    }

    #[test]
    fn new_rejects_blank_credentials() {
        let error = TrelloCardSource::new(TrelloConfig::default()).expect_err("blank credentials");
        assert!(matches!(error, SourceError::Configuration(_)));
    }
}
