use async_trait::async_trait;
use boardmirror_core::{BoardExternalId, CardExternalId, ListExternalId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The card no longer exists (or is inaccessible) upstream. Permanent
    /// for this run; never retried by the engine.
    #[error("card not found upstream: {0}")]
    NotFound(String),
    /// Network faults, timeouts, rate limits and other conditions a later
    /// run can reasonably expect to clear.
    #[error("transient source failure: {0}")]
    Transient(String),
    #[error("malformed source payload: {0}")]
    Malformed(String),
}

/// A card's authoritative placement as the remote system reports it.
/// `current_list_external_id` of `None` means the card genuinely has no
/// list upstream either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCardSummary {
    pub current_list_external_id: Option<ListExternalId>,
    pub current_board_external_id: Option<BoardExternalId>,
    pub closed: bool,
}

/// Read-only accessor to the remote system's current truth. Performs no
/// local writes.
#[async_trait]
pub trait CardSource: Send + Sync {
    async fn fetch_card_summary(
        &self,
        card_external_id: &CardExternalId,
    ) -> Result<RemoteCardSummary, SourceError>;
}
