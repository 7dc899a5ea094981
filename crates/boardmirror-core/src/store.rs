mod sqlite_impl;

pub use sqlite_impl::SqliteEntityStore;

use crate::error::CoreError;
use crate::identifiers::{
    BoardExternalId, CardExternalId, IdempotencyKey, ListExternalId, MemberExternalId,
};

/// Action type recorded by the event stream when a card is created.
pub const CARD_EVENT_CREATED: &str = "created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    pub external_id: BoardExternalId,
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRecord {
    pub external_id: ListExternalId,
    pub board_external_id: Option<BoardExternalId>,
    pub name: Option<String>,
    pub position: Option<f64>,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub external_id: CardExternalId,
    pub current_list_external_id: Option<ListExternalId>,
    pub closed: bool,
    pub creator_member_external_id: Option<MemberExternalId>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// One append-only ledger entry for a card changing list. `seq` is the
/// ledger insertion sequence and doubles as the tie-breaker when movements
/// share (or lack) a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMovementRecord {
    pub seq: u64,
    pub card_external_id: CardExternalId,
    pub list_external_id: ListExternalId,
    pub member_external_id: Option<MemberExternalId>,
    pub occurred_at: Option<String>,
    pub idempotency_key: IdempotencyKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertBoard {
    pub external_id: BoardExternalId,
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertList {
    pub external_id: ListExternalId,
    pub board_external_id: Option<BoardExternalId>,
    pub name: Option<String>,
    pub position: Option<f64>,
    /// `None` means "not observed this time": the stored flag is kept.
    pub closed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertCard {
    pub external_id: CardExternalId,
    pub current_list_external_id: Option<ListExternalId>,
    pub closed: Option<bool>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCardEvent {
    pub card_external_id: CardExternalId,
    pub action_type: String,
    pub member_external_id: Option<MemberExternalId>,
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardListTransition {
    pub card_external_id: CardExternalId,
    pub list_external_id: ListExternalId,
    pub member_external_id: Option<MemberExternalId>,
    pub occurred_at: Option<String>,
    pub idempotency_key: IdempotencyKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// A ledger entry was appended and the card's current list updated.
    Applied,
    /// A ledger entry with this idempotency key already exists; nothing
    /// was written. This is the expected no-op path, not an error.
    AlreadyApplied,
}

/// The mirror's mutation and detection surface. Every write is idempotent:
/// upserts merge instead of replacing, and list transitions are keyed.
/// Any storage backend implementing this trait is substitutable; the
/// in-memory SQLite store serves as the test fake.
pub trait EntityStore {
    fn upsert_board(&mut self, board: &UpsertBoard) -> Result<(), CoreError>;
    fn upsert_list(&mut self, list: &UpsertList) -> Result<(), CoreError>;
    fn upsert_card(&mut self, card: &UpsertCard) -> Result<(), CoreError>;
    fn record_card_event(&mut self, event: &NewCardEvent) -> Result<(), CoreError>;

    /// The single mutating entry point for changing a card's current list.
    /// Idempotency-key check, ledger append and current-list update happen
    /// in one transaction. Fails with `CoreError::Conflict` if the card (or
    /// the target list) is not mirrored locally.
    fn set_card_current_list(
        &mut self,
        transition: &CardListTransition,
    ) -> Result<TransitionOutcome, CoreError>;

    /// Open cards with no known current list, bounded. Point-in-time read;
    /// no transaction spans the batch consuming it.
    fn cards_missing_current_list(&self, limit: usize) -> Result<Vec<CardRecord>, CoreError>;

    /// Cards with no recorded creator.
    fn cards_missing_creator(&self) -> Result<Vec<CardRecord>, CoreError>;

    /// Bulk correction: the earliest movement per card (timestamp order,
    /// nulls last, ties on ledger sequence) donates its acting member to the
    /// card's creator, where the creator is still unset and that earliest
    /// movement actually records a member. Returns rows updated.
    fn assign_missing_creators_from_movements(&mut self) -> Result<u64, CoreError>;

    /// Bulk correction: the earliest creation event with a known actor
    /// donates that actor to the card's creator, where still unset.
    /// Returns rows updated.
    fn assign_missing_creators_from_creation_events(&mut self) -> Result<u64, CoreError>;

    fn find_board(&self, external_id: &BoardExternalId) -> Result<Option<BoardRecord>, CoreError>;
    fn find_list(&self, external_id: &ListExternalId) -> Result<Option<ListRecord>, CoreError>;
    fn find_card(&self, external_id: &CardExternalId) -> Result<Option<CardRecord>, CoreError>;
    fn movements_for_card(
        &self,
        card_external_id: &CardExternalId,
    ) -> Result<Vec<CardMovementRecord>, CoreError>;
}
