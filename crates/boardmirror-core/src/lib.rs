pub mod error;
pub mod idempotency;
pub mod identifiers;
pub mod store;

pub use error::CoreError;
pub use idempotency::{
    is_engine_generated, missing_list_repair_key, REPAIR_MISSING_LIST_PREFIX,
};
pub use identifiers::{
    BoardExternalId, CardExternalId, IdempotencyKey, ListExternalId, MemberExternalId,
};
pub use store::{
    BoardRecord, CardListTransition, CardMovementRecord, CardRecord, EntityStore, ListRecord,
    NewCardEvent, SqliteEntityStore, TransitionOutcome, UpsertBoard, UpsertCard, UpsertList,
    CARD_EVENT_CREATED,
};
