//! Idempotency-key namespacing for engine-generated ledger corrections.
//!
//! Webhook-delivered movements key their ledger entries by the external
//! action id. Corrections synthesized by the reconciliation engine instead
//! use a fixed literal prefix, so the two key populations can never collide.

use crate::identifiers::{CardExternalId, IdempotencyKey};

pub const REPAIR_MISSING_LIST_PREFIX: &str = "fix-null-list";

/// Key for the corrective movement that restores a card's missing list.
/// Deterministic per card: re-running the repair can never append twice.
pub fn missing_list_repair_key(card_external_id: &CardExternalId) -> IdempotencyKey {
    IdempotencyKey::new(format!(
        "{REPAIR_MISSING_LIST_PREFIX}:{}",
        card_external_id.as_str()
    ))
}

pub fn is_engine_generated(key: &IdempotencyKey) -> bool {
    key.as_str()
        .strip_prefix(REPAIR_MISSING_LIST_PREFIX)
        .is_some_and(|rest| rest.starts_with(':'))
}

#[cfg(test)]
mod tests {
    use super::{is_engine_generated, missing_list_repair_key};
    use crate::identifiers::{CardExternalId, IdempotencyKey};

    #[test]
    fn repair_keys_are_deterministic_per_card() {
        let card = CardExternalId::new("c1");
        assert_eq!(
            missing_list_repair_key(&card),
            missing_list_repair_key(&card)
        );
        assert_eq!(missing_list_repair_key(&card).as_str(), "fix-null-list:c1");
    }

    #[test]
    fn engine_keys_are_recognizably_namespaced() {
        let card = CardExternalId::new("5f2c6d0a9b1e3c0017a4d2f1");
        assert!(is_engine_generated(&missing_list_repair_key(&card)));
    }

    #[test]
    fn external_action_ids_are_never_mistaken_for_engine_keys() {
        // Remote action ids are opaque hex tokens with no namespace prefix.
        assert!(!is_engine_generated(&IdempotencyKey::new(
            "60d21b4667d0d8992e610c85"
        )));
        assert!(!is_engine_generated(&IdempotencyKey::new("fix-null-listless")));
        assert!(!is_engine_generated(&IdempotencyKey::new("")));
    }
}
