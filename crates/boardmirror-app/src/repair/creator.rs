use boardmirror_core::{CoreError, EntityStore};
use tracing::warn;

/// Outcome of one creator-repair pass over the mirror. Both inference
/// passes are bulk corrections; a failed pass leaves its counter at zero
/// and is retried naturally on the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreatorRepairReport {
    pub candidates: u64,
    pub assigned_from_movements: u64,
    pub assigned_from_events: u64,
    pub failed_passes: u32,
}

impl CreatorRepairReport {
    pub fn repaired(&self) -> u64 {
        self.assigned_from_movements + self.assigned_from_events
    }
}

/// Assign missing card creators from local history alone: first from the
/// earliest recorded movement, then from the earliest attributed creation
/// event for whatever is still unattributed. No external calls.
pub fn repair_missing_creators<S>(store: &mut S) -> Result<CreatorRepairReport, CoreError>
where
    S: EntityStore + ?Sized,
{
    // Candidate fetch failing means the store is unreachable; that aborts
    // the run rather than being swallowed as a pass failure.
    let candidates = store.cards_missing_creator()?;
    let mut report = CreatorRepairReport {
        candidates: candidates.len() as u64,
        ..CreatorRepairReport::default()
    };

    match store.assign_missing_creators_from_movements() {
        Ok(assigned) => report.assigned_from_movements = assigned,
        Err(error) => {
            report.failed_passes += 1;
            warn!(error = %error, "creator repair: first-movement pass failed");
        }
    }

    match store.assign_missing_creators_from_creation_events() {
        Ok(assigned) => report.assigned_from_events = assigned,
        Err(error) => {
            report.failed_passes += 1;
            warn!(error = %error, "creator repair: creation-event pass failed");
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::repair_missing_creators;
    use boardmirror_core::{
        CardListTransition, EntityStore, IdempotencyKey, MemberExternalId, NewCardEvent,
        SqliteEntityStore, UpsertCard, UpsertList, CARD_EVENT_CREATED,
    };

    fn seeded_store() -> SqliteEntityStore {
        let mut store = SqliteEntityStore::in_memory().expect("in-memory store");
        store
            .upsert_card(&UpsertCard {
                external_id: "c1".into(),
                current_list_external_id: None,
                closed: None,
                created_at: None,
            })
            .expect("seed card");
        store
            .upsert_list(&UpsertList {
                external_id: "l1".into(),
                board_external_id: None,
                name: None,
                position: None,
                closed: None,
            })
            .expect("seed list");
        store
    }

    #[test]
    fn movement_inference_outranks_creation_event_inference() {
        let mut store = seeded_store();
        // Creation event at t=0 by m2, first movement at t=1 by m1: the
        // movement pass runs first and wins.
        store
            .record_card_event(&NewCardEvent {
                card_external_id: "c1".into(),
                action_type: CARD_EVENT_CREATED.to_owned(),
                member_external_id: Some("m2".into()),
                occurred_at: Some("2026-03-01T00:00:00Z".to_owned()),
            })
            .expect("creation event");
        store
            .set_card_current_list(&CardListTransition {
                card_external_id: "c1".into(),
                list_external_id: "l1".into(),
                member_external_id: Some("m1".into()),
                occurred_at: Some("2026-03-01T00:00:01Z".to_owned()),
                idempotency_key: IdempotencyKey::new("act-1"),
            })
            .expect("movement");

        let report = repair_missing_creators(&mut store).expect("repair run");

        assert_eq!(report.candidates, 1);
        assert_eq!(report.assigned_from_movements, 1);
        assert_eq!(report.assigned_from_events, 0);
        assert_eq!(report.failed_passes, 0);
        assert_eq!(report.repaired(), 1);

        let card = store
            .find_card(&"c1".into())
            .expect("find card")
            .expect("card exists");
        assert_eq!(
            card.creator_member_external_id,
            Some(MemberExternalId::new("m1"))
        );
    }

    #[test]
    fn creation_event_inference_covers_cards_movements_cannot() {
        let mut store = seeded_store();
        store
            .record_card_event(&NewCardEvent {
                card_external_id: "c1".into(),
                action_type: CARD_EVENT_CREATED.to_owned(),
                member_external_id: Some("m2".into()),
                occurred_at: Some("2026-03-01T00:00:00Z".to_owned()),
            })
            .expect("creation event");

        let report = repair_missing_creators(&mut store).expect("repair run");

        assert_eq!(report.assigned_from_movements, 0);
        assert_eq!(report.assigned_from_events, 1);

        let card = store
            .find_card(&"c1".into())
            .expect("find card")
            .expect("card exists");
        assert_eq!(
            card.creator_member_external_id,
            Some(MemberExternalId::new("m2"))
        );
    }

    #[test]
    fn rerunning_after_success_changes_nothing() {
        let mut store = seeded_store();
        store
            .record_card_event(&NewCardEvent {
                card_external_id: "c1".into(),
                action_type: CARD_EVENT_CREATED.to_owned(),
                member_external_id: Some("m2".into()),
                occurred_at: None,
            })
            .expect("creation event");

        let first = repair_missing_creators(&mut store).expect("first run");
        let second = repair_missing_creators(&mut store).expect("second run");

        assert_eq!(first.repaired(), 1);
        assert_eq!(second.candidates, 0);
        assert_eq!(second.repaired(), 0);
    }

    #[test]
    fn cards_with_no_history_are_left_alone() {
        let mut store = seeded_store();
        let report = repair_missing_creators(&mut store).expect("repair run");

        assert_eq!(report.candidates, 1);
        assert_eq!(report.repaired(), 0);
        let card = store
            .find_card(&"c1".into())
            .expect("find card")
            .expect("card exists");
        assert_eq!(card.creator_member_external_id, None);
    }
}
