use boardmirror_core::{
    missing_list_repair_key, CardExternalId, CardListTransition, CoreError, EntityStore,
    UpsertBoard, UpsertList,
};
use integration_trello::{CardSource, SourceError};
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of one list-repair batch. `candidates` is the bounded detector
/// set; every candidate lands in exactly one of the other three counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListRepairReport {
    pub candidates: u64,
    pub repaired: u64,
    pub skipped_no_remote_list: u64,
    pub failed: u64,
}

#[derive(Debug, Error)]
enum CardRepairError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] CoreError),
}

enum CardRepairOutcome {
    Repaired,
    NoRemoteList,
}

/// Recover the current list for open cards that lost theirs, by asking the
/// external source and replaying the answer into the mirror. Candidates are
/// processed sequentially; a failure aborts only its own card. The first
/// `failure_log_cap` failures are logged verbosely, the rest only counted.
pub async fn repair_missing_lists<S, C>(
    store: &mut S,
    source: &C,
    batch_limit: usize,
    failure_log_cap: usize,
) -> Result<ListRepairReport, CoreError>
where
    S: EntityStore + ?Sized,
    C: CardSource + ?Sized,
{
    // Precondition, not a per-item fault: an unreachable store aborts the run.
    let candidates = store.cards_missing_current_list(batch_limit)?;
    let mut report = ListRepairReport {
        candidates: candidates.len() as u64,
        ..ListRepairReport::default()
    };
    let mut logged_failures = 0usize;

    for card in &candidates {
        match repair_one_card(store, source, &card.external_id).await {
            Ok(CardRepairOutcome::Repaired) => report.repaired += 1,
            Ok(CardRepairOutcome::NoRemoteList) => {
                report.skipped_no_remote_list += 1;
                debug!(
                    card = card.external_id.as_str(),
                    "card has no list upstream either; leaving it untouched"
                );
            }
            Err(cause) => {
                report.failed += 1;
                if logged_failures < failure_log_cap {
                    logged_failures += 1;
                    warn!(
                        card = card.external_id.as_str(),
                        error = %cause,
                        "card list repair failed"
                    );
                }
            }
        }
    }

    let suppressed = (report.failed as usize).saturating_sub(logged_failures);
    if suppressed > 0 {
        warn!(
            suppressed,
            "further card list repair failures were counted but not logged"
        );
    }

    Ok(report)
}

/// Steps 2 and 3 are context upserts with unknown metadata; the merge
/// semantics keep anything the mirror already knew. A failure between them
/// and step 4 leaves at most a stray board/list row, which the next
/// successful attempt reuses.
async fn repair_one_card<S, C>(
    store: &mut S,
    source: &C,
    card_external_id: &CardExternalId,
) -> Result<CardRepairOutcome, CardRepairError>
where
    S: EntityStore + ?Sized,
    C: CardSource + ?Sized,
{
    let summary = source.fetch_card_summary(card_external_id).await?;

    let Some(list_external_id) = summary.current_list_external_id else {
        return Ok(CardRepairOutcome::NoRemoteList);
    };

    if let Some(board_external_id) = &summary.current_board_external_id {
        store.upsert_board(&UpsertBoard {
            external_id: board_external_id.clone(),
            name: None,
            url: None,
        })?;
    }
    store.upsert_list(&UpsertList {
        external_id: list_external_id.clone(),
        board_external_id: summary.current_board_external_id,
        name: None,
        position: None,
        closed: Some(summary.closed),
    })?;

    // An AlreadyApplied outcome means a previous run got here first; the
    // card is repaired either way.
    store.set_card_current_list(&CardListTransition {
        card_external_id: card_external_id.clone(),
        list_external_id,
        member_external_id: None,
        occurred_at: None,
        idempotency_key: missing_list_repair_key(card_external_id),
    })?;

    Ok(CardRepairOutcome::Repaired)
}
