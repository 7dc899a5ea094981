use boardmirror_core::{CoreError, EntityStore};
use integration_trello::CardSource;
use tracing::info;

use crate::config::DEFAULT_BATCH_LIMIT;
use crate::repair::{
    repair_missing_creators, repair_missing_lists, CreatorRepairReport, ListRepairReport,
};

pub const DEFAULT_FAILURE_LOG_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Cap on list-repair candidates per run. Sequential processing under
    /// this cap is the deliberate throttle against the source API.
    pub batch_limit: usize,
    /// How many per-item failures get logged verbosely before the rest are
    /// only counted.
    pub failure_log_cap: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            failure_log_cap: DEFAULT_FAILURE_LOG_CAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub creator: CreatorRepairReport,
    pub lists: ListRepairReport,
}

/// One corrective pass: detection, repair and reporting for each drift
/// class in turn. Per-item failures are absorbed by the repairers; only
/// precondition failures (store unreachable) propagate out of `run`.
pub struct ReconciliationDriver<S, C> {
    store: S,
    source: C,
    limits: RunLimits,
}

impl<S, C> ReconciliationDriver<S, C>
where
    S: EntityStore,
    C: CardSource,
{
    pub fn new(store: S, source: C, limits: RunLimits) -> Self {
        Self {
            store,
            source,
            limits,
        }
    }

    pub async fn run(&mut self) -> Result<RunReport, CoreError> {
        info!(
            batch_limit = self.limits.batch_limit,
            "reconciliation run starting"
        );

        let creator = repair_missing_creators(&mut self.store)?;
        info!(
            candidates = creator.candidates,
            assigned_from_movements = creator.assigned_from_movements,
            assigned_from_events = creator.assigned_from_events,
            failed_passes = creator.failed_passes,
            "creator repair finished"
        );

        let lists = repair_missing_lists(
            &mut self.store,
            &self.source,
            self.limits.batch_limit,
            self.limits.failure_log_cap,
        )
        .await?;
        info!(
            candidates = lists.candidates,
            repaired = lists.repaired,
            skipped_no_remote_list = lists.skipped_no_remote_list,
            failed = lists.failed,
            "list repair finished"
        );

        Ok(RunReport { creator, lists })
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
