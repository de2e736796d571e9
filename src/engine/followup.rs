use tracing::{debug, warn};
use ulid::Ulid;

use crate::activity::{ActivityEntry, Severity, capped_snapshot};
use crate::collab::{CollabError, SideEffects};
use crate::model::*;

use super::conflict::now_ms;

pub const ACTION_CREATE_MANUAL: &str = "reservation.create_manual";

/// Result of one best-effort write. Logged, never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    Done,
    Skipped,
    Failed(CollabError),
}

impl From<Result<(), CollabError>> for FollowUp {
    fn from(r: Result<(), CollabError>) -> Self {
        match r {
            Ok(()) => FollowUp::Done,
            Err(e) => FollowUp::Failed(e),
        }
    }
}

/// Outcomes of the writes that follow a created reservation.
#[must_use = "follow-up outcomes must be logged"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpReport {
    pub booking_count: FollowUp,
    pub lead_status: FollowUp,
    pub activity_log: FollowUp,
}

impl FollowUpReport {
    pub fn is_clean(&self) -> bool {
        [&self.booking_count, &self.lead_status, &self.activity_log]
            .iter()
            .all(|f| !matches!(f, FollowUp::Failed(_)))
    }

    /// Emit a warning and a metric for every failed effect.
    pub fn log(&self, reservation_id: Ulid) {
        let effects = [
            ("booking_count", &self.booking_count),
            ("lead_status", &self.lead_status),
            ("activity_log", &self.activity_log),
        ];
        for (effect, outcome) in effects {
            if let FollowUp::Failed(e) = outcome {
                warn!("follow-up {effect} failed for reservation {reservation_id}: {e}");
                metrics::counter!(
                    crate::observability::FOLLOWUP_FAILURES_TOTAL,
                    "effect" => effect
                )
                .increment(1);
            }
        }
        if self.is_clean() {
            debug!("follow-ups done for reservation {reservation_id}");
        }
    }
}

/// Run every secondary write in order. None of them can fail the request.
pub(super) async fn dispatch(
    effects: &dyn SideEffects,
    actor: &Actor,
    created: &CreatedReservation,
    request_id: Option<String>,
) -> FollowUpReport {
    let record = &created.record;

    let booking_count: FollowUp = effects
        .increment_booking_count(record.resource_id)
        .await
        .into();

    let lead_status: FollowUp = match record.lead_id {
        Some(lead_id) => effects
            .mark_lead_reserved(
                lead_id,
                created.id,
                format!("Manual reservation {} created", created.id),
            )
            .await
            .into(),
        None => FollowUp::Skipped,
    };

    let entry = ActivityEntry {
        actor_id: actor.id,
        action: ACTION_CREATE_MANUAL.into(),
        entity_id: created.id,
        before: None,
        after: capped_snapshot(record),
        request_id,
        severity: Severity::Info,
        at: now_ms(),
    };
    let activity_log: FollowUp = effects.log_activity(entry).await.into();

    FollowUpReport {
        booking_count,
        lead_status,
        activity_log,
    }
}
