mod conflict;
mod create;
mod error;
mod followup;
mod normalize;
mod pricing;
mod schedule;

pub use conflict::{candidate_window, existing_window, find_conflict, has_conflict};
pub use error::EngineError;
pub use followup::{ACTION_CREATE_MANUAL, FollowUp, FollowUpReport};
pub use normalize::{AmountOverrides, GuestDetails, NormalizedRequest, normalize};
pub use pricing::{Quote, computed_base, price, resolve_currency, round2};
pub use schedule::{
    ResolvedSchedule, ScheduleInput, decide_schedule_type, nights_between, parse_instant,
    resolve_booking_type, resolve_schedule,
};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::backend::LocalBackend;
use crate::collab::{AccessPolicy, Catalog, ReservationLedger, SideEffects};

/// Where a request was when it stopped. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validating,
    ScheduleResolved,
    ConflictChecked,
    Priced,
    Persisted,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::ScheduleResolved => "schedule_resolved",
            Stage::ConflictChecked => "conflict_checked",
            Stage::Priced => "priced",
            Stage::Persisted => "persisted",
        }
    }
}

/// The manual reservation engine. Stateless per request apart from the
/// per-resource locks that serialize conflict check and write.
pub struct Engine {
    catalog: Arc<dyn Catalog>,
    ledger: Arc<dyn ReservationLedger>,
    policy: Arc<dyn AccessPolicy>,
    effects: Arc<dyn SideEffects>,
    resource_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        ledger: Arc<dyn ReservationLedger>,
        policy: Arc<dyn AccessPolicy>,
        effects: Arc<dyn SideEffects>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            policy,
            effects,
            resource_locks: DashMap::new(),
        }
    }

    /// Engine whose every collaborator is the given local backend.
    pub fn with_backend(backend: Arc<LocalBackend>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self::new(backend.clone(), backend.clone(), policy, backend)
    }

    /// Lock serializing list-candidates → create-reservation on one resource.
    fn resource_lock(&self, resource_id: Ulid) -> Arc<Mutex<()>> {
        self.resource_locks
            .entry(resource_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
