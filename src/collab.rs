//! Contracts for everything the reservation engine does not own: the
//! catalog of resources and leads, the reservation ledger, authorization,
//! and best-effort bookkeeping.

use async_trait::async_trait;
use ulid::Ulid;

use crate::activity::ActivityEntry;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabError {
    /// The collaborator could not be reached or refused the call.
    Unavailable(String),
    Io(String),
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollabError::Unavailable(msg) => write!(f, "collaborator unavailable: {msg}"),
            CollabError::Io(msg) => write!(f, "collaborator I/O error: {msg}"),
        }
    }
}

impl std::error::Error for CollabError {}

impl From<std::io::Error> for CollabError {
    fn from(e: std::io::Error) -> Self {
        CollabError::Io(e.to_string())
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_resource(&self, id: Ulid) -> Result<Option<Resource>, CollabError>;

    async fn get_lead(&self, id: Ulid) -> Result<Option<Lead>, CollabError>;
}

#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Pending and confirmed reservations on `resource_id`, at most `limit`.
    async fn list_blocking_candidates(
        &self,
        resource_id: Ulid,
        limit: usize,
    ) -> Result<Vec<ExistingReservation>, CollabError>;

    /// Durably store a new reservation and return its id.
    async fn create_reservation(&self, record: &ReservationRecord) -> Result<Ulid, CollabError>;
}

/// Decides whether an actor may create reservations on a resource.
pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, actor: &Actor, resource: &Resource) -> Result<(), &'static str>;
}

/// Secondary writes that follow a successful reservation. Failures here are
/// reported to the engine but never reach the caller.
#[async_trait]
pub trait SideEffects: Send + Sync {
    async fn increment_booking_count(&self, resource_id: Ulid) -> Result<(), CollabError>;

    async fn mark_lead_reserved(
        &self,
        lead_id: Ulid,
        reservation_id: Ulid,
        note: String,
    ) -> Result<(), CollabError>;

    async fn log_activity(&self, entry: ActivityEntry) -> Result<(), CollabError>;
}
