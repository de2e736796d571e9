//! In-process implementation of every collaborator the engine talks to.
//!
//! The catalog (resources and leads) comes from a JSON seed; reservations,
//! booking counters and lead updates are ledger events, written through a
//! group-commit WAL and replayed on startup.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::activity::{ActivityEntry, ActivityHub};
use crate::collab::{Catalog, CollabError, ReservationLedger, SideEffects};
use crate::model::*;
use crate::wal::Wal;

/// Resources and leads loaded at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub resources: Vec<Resource>,
    pub leads: Vec<Lead>,
}

impl CatalogSeed {
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

// ── Group-commit WAL channel ─────────────────────────────

type AppendRequest = (LedgerEvent, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Drain all immediately available appends (the batch window).
/// 3. Single flush_sync for the whole batch.
/// 4. Respond to all senders with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<AppendRequest>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        debug!(
            "wal {} flushed {} events ({} this session)",
            wal.path().display(),
            batch.len(),
            wal.appends()
        );

        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[AppendRequest]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

pub struct LocalBackend {
    resources: DashMap<Ulid, Resource>,
    leads: DashMap<Ulid, Lead>,
    /// Reservations per resource, in creation order.
    reservations: DashMap<Ulid, Vec<(Ulid, ReservationRecord)>>,
    booking_counts: DashMap<Ulid, u64>,
    wal_tx: mpsc::Sender<AppendRequest>,
    activity: Arc<ActivityHub>,
}

impl LocalBackend {
    /// Replay the WAL over the seed and start the WAL writer task.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf, seed: CatalogSeed, activity: Arc<ActivityHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let backend = Self {
            resources: DashMap::new(),
            leads: DashMap::new(),
            reservations: DashMap::new(),
            booking_counts: DashMap::new(),
            wal_tx,
            activity,
        };
        for resource in seed.resources {
            backend.upsert_resource(resource);
        }
        for lead in seed.leads {
            backend.upsert_lead(lead);
        }
        for event in &events {
            backend.apply(event);
        }
        info!(
            "backend ready: {} resources, {} leads, {} ledger events replayed from {}",
            backend.resources.len(),
            backend.leads.len(),
            events.len(),
            wal_path.display()
        );
        Ok(backend)
    }

    pub fn upsert_resource(&self, resource: Resource) {
        self.resources.insert(resource.id, resource);
    }

    pub fn upsert_lead(&self, lead: Lead) {
        self.leads.insert(lead.id, lead);
    }

    pub fn resource(&self, id: &Ulid) -> Option<Resource> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    pub fn lead(&self, id: &Ulid) -> Option<Lead> {
        self.leads.get(id).map(|e| e.value().clone())
    }

    pub fn booking_count(&self, resource_id: &Ulid) -> u64 {
        self.booking_counts.get(resource_id).map_or(0, |c| *c)
    }

    /// All reservations on a resource, in creation order.
    pub fn reservations_for(&self, resource_id: &Ulid) -> Vec<(Ulid, ReservationRecord)> {
        self.reservations
            .get(resource_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn activity(&self) -> &Arc<ActivityHub> {
        &self.activity
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &LedgerEvent) -> Result<(), CollabError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send((event.clone(), tx))
            .await
            .map_err(|_| CollabError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| CollabError::Unavailable("WAL writer dropped response".into()))??;
        Ok(())
    }

    /// WAL-append, then apply.
    async fn persist_and_apply(&self, event: LedgerEvent) -> Result<(), CollabError> {
        self.wal_append(&event).await?;
        self.apply(&event);
        Ok(())
    }

    fn apply(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::ReservationCreated { id, record } => {
                self.reservations
                    .entry(record.resource_id)
                    .or_default()
                    .push((*id, record.clone()));
            }
            LedgerEvent::BookingCounted { resource_id } => {
                *self.booking_counts.entry(*resource_id).or_default() += 1;
            }
            LedgerEvent::LeadReserved { lead_id, note, .. } => {
                if let Some(mut lead) = self.leads.get_mut(lead_id) {
                    lead.status = Lead::RESERVED.into();
                    lead.notes.push(note.clone());
                }
            }
        }
    }
}

#[async_trait]
impl Catalog for LocalBackend {
    async fn get_resource(&self, id: Ulid) -> Result<Option<Resource>, CollabError> {
        Ok(self.resource(&id))
    }

    async fn get_lead(&self, id: Ulid) -> Result<Option<Lead>, CollabError> {
        Ok(self.lead(&id))
    }
}

#[async_trait]
impl ReservationLedger for LocalBackend {
    async fn list_blocking_candidates(
        &self,
        resource_id: Ulid,
        limit: usize,
    ) -> Result<Vec<ExistingReservation>, CollabError> {
        let Some(entry) = self.reservations.get(&resource_id) else {
            return Ok(Vec::new());
        };
        // Newest first: the cap drops the oldest bookings.
        Ok(entry
            .iter()
            .rev()
            .filter(|(_, r)| r.status.is_blocking())
            .take(limit)
            .map(|(id, r)| r.as_existing(*id))
            .collect())
    }

    async fn create_reservation(&self, record: &ReservationRecord) -> Result<Ulid, CollabError> {
        let id = Ulid::new();
        self.persist_and_apply(LedgerEvent::ReservationCreated {
            id,
            record: record.clone(),
        })
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl SideEffects for LocalBackend {
    async fn increment_booking_count(&self, resource_id: Ulid) -> Result<(), CollabError> {
        if !self.resources.contains_key(&resource_id) {
            return Err(CollabError::Unavailable(format!("unknown resource {resource_id}")));
        }
        self.persist_and_apply(LedgerEvent::BookingCounted { resource_id })
            .await
    }

    async fn mark_lead_reserved(
        &self,
        lead_id: Ulid,
        reservation_id: Ulid,
        note: String,
    ) -> Result<(), CollabError> {
        if !self.leads.contains_key(&lead_id) {
            return Err(CollabError::Unavailable(format!("unknown lead {lead_id}")));
        }
        self.persist_and_apply(LedgerEvent::LeadReserved {
            lead_id,
            reservation_id,
            note,
        })
        .await
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<(), CollabError> {
        self.activity.record(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("reservo_test_backend");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn resource() -> Resource {
        Resource {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            title: Some("Casa Azul".into()),
            price: 80.0,
            pricing_model: PricingModel::PerNight,
            currency: Some("MXN".into()),
            slot_buffer_minutes: 0,
            commercial_mode: CommercialMode::Vacation,
            default_booking_type: None,
            manual_contact_schedule_type: None,
            enabled: true,
        }
    }

    fn record(resource_id: Ulid, status: ReservationStatus, check_in: Ms) -> ReservationRecord {
        ReservationRecord {
            resource_id,
            owner_id: Ulid::new(),
            created_by: Ulid::new(),
            lead_id: None,
            guest_name: None,
            guest_email: None,
            guest_phone: None,
            booking_type: BookingType::DateRange,
            schedule: ScheduleContext {
                schedule_type: ScheduleType::DateRange,
                check_in,
                check_out: check_in + 86_400_000,
                start_date_time: None,
                end_date_time: None,
                nights: 1,
            },
            guest_count: 1,
            unit_count: 1,
            amounts: MoneyAmounts {
                base: 80.0,
                fees: 0.0,
                tax: 0.0,
                total: 80.0,
            },
            currency: Currency::Mxn,
            status,
            payment_status: PaymentStatus::Unpaid,
            payment_provider: PAYMENT_PROVIDER_MANUAL.into(),
            special_requests: None,
            enabled: true,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn candidates_exclude_non_blocking() {
        let backend = LocalBackend::open(
            test_wal_path("candidates.wal"),
            CatalogSeed::default(),
            Arc::new(ActivityHub::new()),
        )
        .unwrap();
        let rid = Ulid::new();
        let kept = backend
            .create_reservation(&record(rid, ReservationStatus::Confirmed, 0))
            .await
            .unwrap();
        backend
            .create_reservation(&record(rid, ReservationStatus::Cancelled, 0))
            .await
            .unwrap();
        backend
            .create_reservation(&record(Ulid::new(), ReservationStatus::Pending, 0))
            .await
            .unwrap();

        let candidates = backend.list_blocking_candidates(rid, 200).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, kept);
        assert_eq!(candidates[0].status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn candidates_are_capped_newest_first() {
        let backend = LocalBackend::open(
            test_wal_path("capped.wal"),
            CatalogSeed::default(),
            Arc::new(ActivityHub::new()),
        )
        .unwrap();
        let rid = Ulid::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let id = backend
                .create_reservation(&record(rid, ReservationStatus::Pending, i * 86_400_000))
                .await
                .unwrap();
            ids.push(id);
        }
        let candidates = backend.list_blocking_candidates(rid, 2).await.unwrap();
        let got: Vec<_> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(got, vec![ids[4], ids[3]]);
    }

    #[tokio::test]
    async fn ledger_survives_restart() {
        let path = test_wal_path("restart.wal");
        let r = resource();
        let lead = Lead {
            id: Ulid::new(),
            resource_id: Some(r.id),
            name: Some("Lucía".into()),
            email: None,
            phone: None,
            message: None,
            status: "new".into(),
            notes: Vec::new(),
            metadata: LeadMetadata::default(),
        };
        let seed = CatalogSeed {
            resources: vec![r.clone()],
            leads: vec![lead.clone()],
        };

        let reservation_id = {
            let backend =
                LocalBackend::open(path.clone(), seed.clone(), Arc::new(ActivityHub::new())).unwrap();
            let id = backend
                .create_reservation(&record(r.id, ReservationStatus::Pending, 0))
                .await
                .unwrap();
            backend.increment_booking_count(r.id).await.unwrap();
            backend
                .mark_lead_reserved(lead.id, id, "booked".into())
                .await
                .unwrap();
            id
        };

        let reopened = LocalBackend::open(path, seed, Arc::new(ActivityHub::new())).unwrap();
        let stored = reopened.reservations_for(&r.id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, reservation_id);
        assert_eq!(reopened.booking_count(&r.id), 1);
        let lead = reopened.lead(&lead.id).unwrap();
        assert_eq!(lead.status, Lead::RESERVED);
        assert_eq!(lead.notes, vec!["booked".to_string()]);
    }

    #[tokio::test]
    async fn side_effects_on_unknown_targets_fail() {
        let backend = LocalBackend::open(
            test_wal_path("unknown_targets.wal"),
            CatalogSeed::default(),
            Arc::new(ActivityHub::new()),
        )
        .unwrap();
        assert!(backend.increment_booking_count(Ulid::new()).await.is_err());
        assert!(
            backend
                .mark_lead_reserved(Ulid::new(), Ulid::new(), String::new())
                .await
                .is_err()
        );
    }

    #[test]
    fn seed_parses_from_json() {
        let rid = Ulid::new();
        let owner = Ulid::new();
        let lid = Ulid::new();
        let json = format!(
            r#"{{
                "resources": [{{"id":"{rid}","owner_id":"{owner}","price":1200,"pricing_model":"per_night","commercial_mode":"vacation","slot_buffer_minutes":120}}],
                "leads": [{{"id":"{lid}","resource_id":"{rid}","metadata":{{"checkInDate":"2024-06-01"}}}}]
            }}"#
        );
        let seed: CatalogSeed = serde_json::from_str(&json).unwrap();
        assert_eq!(seed.resources[0].slot_buffer_minutes, 120);
        assert_eq!(seed.leads[0].status, "new");
        assert_eq!(
            seed.leads[0].metadata.check_in_date.as_deref(),
            Some("2024-06-01")
        );
    }
}
