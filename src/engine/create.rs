use std::time::Instant;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::MAX_CANDIDATES;
use crate::model::*;
use crate::observability;

use super::conflict::{candidate_window, find_conflict, now_ms};
use super::followup;
use super::normalize::normalize;
use super::pricing::price;
use super::schedule::resolve_schedule;
use super::{Engine, EngineError, Stage};

impl Engine {
    /// Create a manual reservation.
    ///
    /// Validation, conflict detection and pricing all happen before the one
    /// write; any failure leaves nothing behind. Booking-counter, lead and
    /// activity-log updates run afterwards and cannot fail the request.
    pub async fn create_manual_reservation(
        &self,
        actor: &Actor,
        req: ManualReservationRequest,
    ) -> Result<CreatedReservation, EngineError> {
        let started = Instant::now();
        let mut stage = Stage::Validating;
        let result = self.run_create(actor, &req, &mut stage).await;
        metrics::histogram!(observability::REQUEST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(created) => {
                metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
                info!(
                    "reservation {} created on resource {} by {} ({} → {})",
                    created.id,
                    created.record.resource_id,
                    actor.id,
                    created.record.schedule.check_in,
                    created.record.schedule.check_out,
                );
            }
            Err(e) => {
                metrics::counter!(
                    observability::RESERVATIONS_REJECTED_TOTAL,
                    "code" => e.code(),
                    "stage" => stage.label()
                )
                .increment(1);
                debug!(
                    "reservation on resource {:?} rejected at {}: {e}",
                    req.resource_id,
                    stage.label()
                );
            }
        }
        result
    }

    async fn run_create(
        &self,
        actor: &Actor,
        req: &ManualReservationRequest,
        stage: &mut Stage,
    ) -> Result<CreatedReservation, EngineError> {
        let resource_id = req.resource_id.unwrap_or(Ulid::nil());
        let resource = self
            .catalog
            .get_resource(resource_id)
            .await?
            .filter(|r| r.enabled)
            .ok_or(EngineError::ResourceNotAvailable(resource_id))?;
        self.policy
            .authorize(actor, &resource)
            .map_err(EngineError::Forbidden)?;

        let lead = match req.lead_id {
            None => None,
            Some(lead_id) => {
                let lead = self
                    .catalog
                    .get_lead(lead_id)
                    .await?
                    .ok_or(EngineError::LeadNotAvailable(lead_id))?;
                if lead.resource_id.is_some_and(|rid| rid != resource.id) {
                    return Err(EngineError::LeadNotAvailable(lead_id));
                }
                Some(lead)
            }
        };

        let normalized = normalize(req, lead.as_ref())?;
        let resolved = resolve_schedule(&normalized.schedule, &resource)?;
        *stage = Stage::ScheduleResolved;

        let window = candidate_window(&resolved.context, resource.slot_buffer_minutes)?;

        let lock = self.resource_lock(resource.id);
        let guard = lock.lock().await;

        let candidates = match self
            .ledger
            .list_blocking_candidates(resource.id, MAX_CANDIDATES)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("listing reservations for {} failed, checking none: {e}", resource.id);
                metrics::counter!(observability::CANDIDATE_LIST_FAILURES_TOTAL).increment(1);
                Vec::new()
            }
        };
        if let Some(existing) = find_conflict(&window, &candidates) {
            return Err(EngineError::Conflict(existing));
        }
        *stage = Stage::ConflictChecked;

        let quote = price(
            &resource,
            &resolved.context,
            &normalized.overrides,
            normalized.currency.as_deref(),
        )?;
        if quote.total_overridden {
            warn!(
                "caller total {} differs from base+fees+tax on resource {}",
                quote.amounts.total, resource.id
            );
            metrics::counter!(observability::TOTAL_OVERRIDE_MISMATCH_TOTAL).increment(1);
        }
        *stage = Stage::Priced;

        let guest = normalized.guest;
        let record = ReservationRecord {
            resource_id: resource.id,
            owner_id: resource.owner_id,
            created_by: actor.id,
            lead_id: lead.as_ref().map(|l| l.id),
            guest_name: guest.name,
            guest_email: guest.email,
            guest_phone: guest.phone,
            booking_type: resolved.booking_type,
            schedule: resolved.context,
            guest_count: guest.count,
            unit_count: guest.units,
            amounts: quote.amounts,
            currency: quote.currency,
            status: normalized.status,
            payment_status: normalized.payment_status,
            payment_provider: PAYMENT_PROVIDER_MANUAL.into(),
            special_requests: guest.special_requests,
            enabled: true,
            created_at: now_ms(),
        };
        let id = self.ledger.create_reservation(&record).await?;
        drop(guard);
        *stage = Stage::Persisted;

        let created = CreatedReservation { id, record };
        followup::dispatch(self.effects.as_ref(), actor, &created, normalized.request_id)
            .await
            .log(id);
        Ok(created)
    }
}
