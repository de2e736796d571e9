use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Buffered window of the reservation being created.
pub fn candidate_window(ctx: &ScheduleContext, buffer_minutes: i64) -> Result<TimeWindow, EngineError> {
    TimeWindow::buffered(ctx.check_in, ctx.check_out, buffer_minutes)
        .ok_or_else(|| EngineError::Internal("resolved schedule has an empty window".into()))
}

/// Window of an existing reservation, or `None` when its dates are missing
/// or inverted.
///
/// Date-range bookings use check-in/check-out. Everything else uses the
/// start/end instants and falls back to check-in/check-out when that pair is
/// incomplete.
pub fn existing_window(existing: &ExistingReservation) -> Option<TimeWindow> {
    let date_pair = (existing.check_in, existing.check_out);
    let (start, end) = match existing.booking_type {
        BookingType::DateRange => date_pair,
        _ => match (existing.start_date_time, existing.end_date_time) {
            (Some(start), Some(end)) => (Some(start), Some(end)),
            _ => date_pair,
        },
    };
    TimeWindow::try_new(start?, end?)
}

/// First blocking reservation overlapping the buffered `candidate` window.
///
/// The candidate is widened on both sides, so every existing reservation
/// ends up at least one buffer away from the new one whichever side of the
/// gap it falls on. Touching windows do not conflict.
pub fn find_conflict(candidate: &TimeWindow, existing: &[ExistingReservation]) -> Option<Ulid> {
    existing
        .iter()
        .filter(|r| r.status.is_blocking())
        .find(|r| existing_window(r).is_some_and(|w| w.overlaps(candidate)))
        .map(|r| r.id)
}

pub fn has_conflict(candidate: &TimeWindow, existing: &[ExistingReservation]) -> bool {
    find_conflict(candidate, existing).is_some()
}
