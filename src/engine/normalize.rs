use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::schedule::{ScheduleInput, parse_instant};

/// Monetary overrides exactly as the caller sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmountOverrides {
    pub base: Option<AmountInput>,
    pub fees: Option<AmountInput>,
    pub tax: Option<AmountInput>,
    pub total: Option<AmountInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub count: u32,
    pub units: u32,
    pub special_requests: Option<String>,
}

/// One canonical request, independent of where each field came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub schedule: ScheduleInput,
    pub guest: GuestDetails,
    pub overrides: AmountOverrides,
    pub currency: Option<String>,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub request_id: Option<String>,
}

/// First non-blank value wins.
fn first_text(candidates: &[Option<&String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

fn instant(request: Option<&String>, lead: Option<&String>) -> Option<Ms> {
    first_text(&[request, lead]).and_then(|raw| parse_instant(&raw))
}

fn bounded(value: Option<String>, field: &'static str) -> Result<Option<String>, EngineError> {
    match value {
        Some(v) if v.chars().count() > MAX_TEXT_LEN => Err(EngineError::TextTooLong(field)),
        other => Ok(other),
    }
}

fn count(value: Option<u32>, max: u32, field: &'static str) -> Result<u32, EngineError> {
    match value.unwrap_or(1) {
        n if (1..=max).contains(&n) => Ok(n),
        _ => Err(EngineError::GuestCountInvalid(field)),
    }
}

/// Merge the request payload with the lead it converts (if any).
///
/// Request fields take precedence over lead fields. Unsupported booking and
/// schedule type strings are dropped so that resource defaults apply.
pub fn normalize(
    req: &ManualReservationRequest,
    lead: Option<&Lead>,
) -> Result<NormalizedRequest, EngineError> {
    let meta = lead.map(|l| &l.metadata);

    let schedule = ScheduleInput {
        booking_type: req.booking_type.as_deref().and_then(BookingType::parse),
        schedule_type: req
            .schedule_type
            .as_deref()
            .and_then(ScheduleType::parse)
            .or_else(|| {
                meta.and_then(|m| m.schedule_type.as_deref())
                    .and_then(ScheduleType::parse)
            }),
        check_in: instant(
            req.check_in_date.as_ref(),
            meta.and_then(|m| m.check_in_date.as_ref()),
        ),
        check_out: instant(
            req.check_out_date.as_ref(),
            meta.and_then(|m| m.check_out_date.as_ref()),
        ),
        start: instant(
            req.start_date_time.as_ref(),
            meta.and_then(|m| m.start_date_time.as_ref()),
        ),
        end: instant(
            req.end_date_time.as_ref(),
            meta.and_then(|m| m.end_date_time.as_ref()),
        ),
    };

    let guest = GuestDetails {
        name: bounded(
            first_text(&[req.guest_name.as_ref(), lead.and_then(|l| l.name.as_ref())]),
            "guestName",
        )?,
        email: bounded(
            first_text(&[req.guest_email.as_ref(), lead.and_then(|l| l.email.as_ref())]),
            "guestEmail",
        )?,
        phone: bounded(
            first_text(&[req.guest_phone.as_ref(), lead.and_then(|l| l.phone.as_ref())]),
            "guestPhone",
        )?,
        count: count(
            req.guest_count.or_else(|| meta.and_then(|m| m.guest_count)),
            MAX_GUESTS,
            "guestCount",
        )?,
        units: count(req.unit_count, MAX_UNITS, "unitCount")?,
        special_requests: bounded(
            first_text(&[
                req.special_requests.as_ref(),
                lead.and_then(|l| l.message.as_ref()),
            ]),
            "specialRequests",
        )?,
    };

    let status = match first_text(&[req.status.as_ref()]) {
        None => ReservationStatus::Pending,
        Some(raw) => match ReservationStatus::parse(&raw) {
            Some(s @ (ReservationStatus::Pending | ReservationStatus::Confirmed)) => s,
            _ => return Err(EngineError::StatusInvalid("status")),
        },
    };
    let payment_status = match first_text(&[req.payment_status.as_ref()]) {
        None => PaymentStatus::Unpaid,
        Some(raw) => {
            PaymentStatus::parse(&raw).ok_or(EngineError::StatusInvalid("paymentStatus"))?
        }
    };

    Ok(NormalizedRequest {
        schedule,
        guest,
        overrides: AmountOverrides {
            base: req.base_amount.clone(),
            fees: req.fees_amount.clone(),
            tax: req.tax_amount.clone(),
            total: req.total_amount.clone(),
        },
        currency: first_text(&[req.currency.as_ref()]),
        status,
        payment_status,
        request_id: first_text(&[req.request_id.as_ref()]),
    })
}
