use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Schedule fields after request, lead and resource sources were merged.
/// Only values that parsed cleanly survive; everything else is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleInput {
    pub booking_type: Option<BookingType>,
    pub schedule_type: Option<ScheduleType>,
    pub check_in: Option<Ms>,
    pub check_out: Option<Ms>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub booking_type: BookingType,
    pub context: ScheduleContext,
}

/// Parse an instant from RFC 3339, a bare date (midnight UTC, `YYYY-MM-DD`
/// or `YYYYMMDD`), a naive date-time (UTC) or integer epoch milliseconds.
pub fn parse_instant(raw: &str) -> Option<Ms> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let digits = raw.bytes().all(|b| b.is_ascii_digit());
    let ms = if digits && raw.len() == 8 {
        // YYYYMMDD, never epoch milliseconds
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d").ok()?;
        date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis()
    } else if digits {
        raw.parse::<Ms>().ok()?
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.timestamp_millis()
    } else if let Some(dt) = parse_naive_datetime(raw) {
        dt.and_utc().timestamp_millis()
    } else {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
        date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis()
    };
    (MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS)
        .contains(&ms)
        .then_some(ms)
}

fn parse_naive_datetime(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// `ceil((check_out - check_in) / 1 day)`; zero for non-positive spans.
pub fn nights_between(check_in: Ms, check_out: Ms) -> i64 {
    let diff = check_out - check_in;
    if diff <= 0 {
        return 0;
    }
    (diff + DAY_MS - 1) / DAY_MS
}

/// Booking type: the explicit request value, else the resource default.
pub fn resolve_booking_type(
    explicit: Option<BookingType>,
    resource: &Resource,
) -> Result<BookingType, EngineError> {
    explicit
        .or_else(|| resource.default_booking_type())
        .ok_or(EngineError::BookingTypeInvalid)
}

/// Pick the scheduling model.
///
/// | booking type     | schedule type                                          |
/// |------------------|--------------------------------------------------------|
/// | `date_range`     | DateRange                                              |
/// | `time_slot`      | TimeSlot                                               |
/// | `fixed_event`    | TimeSlot                                               |
/// | `manual_contact` | requested → resource manual-contact type → inferred    |
///
/// Inference looks at which parsed fields are present: a full check-in /
/// check-out pair means DateRange, a full start / end pair means TimeSlot.
pub fn decide_schedule_type(
    booking_type: BookingType,
    input: &ScheduleInput,
    resource: &Resource,
) -> Option<ScheduleType> {
    match booking_type {
        BookingType::DateRange => Some(ScheduleType::DateRange),
        BookingType::TimeSlot | BookingType::FixedEvent => Some(ScheduleType::TimeSlot),
        BookingType::ManualContact => input
            .schedule_type
            .or(resource.manual_contact_schedule_type)
            .or_else(|| infer_schedule_type(input)),
    }
}

fn infer_schedule_type(input: &ScheduleInput) -> Option<ScheduleType> {
    match (input.check_in, input.check_out, input.start, input.end) {
        (Some(_), Some(_), _, _) => Some(ScheduleType::DateRange),
        (_, _, Some(_), Some(_)) => Some(ScheduleType::TimeSlot),
        _ => None,
    }
}

pub fn resolve_schedule(
    input: &ScheduleInput,
    resource: &Resource,
) -> Result<ResolvedSchedule, EngineError> {
    let booking_type = resolve_booking_type(input.booking_type, resource)?;
    let schedule_type =
        decide_schedule_type(booking_type, input, resource).ok_or(EngineError::ScheduleRequired)?;
    let context = match schedule_type {
        ScheduleType::DateRange => date_range(input.check_in, input.check_out)?,
        ScheduleType::TimeSlot => time_slot(input.start, input.end)?,
    };
    Ok(ResolvedSchedule {
        booking_type,
        context,
    })
}

fn date_range(check_in: Option<Ms>, check_out: Option<Ms>) -> Result<ScheduleContext, EngineError> {
    let (Some(check_in), Some(check_out)) = (check_in, check_out) else {
        return Err(EngineError::DateRangeRequired);
    };
    if check_out <= check_in {
        return Err(EngineError::DateRangeInvalid("check-out must be after check-in"));
    }
    let nights = nights_between(check_in, check_out);
    if !(MIN_NIGHTS..=MAX_NIGHTS).contains(&nights) {
        return Err(EngineError::DateRangeInvalid("stay must last between 1 and 365 nights"));
    }
    Ok(ScheduleContext {
        schedule_type: ScheduleType::DateRange,
        check_in,
        check_out,
        start_date_time: None,
        end_date_time: None,
        nights: nights as u32,
    })
}

fn time_slot(start: Option<Ms>, end: Option<Ms>) -> Result<ScheduleContext, EngineError> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(EngineError::TimeSlotRequired);
    };
    if end <= start {
        return Err(EngineError::TimeSlotInvalid);
    }
    Ok(ScheduleContext {
        schedule_type: ScheduleType::TimeSlot,
        check_in: start,
        check_out: end,
        start_date_time: Some(start),
        end_date_time: Some(end),
        nights: 0,
    })
}
