use ulid::Ulid;

use crate::collab::CollabError;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    ScheduleRequired,
    DateRangeRequired,
    DateRangeInvalid(&'static str),
    TimeSlotRequired,
    TimeSlotInvalid,
    BookingTypeInvalid,
    AmountInvalid(&'static str),
    CurrencyNotSupported(String),
    GuestCountInvalid(&'static str),
    StatusInvalid(&'static str),
    TextTooLong(&'static str),
    Conflict(Ulid),
    ResourceNotAvailable(Ulid),
    LeadNotAvailable(Ulid),
    Forbidden(&'static str),
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ScheduleRequired => "SCHEDULE_REQUIRED",
            EngineError::DateRangeRequired => "DATE_RANGE_REQUIRED",
            EngineError::DateRangeInvalid(_) => "DATE_RANGE_INVALID",
            EngineError::TimeSlotRequired => "TIME_SLOT_REQUIRED",
            EngineError::TimeSlotInvalid => "TIME_SLOT_INVALID",
            EngineError::BookingTypeInvalid => "BOOKING_TYPE_INVALID",
            EngineError::AmountInvalid(_) => "AMOUNT_INVALID",
            EngineError::CurrencyNotSupported(_) => "CURRENCY_NOT_SUPPORTED",
            EngineError::GuestCountInvalid(_) => "GUEST_COUNT_INVALID",
            EngineError::StatusInvalid(_) => "STATUS_INVALID",
            EngineError::TextTooLong(_) => "TEXT_TOO_LONG",
            EngineError::Conflict(_) => "RESERVATION_CONFLICT",
            EngineError::ResourceNotAvailable(_) => "RESOURCE_NOT_AVAILABLE",
            EngineError::LeadNotAvailable(_) => "LEAD_NOT_AVAILABLE",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-equivalent status class.
    pub fn status(&self) -> u16 {
        match self {
            EngineError::Conflict(_) => 409,
            EngineError::ResourceNotAvailable(_) | EngineError::LeadNotAvailable(_) => 404,
            EngineError::Forbidden(_) => 403,
            EngineError::Internal(_) => 500,
            _ => 400,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::ScheduleRequired => write!(f, "no schedule type could be determined"),
            EngineError::DateRangeRequired => {
                write!(f, "date range requires check-in and check-out dates")
            }
            EngineError::DateRangeInvalid(msg) => write!(f, "invalid date range: {msg}"),
            EngineError::TimeSlotRequired => {
                write!(f, "time slot requires start and end date-times")
            }
            EngineError::TimeSlotInvalid => write!(f, "time slot end must be after its start"),
            EngineError::BookingTypeInvalid => {
                write!(f, "resource does not accept reservations of any booking type")
            }
            EngineError::AmountInvalid(field) => write!(f, "invalid amount: {field}"),
            EngineError::CurrencyNotSupported(c) => write!(f, "currency not supported: {c}"),
            EngineError::GuestCountInvalid(field) => write!(f, "invalid count: {field}"),
            EngineError::StatusInvalid(field) => write!(f, "invalid status: {field}"),
            EngineError::TextTooLong(field) => write!(f, "text too long: {field}"),
            EngineError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            EngineError::ResourceNotAvailable(id) => write!(f, "resource not available: {id}"),
            EngineError::LeadNotAvailable(id) => write!(f, "lead not available: {id}"),
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CollabError> for EngineError {
    fn from(e: CollabError) -> Self {
        EngineError::Internal(e.to_string())
    }
}
