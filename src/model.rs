use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MINUTE_MS;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Ms,
    pub end: Ms,
}

impl TimeWindow {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "TimeWindow start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Expand `[start, end)` outward on both sides by `buffer_minutes`.
    /// Negative buffers count as zero; arithmetic saturates at the `Ms` range.
    pub fn buffered(start: Ms, end: Ms, buffer_minutes: i64) -> Option<Self> {
        let buffer = buffer_minutes.max(0).saturating_mul(MINUTE_MS);
        Self::try_new(start, end).map(|w| Self {
            start: w.start.saturating_sub(buffer),
            end: w.end.saturating_add(buffer),
        })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

// ── Enumerations ─────────────────────────────────────────────────

/// Coarse category of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    ManualContact,
    DateRange,
    TimeSlot,
    FixedEvent,
}

impl BookingType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual_contact" => Some(Self::ManualContact),
            "date_range" => Some(Self::DateRange),
            "time_slot" => Some(Self::TimeSlot),
            "fixed_event" => Some(Self::FixedEvent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualContact => "manual_contact",
            Self::DateRange => "date_range",
            Self::TimeSlot => "time_slot",
            Self::FixedEvent => "fixed_event",
        }
    }
}

/// The two concrete scheduling models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    DateRange,
    TimeSlot,
}

impl ScheduleType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "date_range" => Some(Self::DateRange),
            "time_slot" => Some(Self::TimeSlot),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateRange => "date_range",
            Self::TimeSlot => "time_slot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Expired,
}

impl ReservationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    /// Pending and confirmed reservations still occupy resource time.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Some(Self::Unpaid),
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    FixedTotal,
    PerNight,
    PerDay,
    PerHour,
    PerPerson,
    PerEvent,
    PerMonth,
}

impl PricingModel {
    /// Models whose unit price is multiplied by the number of nights.
    pub fn scales_with_nights(&self) -> bool {
        matches!(self, Self::PerNight | Self::PerDay)
    }
}

/// How a listing is offered commercially; drives its default booking type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommercialMode {
    Sale,
    RentLongTerm,
    RentShortTerm,
    Vacation,
    Hourly,
    Service,
    Event,
}

impl CommercialMode {
    pub fn default_booking_type(&self) -> Option<BookingType> {
        match self {
            Self::Sale => None,
            Self::RentLongTerm => Some(BookingType::ManualContact),
            Self::RentShortTerm | Self::Vacation => Some(BookingType::DateRange),
            Self::Hourly | Self::Service => Some(BookingType::TimeSlot),
            Self::Event => Some(BookingType::FixedEvent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "MXN")]
    Mxn,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub const FALLBACK: Currency = Currency::Mxn;

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MXN" => Some(Self::Mxn),
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mxn => "MXN",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

// ── Catalog (read-only to the engine) ────────────────────────────

fn default_true() -> bool {
    true
}

/// A bookable listing: property, vehicle, service, venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub owner_id: Ulid,
    #[serde(default)]
    pub title: Option<String>,
    pub price: f64,
    pub pricing_model: PricingModel,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub slot_buffer_minutes: i64,
    pub commercial_mode: CommercialMode,
    #[serde(default)]
    pub default_booking_type: Option<BookingType>,
    /// Schedule model used when a manual-contact request does not name one.
    #[serde(default)]
    pub manual_contact_schedule_type: Option<ScheduleType>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Resource {
    pub fn default_booking_type(&self) -> Option<BookingType> {
        self.default_booking_type
            .or_else(|| self.commercial_mode.default_booking_type())
    }
}

/// Schedule and guest fields a lead captured before it was converted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadMetadata {
    pub schedule_type: Option<String>,
    pub check_in_date: Option<String>,
    pub check_out_date: Option<String>,
    pub start_date_time: Option<String>,
    pub end_date_time: Option<String>,
    pub guest_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Ulid,
    #[serde(default)]
    pub resource_id: Option<Ulid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Lead::initial_status")]
    pub status: String,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub metadata: LeadMetadata,
}

impl Lead {
    pub const RESERVED: &'static str = "reserved";

    fn initial_status() -> String {
        "new".into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Owner,
    Agent,
}

/// The authenticated caller on whose behalf a reservation is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Ulid,
    pub role: ActorRole,
}

// ── Request payload ──────────────────────────────────────────────

/// A monetary override as it arrives from a form: number or numeric text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

/// Raw manual-reservation payload. Every field is optional; the schedule
/// resolver decides what is required for the resolved booking type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualReservationRequest {
    pub resource_id: Option<Ulid>,
    pub lead_id: Option<Ulid>,
    pub request_id: Option<String>,
    pub booking_type: Option<String>,
    pub schedule_type: Option<String>,
    pub check_in_date: Option<String>,
    pub check_out_date: Option<String>,
    pub start_date_time: Option<String>,
    pub end_date_time: Option<String>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_count: Option<u32>,
    pub unit_count: Option<u32>,
    pub base_amount: Option<AmountInput>,
    pub fees_amount: Option<AmountInput>,
    pub tax_amount: Option<AmountInput>,
    pub total_amount: Option<AmountInput>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub special_requests: Option<String>,
}

// ── Resolved values ──────────────────────────────────────────────

/// The scheduling decision for one request.
///
/// `check_in`/`check_out` are always populated; for time slots they mirror
/// `start_date_time`/`end_date_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleContext {
    pub schedule_type: ScheduleType,
    pub check_in: Ms,
    pub check_out: Ms,
    pub start_date_time: Option<Ms>,
    pub end_date_time: Option<Ms>,
    pub nights: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoneyAmounts {
    pub base: f64,
    pub fees: f64,
    pub tax: f64,
    pub total: f64,
}

pub const PAYMENT_PROVIDER_MANUAL: &str = "manual";

/// A reservation as created by the engine. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub resource_id: Ulid,
    pub owner_id: Ulid,
    pub created_by: Ulid,
    pub lead_id: Option<Ulid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub booking_type: BookingType,
    pub schedule: ScheduleContext,
    pub guest_count: u32,
    pub unit_count: u32,
    pub amounts: MoneyAmounts,
    pub currency: Currency,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub payment_provider: String,
    pub special_requests: Option<String>,
    pub enabled: bool,
    pub created_at: Ms,
}

impl ReservationRecord {
    /// View of this record as a scheduling candidate for later requests.
    pub fn as_existing(&self, id: Ulid) -> ExistingReservation {
        ExistingReservation {
            id,
            resource_id: self.resource_id,
            booking_type: self.booking_type,
            status: self.status,
            payment_status: self.payment_status,
            check_in: Some(self.schedule.check_in),
            check_out: Some(self.schedule.check_out),
            start_date_time: self.schedule.start_date_time,
            end_date_time: self.schedule.end_date_time,
        }
    }
}

/// A previously persisted reservation as seen by the conflict detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingReservation {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub booking_type: BookingType,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub check_in: Option<Ms>,
    pub check_out: Option<Ms>,
    pub start_date_time: Option<Ms>,
    pub end_date_time: Option<Ms>,
}

/// The caller-facing view of a created reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSummary {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub booking_type: BookingType,
    pub schedule_type: ScheduleType,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub total: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedReservation {
    pub id: Ulid,
    pub record: ReservationRecord,
}

impl CreatedReservation {
    pub const CODE: &'static str = "RESERVATION_CREATED_MANUAL";
    pub const STATUS: u16 = 201;

    pub fn summary(&self) -> ReservationSummary {
        ReservationSummary {
            id: self.id,
            resource_id: self.record.resource_id,
            booking_type: self.record.booking_type,
            schedule_type: self.record.schedule.schedule_type,
            status: self.record.status,
            payment_status: self.record.payment_status,
            total: self.record.amounts.total,
            currency: self.record.currency,
        }
    }
}

/// Ledger events, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ReservationCreated {
        id: Ulid,
        record: ReservationRecord,
    },
    BookingCounted {
        resource_id: Ulid,
    },
    LeadReserved {
        lead_id: Ulid,
        reservation_id: Ulid,
        note: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::DAY_MS;

    #[test]
    fn window_overlap() {
        let a = TimeWindow::new(100, 200);
        let b = TimeWindow::new(150, 250);
        let c = TimeWindow::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn buffered_window_widens_both_sides() {
        let w = TimeWindow::buffered(10 * MINUTE_MS, 20 * MINUTE_MS, 5).unwrap();
        assert_eq!(w, TimeWindow::new(5 * MINUTE_MS, 25 * MINUTE_MS));
        assert_eq!(w.duration_ms(), 20 * MINUTE_MS);
    }

    #[test]
    fn buffered_window_never_shrinks() {
        for buffer in [0, 1, 15, 60, 1440] {
            let w = TimeWindow::buffered(1_000_000, 2_000_000, buffer).unwrap();
            assert!(w.start <= 1_000_000);
            assert!(w.end >= 2_000_000);
        }
    }

    #[test]
    fn long_buffers_are_not_capped() {
        let month = 30 * 24 * 60;
        let w = TimeWindow::buffered(100 * DAY_MS, 101 * DAY_MS, month).unwrap();
        assert_eq!(w, TimeWindow::new(70 * DAY_MS, 131 * DAY_MS));

        let w = TimeWindow::buffered(0, 1, i64::MAX).unwrap();
        assert_eq!(w, TimeWindow::new(Ms::MIN, Ms::MAX));
    }

    #[test]
    fn negative_buffer_counts_as_zero() {
        let w = TimeWindow::buffered(100, 200, -30).unwrap();
        assert_eq!(w, TimeWindow::new(100, 200));
    }

    #[test]
    fn empty_or_inverted_window_rejected() {
        assert!(TimeWindow::try_new(100, 100).is_none());
        assert!(TimeWindow::try_new(200, 100).is_none());
        assert!(TimeWindow::buffered(200, 100, 60).is_none());
    }

    #[test]
    fn enum_parsing_is_case_insensitive() {
        assert_eq!(BookingType::parse(" Date_Range "), Some(BookingType::DateRange));
        assert_eq!(BookingType::parse("weekly"), None);
        assert_eq!(ScheduleType::parse("TIME_SLOT"), Some(ScheduleType::TimeSlot));
        assert_eq!(Currency::parse("usd"), Some(Currency::Usd));
        assert_eq!(Currency::parse("GBP"), None);
        assert_eq!(ReservationStatus::parse("Cancelled"), Some(ReservationStatus::Cancelled));
        assert_eq!(PaymentStatus::parse("paid"), Some(PaymentStatus::Paid));
    }

    #[test]
    fn only_pending_and_confirmed_block() {
        assert!(ReservationStatus::Pending.is_blocking());
        assert!(ReservationStatus::Confirmed.is_blocking());
        assert!(!ReservationStatus::Cancelled.is_blocking());
        assert!(!ReservationStatus::Completed.is_blocking());
        assert!(!ReservationStatus::Expired.is_blocking());
    }

    #[test]
    fn commercial_mode_defaults() {
        assert_eq!(CommercialMode::Sale.default_booking_type(), None);
        assert_eq!(
            CommercialMode::Vacation.default_booking_type(),
            Some(BookingType::DateRange)
        );
        assert_eq!(
            CommercialMode::Service.default_booking_type(),
            Some(BookingType::TimeSlot)
        );
    }

    #[test]
    fn request_accepts_camel_case_and_mixed_amounts() {
        let req: ManualReservationRequest = serde_json::from_str(
            r#"{"checkInDate":"2024-03-01","checkOutDate":"2024-03-04","baseAmount":"150.5","taxAmount":12}"#,
        )
        .unwrap();
        assert_eq!(req.check_in_date.as_deref(), Some("2024-03-01"));
        assert_eq!(req.base_amount, Some(AmountInput::Text("150.5".into())));
        assert_eq!(req.tax_amount, Some(AmountInput::Number(12.0)));
        assert!(req.lead_id.is_none());
    }

    #[test]
    fn resource_defaults_from_json() {
        let id = Ulid::new();
        let owner = Ulid::new();
        let json = format!(
            r#"{{"id":"{id}","owner_id":"{owner}","price":50,"pricing_model":"per_night","commercial_mode":"vacation"}}"#
        );
        let r: Resource = serde_json::from_str(&json).unwrap();
        assert!(r.enabled);
        assert_eq!(r.slot_buffer_minutes, 0);
        assert_eq!(r.default_booking_type(), Some(BookingType::DateRange));
    }

    #[test]
    fn ledger_event_serialization_roundtrip() {
        let event = LedgerEvent::LeadReserved {
            lead_id: Ulid::new(),
            reservation_id: Ulid::new(),
            note: "converted".into(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: LedgerEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
