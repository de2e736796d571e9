use crate::model::Ms;

/// Existing reservations fetched per resource for conflict detection.
pub const MAX_CANDIDATES: usize = 200;

pub const MIN_NIGHTS: i64 = 1;
pub const MAX_NIGHTS: i64 = 365;

pub const DAY_MS: Ms = 86_400_000;
pub const MINUTE_MS: Ms = 60_000;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;

pub const MAX_GUESTS: u32 = 500;
pub const MAX_UNITS: u32 = 100;
pub const MAX_TEXT_LEN: usize = 2_000;

/// Before/after snapshots stored in the activity log.
pub const MAX_ACTIVITY_SNAPSHOT_BYTES: usize = 8 * 1024;
pub const MAX_ACTIVITY_ENTRIES: usize = 1_000;

/// Longest accepted protocol frame.
pub const MAX_LINE_LEN: usize = 64 * 1024;
