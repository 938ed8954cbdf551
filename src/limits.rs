use crate::model::Ms;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;

// ── Synchronizer ─────────────────────────────────────────

/// Weeks materialized ahead: this week plus the next three.
pub const SYNC_HORIZON_WEEKS: i64 = 4;

/// Minimum gap between two real synchronization passes.
pub const SYNC_MIN_INTERVAL_MS: Ms = 5 * MINUTE_MS;

pub const DEFAULT_DOCTOR_STATUS: &str = "resident";

// ── Expiration monitor ───────────────────────────────────

pub const MONITOR_TICK_SECS: u64 = 60;
pub const ENDING_SOON_LEAD_MS: Ms = 15 * MINUTE_MS;
pub const PRE_EXPIRING_WINDOW_MS: Ms = 5 * MINUTE_MS;
pub const RECENTLY_EXPIRED_WINDOW_MS: Ms = 15 * MINUTE_MS;

// ── Validation ───────────────────────────────────────────

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TITLE_LEN: usize = 512;
pub const MIN_PIN_LEN: usize = 4;
pub const MAX_PIN_LEN: usize = 8;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;
/// Nothing in a consultation room lasts longer than a day.
pub const MAX_SPAN_DURATION_MS: Ms = DAY_MS;
