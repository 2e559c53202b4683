// crates/statevault-core/src/core/clock.rs
// ============================================================================
// Module: State Vault Clock
// Description: Injectable wall-clock source and timestamp formatting.
// Purpose: Keep envelope, backup, and sync timestamps testable.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Components never call `OffsetDateTime::now_utc` directly; they ask a
//! [`Clock`]. Production code uses [`SystemClock`], tests drive a
//! [`ManualClock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Clock Trait
// ============================================================================

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> OffsetDateTime;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    /// Current instant.
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a clock frozen at the given unix timestamp (seconds).
    #[must_use]
    pub fn at_unix(seconds: i64) -> Self {
        Self::new(OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH))
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Formats an instant as RFC 3339 (ISO-8601) text.
#[must_use]
pub fn format_rfc3339(instant: OffsetDateTime) -> String {
    instant.format(&Rfc3339).unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

/// Returns unix milliseconds for an instant, saturating at the `i64` range.
#[must_use]
pub fn unix_millis(instant: OffsetDateTime) -> i64 {
    i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
