//! Injectable wall clock.
//!
//! The ledger stamps `created_at` and evaluates the default as-of cutoff
//! through a [`Clock`], so point-in-time behavior can be tested without
//! touching system time.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};

use crate::error::{StockError, StockResult};

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Process wall clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Truncate to the whole-second granularity timestamps are stored and
/// compared at.
pub fn to_ledger_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

/// Parse a textual as-of cutoff.
///
/// Accepts RFC 3339 (`2024-03-01T12:00:00Z`) or `YYYY-MM-DD HH:MM:SS`,
/// the latter interpreted as UTC.
pub fn parse_as_of(input: &str) -> StockResult<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(at.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| StockError::invalid_timestamp(format!("{trimmed:?}: {e}")))
}
