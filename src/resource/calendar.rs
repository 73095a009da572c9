//! Calendar seam used to compute termination times.
//!
//! Business-day arithmetic (weekends, holidays) belongs to whoever embeds the
//! janitor; rules only see the [`Calendar`] trait. The two implementations here
//! add whole days.

#![allow(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::core::errors::{JanitorError, Result};

/// Source of "now" and of retention offsets.
///
/// Implementations must be safe to share between worker threads. Failures are
/// reported as [`JanitorError::Calendar`] and propagate out of rule evaluation.
pub trait Calendar: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>>;

    /// The point `days` business days after `from`.
    fn business_day(&self, from: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>>;
}

fn add_days(from: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    from.checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| JanitorError::Calendar {
            details: format!("{from} + {days} days overflows"),
        })
}

/// Wall-clock calendar counting every day as a business day.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCalendar;

impl Calendar for SystemCalendar {
    fn now(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }

    fn business_day(&self, from: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
        add_days(from, days)
    }
}

/// Calendar pinned to a settable instant. Used for replays and tests.
#[derive(Debug)]
pub struct FixedCalendar {
    now: RwLock<DateTime<Utc>>,
}

impl FixedCalendar {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move the clock forward by `days` calendar days.
    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.write();
        *now += Duration::days(days);
    }
}

impl Calendar for FixedCalendar {
    fn now(&self) -> Result<DateTime<Utc>> {
        Ok(*self.now.read())
    }

    fn business_day(&self, from: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
        add_days(from, days)
    }
}
