//! Booking policy - process-wide booking defaults and the salon's timezone.
//!
//! The salon runs on a single fixed UTC offset. Operating hours, "today" and booking-window
//! date comparisons are all evaluated in that offset, never in the host timezone.

use crate::errors::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::ops::RangeInclusive;

/// Allowed values for the concurrent-appointment capacity
pub const MAX_CONCURRENT_RANGE: RangeInclusive<i32> = 1..=20;
/// Allowed values for the booking window, in days
pub const BOOKING_WINDOW_RANGE: RangeInclusive<i32> = 1..=180;
/// Allowed salon offsets, in minutes east of UTC
pub const UTC_OFFSET_RANGE: RangeInclusive<i32> = -14 * 60..=14 * 60;

pub const DEFAULT_MAX_CONCURRENT: i32 = 1;
pub const DEFAULT_BOOKING_WINDOW_DAYS: i32 = 30;

/// Defaults used when the settings row is first created, plus the salon timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    pub default_max_concurrent: i32,
    pub default_booking_window_days: i32,
    pub utc_offset: FixedOffset,
}

impl BookingPolicy {
    /// Builds a policy, clamping every value into its allowed range.
    pub fn new(max_concurrent: i32, booking_window_days: i32, utc_offset_minutes: i32) -> Result<Self> {
        let minutes = utc_offset_minutes.clamp(*UTC_OFFSET_RANGE.start(), *UTC_OFFSET_RANGE.end());
        let utc_offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| Error::Config {
            message: format!("Invalid salon UTC offset: {utc_offset_minutes} minutes"),
        })?;

        Ok(Self {
            default_max_concurrent: max_concurrent
                .clamp(*MAX_CONCURRENT_RANGE.start(), *MAX_CONCURRENT_RANGE.end()),
            default_booking_window_days: booking_window_days
                .clamp(*BOOKING_WINDOW_RANGE.start(), *BOOKING_WINDOW_RANGE.end()),
            utc_offset,
        })
    }

    /// The salon's calendar date at instant `at`.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }

    /// The last date that may be booked, given the window and the current instant.
    #[must_use]
    pub fn last_bookable_date(&self, now: DateTime<Utc>, booking_window_days: i32) -> NaiveDate {
        self.local_date(now) + chrono::Days::new(u64::try_from(booking_window_days).unwrap_or(0))
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            default_max_concurrent: DEFAULT_MAX_CONCURRENT,
            default_booking_window_days: DEFAULT_BOOKING_WINDOW_DAYS,
            utc_offset: Utc.fix(),
        }
    }
}
