//! Core business logic - framework-agnostic booking, settlement and payment operations.
//!
//! Nothing in here knows about HTTP. Operations that need the current instant take it as a
//! `now` argument so callers (and tests) control the clock.

/// Appointment queries and the status transition & inventory settlement engine
pub mod appointment;
/// Slot availability calculator
pub mod availability;
/// Blackout windows
pub mod blocked_range;
/// Booking transaction manager
pub mod booking;
/// Inventory catalogue
pub mod inventory;
/// Demo payment state machine
pub mod payment;
/// Service catalogue
pub mod service;
/// Settings singleton
pub mod settings;
/// Capacity override windows
pub mod slot_limit;

use chrono::{DateTime, Timelike, Utc};

/// Drops sub-second precision so stored timestamps share one textual format.
#[must_use]
pub fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

/// Trims optional free text, mapping blank input to `None`.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
