//! Slot availability calculator.
//!
//! The slot loop is a pure function over in-memory intervals ([`compute_slots`]); the
//! [`get_availability`] wrapper loads those intervals for one salon day and applies the
//! booking-window gate before the loop runs.
//!
//! Candidate slots start at a fixed 15-minute stride from opening time. A slot is dropped
//! when it overlaps a blocked range, when it starts before "now", or when the active
//! appointments overlapping it already fill its capacity.

use crate::{
    config::BookingPolicy,
    entities::{Appointment, AppointmentStatus, appointment, blocked_range, slot_limit},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::{blocked_range as blocked, service, settings, slot_limit as limits};

/// Opening time, salon-local
pub const OPENING_HOUR: u32 = 9;
/// Closing time, salon-local
pub const CLOSING_HOUR: u32 = 18;
/// Distance between candidate slot starts
pub const SLOT_STRIDE_MINUTES: i64 = 15;

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl From<&appointment::Model> for TimeRange {
    fn from(model: &appointment::Model) -> Self {
        Self::new(model.scheduled_start, model.scheduled_end)
    }
}

impl From<&blocked_range::Model> for TimeRange {
    fn from(model: &blocked_range::Model) -> Self {
        Self::new(model.starts_at, model.ends_at)
    }
}

/// A window with a lowered capacity ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimit {
    pub range: TimeRange,
    pub max_concurrent: i32,
}

impl From<&slot_limit::Model> for CapacityLimit {
    fn from(model: &slot_limit::Model) -> Self {
        Self {
            range: TimeRange::new(model.starts_at, model.ends_at),
            max_concurrent: model.max_concurrent,
        }
    }
}

/// A bookable interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub remaining_capacity: i32,
}

/// Everything the slot loop needs for one salon day.
#[derive(Debug, Clone, Copy)]
pub struct DaySchedule<'a> {
    pub date: NaiveDate,
    pub utc_offset: FixedOffset,
    pub duration_minutes: i32,
    /// Salon-wide capacity from settings
    pub capacity: i32,
    /// Active appointments intersecting the day
    pub appointments: &'a [TimeRange],
    /// Blocked ranges intersecting the day
    pub blocked: &'a [TimeRange],
    /// Capacity overrides intersecting the day
    pub limits: &'a [CapacityLimit],
    /// Slots starting before this instant are dropped
    pub not_before: Option<DateTime<Utc>>,
}

/// Operating hours of `date` in the salon's offset, as a UTC interval.
#[must_use]
pub fn operating_window(date: NaiveDate, utc_offset: FixedOffset) -> TimeRange {
    let at = |hour: u32| {
        let local = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
        // A fixed offset maps every local time to exactly one instant
        utc_offset
            .from_local_datetime(&local)
            .single()
            .map_or_else(|| local.and_utc(), |t| t.with_timezone(&Utc))
    };
    TimeRange::new(at(OPENING_HOUR), at(CLOSING_HOUR))
}

/// Capacity of `range`: the salon-wide capacity, lowered by any overlapping limit.
#[must_use]
pub fn effective_capacity(capacity: i32, limits: &[CapacityLimit], range: &TimeRange) -> i32 {
    limits
        .iter()
        .filter(|limit| limit.range.overlaps(range))
        .map(|limit| limit.max_concurrent)
        .fold(capacity, i32::min)
}

/// Number of intervals in `appointments` overlapping `range`.
#[must_use]
pub fn count_overlapping(appointments: &[TimeRange], range: &TimeRange) -> i32 {
    let count = appointments.iter().filter(|a| a.overlaps(range)).count();
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Produces the chronologically ordered bookable slots of one day.
///
/// Never yields a slot with zero remaining capacity or one that overlaps a blocked range.
/// A duration that does not fit inside operating hours yields no slots.
#[must_use]
pub fn compute_slots(schedule: &DaySchedule<'_>) -> Vec<Slot> {
    let mut slots = Vec::new();
    if schedule.duration_minutes <= 0 {
        return slots;
    }

    let window = operating_window(schedule.date, schedule.utc_offset);
    let duration = Duration::minutes(i64::from(schedule.duration_minutes));
    let stride = Duration::minutes(SLOT_STRIDE_MINUTES);

    let mut start = window.start;
    while start + duration <= window.end {
        let candidate = TimeRange::new(start, start + duration);
        start += stride;

        if schedule.not_before.is_some_and(|now| candidate.start < now) {
            continue;
        }
        if schedule.blocked.iter().any(|b| b.overlaps(&candidate)) {
            continue;
        }

        let capacity = effective_capacity(schedule.capacity, schedule.limits, &candidate);
        let remaining = capacity - count_overlapping(schedule.appointments, &candidate);
        if remaining <= 0 {
            continue;
        }

        slots.push(Slot {
            start: candidate.start,
            end: candidate.end,
            remaining_capacity: remaining,
        });
    }
    slots
}

/// Settings and service facts echoed with an availability response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityMeta {
    pub max_concurrent_appointments: i32,
    pub booking_window_days: i32,
    pub service_duration_minutes: i32,
}

/// Availability of one service on one salon day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub service_id: i64,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub slots: Vec<Slot>,
    pub meta: AvailabilityMeta,
    pub blocked_ranges: Vec<blocked_range::Model>,
}

/// Active appointments overlapping `[start, end)`.
pub async fn find_active_overlapping<C>(
    db: &C,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<appointment::Model>>
where
    C: ConnectionTrait,
{
    Appointment::find()
        .filter(appointment::Column::Status.is_in(AppointmentStatus::ACTIVE))
        .filter(appointment::Column::ScheduledStart.lt(end))
        .filter(appointment::Column::ScheduledEnd.gt(start))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Computes the bookable slots of `service_id` on the salon-local `date`.
///
/// # Errors
/// Returns an error if:
/// - The service does not exist or is inactive
/// - `date` lies beyond today plus the booking window
/// - The database query fails
pub async fn get_availability(
    db: &DatabaseConnection,
    policy: &BookingPolicy,
    service_id: i64,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Availability> {
    let service = service::get_active_service(db, service_id).await?;
    let current = settings::get_or_create(db, policy, now).await?;

    if date > policy.last_bookable_date(now, current.booking_window_days) {
        return Err(Error::BookingWindowExceeded {
            days: current.booking_window_days,
        });
    }

    let day = operating_window(date, policy.utc_offset);
    let appointments: Vec<TimeRange> = find_active_overlapping(db, day.start, day.end)
        .await?
        .iter()
        .map(TimeRange::from)
        .collect();
    let blocked_ranges = blocked::find_overlapping(db, day.start, day.end).await?;
    let blocked: Vec<TimeRange> = blocked_ranges.iter().map(TimeRange::from).collect();
    let capacity_limits: Vec<CapacityLimit> = limits::find_overlapping(db, day.start, day.end)
        .await?
        .iter()
        .map(CapacityLimit::from)
        .collect();

    let slots = compute_slots(&DaySchedule {
        date,
        utc_offset: policy.utc_offset,
        duration_minutes: service.duration_minutes,
        capacity: current.max_concurrent_appointments,
        appointments: &appointments,
        blocked: &blocked,
        limits: &capacity_limits,
        not_before: Some(now),
    });
    debug!(service_id, %date, slots = slots.len(), "Computed availability");

    Ok(Availability {
        service_id,
        date,
        generated_at: now,
        slots,
        meta: AvailabilityMeta {
            max_concurrent_appointments: current.max_concurrent_appointments,
            booking_window_days: current.booking_window_days,
            service_duration_minutes: service.duration_minutes,
        },
        blocked_ranges,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        blocked_range::{NewBlockedRange, create_blocked_range},
        slot_limit::{NewSlotLimit, create_slot_limit},
    };
    use crate::test_utils::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        test_day_at(hour, minute)
    }

    fn schedule<'a>(
        duration_minutes: i32,
        capacity: i32,
        appointments: &'a [TimeRange],
        blocked: &'a [TimeRange],
        limits: &'a [CapacityLimit],
    ) -> DaySchedule<'a> {
        DaySchedule {
            date: test_date(),
            utc_offset: utc(),
            duration_minutes,
            capacity,
            appointments,
            blocked,
            limits,
            not_before: None,
        }
    }

    #[test]
    fn test_empty_day_hourly_service() {
        let slots = compute_slots(&schedule(60, 1, &[], &[], &[]));

        // 09:00 through 17:00 inclusive at a 15 minute stride
        assert_eq!(slots.len(), 33);
        assert_eq!(slots[0].start, at(9, 0));
        assert_eq!(slots[0].end, at(10, 0));
        assert_eq!(slots.last().unwrap().start, at(17, 0));
        assert_eq!(slots.last().unwrap().end, at(18, 0));
        assert!(slots.iter().all(|s| s.remaining_capacity == 1));
        assert!(slots.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_duration_longer_than_opening_hours() {
        assert!(compute_slots(&schedule(9 * 60 + 15, 3, &[], &[], &[])).is_empty());
        // Exactly nine hours fits once
        assert_eq!(compute_slots(&schedule(9 * 60, 3, &[], &[], &[])).len(), 1);
    }

    #[test]
    fn test_blocked_range_excludes_intersecting_slots() {
        let blocked = [TimeRange::new(at(10, 0), at(11, 0))];
        let slots = compute_slots(&schedule(30, 2, &[], &blocked, &[]));

        assert!(
            slots
                .iter()
                .all(|s| !TimeRange::new(s.start, s.end).overlaps(&blocked[0]))
        );
        assert!(!slots.iter().any(|s| s.start >= at(9, 45) && s.start < at(11, 0)));
        assert!(slots.iter().any(|s| s.start == at(9, 30)));
        assert!(slots.iter().any(|s| s.start == at(11, 0)));
    }

    #[test]
    fn test_capacity_counts_overlapping_appointments() {
        let appointments = [
            TimeRange::new(at(10, 0), at(11, 0)),
            TimeRange::new(at(10, 30), at(11, 30)),
        ];
        let slots = compute_slots(&schedule(60, 2, &appointments, &[], &[]));

        let find = |h, m| slots.iter().find(|s| s.start == at(h, m)).copied();
        assert_eq!(find(9, 0).unwrap().remaining_capacity, 2);
        assert_eq!(find(9, 15).unwrap().remaining_capacity, 1);
        // 09:45-10:45 and 10:00-11:00 overlap both appointments
        assert!(find(9, 45).is_none());
        assert!(find(10, 0).is_none());
        assert_eq!(find(11, 0).unwrap().remaining_capacity, 1);
        assert_eq!(find(11, 30).unwrap().remaining_capacity, 2);
    }

    #[test]
    fn test_never_negative_capacity() {
        // More appointments than capacity in the same window
        let appointments = [TimeRange::new(at(12, 0), at(13, 0)); 5];
        let slots = compute_slots(&schedule(15, 2, &appointments, &[], &[]));
        assert!(slots.iter().all(|s| s.remaining_capacity > 0));
        assert!(!slots.iter().any(|s| s.start >= at(12, 0) && s.start < at(13, 0)));
    }

    #[test]
    fn test_slot_limit_lowers_capacity() {
        let limits = [CapacityLimit {
            range: TimeRange::new(at(12, 0), at(13, 0)),
            max_concurrent: 1,
        }];
        let appointments = [TimeRange::new(at(12, 0), at(12, 30))];
        let slots = compute_slots(&schedule(30, 3, &appointments, &[], &limits));

        let find = |h, m| slots.iter().find(|s| s.start == at(h, m)).copied();
        assert_eq!(find(11, 0).unwrap().remaining_capacity, 3);
        assert!(find(12, 0).is_none());
        assert!(find(12, 15).is_none());
        // Inside the limit but clear of the appointment
        assert_eq!(find(12, 30).unwrap().remaining_capacity, 1);
        assert_eq!(find(13, 0).unwrap().remaining_capacity, 3);
    }

    #[test]
    fn test_past_slots_are_dropped() {
        let mut day = schedule(60, 1, &[], &[], &[]);
        day.not_before = Some(at(12, 5));
        let slots = compute_slots(&day);
        assert_eq!(slots[0].start, at(12, 15));
    }

    #[test]
    fn test_operating_window_respects_offset() {
        let manila = FixedOffset::east_opt(8 * 3600).unwrap();
        let window = operating_window(test_date(), manila);
        // 09:00 in UTC+8 is 01:00 UTC
        assert_eq!(window.start, at(1, 0));
        assert_eq!(window.end, at(10, 0));
    }

    #[test]
    fn test_effective_capacity_takes_minimum() {
        let limits = [
            CapacityLimit {
                range: TimeRange::new(at(9, 0), at(12, 0)),
                max_concurrent: 2,
            },
            CapacityLimit {
                range: TimeRange::new(at(11, 0), at(12, 0)),
                max_concurrent: 1,
            },
        ];
        assert_eq!(effective_capacity(4, &limits, &TimeRange::new(at(9, 0), at(10, 0))), 2);
        assert_eq!(effective_capacity(4, &limits, &TimeRange::new(at(11, 30), at(12, 30))), 1);
        assert_eq!(effective_capacity(4, &limits, &TimeRange::new(at(12, 0), at(13, 0))), 4);
    }

    #[tokio::test]
    async fn test_availability_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = test_policy();
        let service = create_test_service(&db, "Haircut", 60).await?;

        let first = get_availability(&db, &policy, service.id, test_date(), fixed_now()).await?;
        let second = get_availability(&db, &policy, service.id, test_date(), fixed_now()).await?;
        assert_eq!(first.slots, second.slots);
        assert_eq!(first.slots.len(), 33);
        assert_eq!(first.meta.service_duration_minutes, 60);
        assert_eq!(first.meta.max_concurrent_appointments, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_availability_beyond_window() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = test_policy();
        let service = create_test_service(&db, "Haircut", 60).await?;

        let today = policy.local_date(fixed_now());
        let last = today + chrono::Days::new(30);
        assert!(get_availability(&db, &policy, service.id, last, fixed_now()).await.is_ok());

        let result =
            get_availability(&db, &policy, service.id, last + chrono::Days::new(1), fixed_now()).await;
        assert!(matches!(result, Err(Error::BookingWindowExceeded { days: 30 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_availability_unknown_service() -> Result<()> {
        let db = setup_test_db().await?;
        let result = get_availability(&db, &test_policy(), 404, test_date(), fixed_now()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_availability_reports_blocks_and_limits() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = test_policy();
        let service = create_test_service(&db, "Blow Dry", 30).await?;

        create_blocked_range(
            &db,
            &policy,
            NewBlockedRange {
                starts_at: at(10, 0),
                ends_at: at(11, 0),
                reason: Some("Deep clean".to_string()),
            },
            None,
            fixed_now(),
        )
        .await?;
        create_slot_limit(
            &db,
            &policy,
            NewSlotLimit {
                starts_at: at(16, 0),
                ends_at: at(18, 0),
                max_concurrent: 1,
                reason: None,
            },
            fixed_now(),
        )
        .await?;

        let availability = get_availability(&db, &policy, service.id, test_date(), fixed_now()).await?;
        assert_eq!(availability.blocked_ranges.len(), 1);
        assert!(
            !availability
                .slots
                .iter()
                .any(|s| s.start >= at(9, 45) && s.start < at(11, 0))
        );
        assert!(availability.slots.iter().any(|s| s.start == at(9, 30)));
        Ok(())
    }
}
