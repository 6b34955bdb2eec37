//! Occupied-interval collection.
//!
//! Gathers everything on a day that cannot be booked: active
//! reservations, breaks, and the provider's lunch window. The lunch is
//! materialized for the day before, the day itself, and the day after,
//! so a viewer whose zone shifts the lunch across midnight still sees it
//! excluded.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::types::{
    BreakSpan, IntervalKind, OccupiedInterval, ProviderSchedule, Reservation, TimeWindow,
};
use crate::clock;

/// Collect the sorted occupied intervals for a query window.
///
/// `day` is the calendar date the window was derived from, in the
/// viewer's reference frame; it anchors the lunch materialization.
/// Reservations are expected pre-filtered to the provider/client scope;
/// canceled ones are dropped here.
pub fn collect_occupied(
    schedule: &ProviderSchedule,
    day: NaiveDate,
    window: &TimeWindow,
    reservations: &[Reservation],
    breaks: &[BreakSpan],
) -> Vec<OccupiedInterval> {
    let mut occupied: Vec<OccupiedInterval> = Vec::new();

    for reservation in reservations.iter().filter(|r| r.is_active()) {
        push_if_overlapping(
            &mut occupied,
            reservation.start,
            reservation.end,
            IntervalKind::Reservation,
            window,
        );
    }

    for span in breaks {
        push_if_overlapping(&mut occupied, span.start, span.end, IntervalKind::Break, window);
    }

    if let Some(lunch) = &schedule.lunch {
        for offset in -1..=1i64 {
            let lunch_day = day + Duration::days(offset);
            let start = clock::resolve_local(lunch_day, lunch.start, schedule.home_zone)
                .with_timezone(&Utc);
            let end =
                clock::resolve_local(lunch_day, lunch.end, schedule.home_zone).with_timezone(&Utc);
            push_if_overlapping(&mut occupied, start, end, IntervalKind::Lunch, window);
        }
    }

    occupied.sort_by_key(|interval| interval.start);
    occupied
}

fn push_if_overlapping(
    occupied: &mut Vec<OccupiedInterval>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kind: IntervalKind,
    window: &TimeWindow,
) {
    let interval = OccupiedInterval::new(start, end, kind);
    if interval.overlaps(window) {
        occupied.push(interval);
    }
}
