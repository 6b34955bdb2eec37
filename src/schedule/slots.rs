//! Slot generation: the availability computation core.
//!
//! The generator walks a cursor across the query window, skipping over
//! occupied intervals, and accepts candidate start instants that pass
//! every business rule. Business rules (working hours, days off,
//! vacations) are evaluated in the provider's home zone; the emitted
//! slots are expressed in the viewer's zone.
//!
//! The stepping granularity is the requested service duration, so
//! accepted slots never overlap and are exactly one duration apart
//! within a free stretch.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use super::types::{DayAvailability, OccupiedInterval, ProviderSchedule, TimeWindow, VacationRange};
use super::vacations;
use crate::clock;

/// Parameters of one availability query.
#[derive(Debug, Clone)]
pub struct SlotQuery {
    /// The calendar day to compute, as seen by the viewer.
    pub day: NaiveDate,
    /// Requested event length in minutes; rounded up to the quantum.
    pub duration_minutes: u32,
    /// The current instant. No slot may start before it.
    pub now: DateTime<Utc>,
    /// The zone slots are surfaced in.
    pub viewer_zone: Tz,
    /// Base granularity quantum in minutes.
    pub quantum_minutes: u32,
}

/// The absolute `[start, end)` window a query spans.
///
/// Starts at the viewer-zone midnight of the day or the quantum-rounded
/// "now", whichever is later; ends at the next viewer-zone midnight. A
/// day entirely in the past produces a degenerate window, which yields
/// zero slots rather than an error.
pub fn query_window(query: &SlotQuery) -> TimeWindow {
    let day_start =
        clock::local_midnight(query.day, query.viewer_zone).with_timezone(&Utc);
    let day_end = clock::local_midnight(query.day + Duration::days(1), query.viewer_zone)
        .with_timezone(&Utc);
    let floor = clock::ceil_to_quantum(query.now, query.quantum_minutes);
    TimeWindow::new(day_start.max(floor), day_end)
}

/// Compute the bookable slots for a day.
///
/// `occupied` must be sorted by start and already scoped to the query
/// window (see [`super::occupancy::collect_occupied`]). `vacations` are
/// the provider's ranges intersecting the day and its neighbors.
pub fn generate_slots(
    schedule: &ProviderSchedule,
    vacation_ranges: &[VacationRange],
    occupied: &[OccupiedInterval],
    query: &SlotQuery,
) -> DayAvailability {
    let is_day_off = schedule.is_day_off(query.day.weekday());
    let is_vacation = vacations::is_vacation(vacation_ranges, query.day);

    let duration_minutes = clock::normalize_duration(query.duration_minutes, query.quantum_minutes);
    let duration = Duration::minutes(duration_minutes as i64);
    let window = query_window(query);

    let mut slots = Vec::new();
    if window.is_degenerate() || duration_minutes == 0 {
        return DayAvailability {
            day: query.day,
            slots,
            is_day_off,
            is_vacation,
        };
    }

    let mut cursor = window.start;
    for interval in occupied {
        if interval.end <= cursor {
            continue;
        }
        while interval.start - cursor >= duration {
            if accepts(schedule, vacation_ranges, query, cursor, duration) {
                slots.push(cursor.with_timezone(&query.viewer_zone));
            }
            cursor += duration;
        }
        cursor = cursor.max(interval.end);
    }
    while window.end - cursor >= duration {
        if accepts(schedule, vacation_ranges, query, cursor, duration) {
            slots.push(cursor.with_timezone(&query.viewer_zone));
        }
        cursor += duration;
    }

    debug!(
        "Computed {} slots for provider {} on {} ({} min events)",
        slots.len(),
        schedule.id,
        query.day,
        duration_minutes
    );

    DayAvailability {
        day: query.day,
        slots,
        is_day_off,
        is_vacation,
    }
}

/// Whether a candidate `[start, start + duration)` is bookable.
fn accepts(
    schedule: &ProviderSchedule,
    vacation_ranges: &[VacationRange],
    query: &SlotQuery,
    start: DateTime<Utc>,
    duration: Duration,
) -> bool {
    // No slots in the past.
    if start < query.now {
        return false;
    }

    // Business rules live on the provider's wall clock.
    let local_start = start.with_timezone(&schedule.home_zone);
    let local_end = (start + duration).with_timezone(&schedule.home_zone);

    if schedule.is_day_off(local_start.weekday()) {
        return false;
    }
    if vacations::is_vacation(vacation_ranges, local_start.date_naive()) {
        return false;
    }

    // The whole slot must sit inside one working day.
    if local_start.date_naive() != local_end.date_naive() {
        return false;
    }
    if local_start.time() < schedule.open || local_end.time() > schedule.close {
        return false;
    }

    // A slot computed near midnight must still belong to the queried
    // day from the viewer's point of view.
    start.with_timezone(&query.viewer_zone).date_naive() == query.day
}
