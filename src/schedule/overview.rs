//! Week overview: a 7-day classification glance for day pickers.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};

use super::types::{DayClassification, ProviderSchedule, VacationRange, WeekDaySummary};
use super::vacations;

/// Classify 7 consecutive days starting at `start`.
///
/// `reservation_dates` holds the provider-zone dates on which at least
/// one active reservation starts. Precedence: booked, then recurring
/// day off, then vacation, then open.
pub fn build_week_overview(
    schedule: &ProviderSchedule,
    vacation_ranges: &[VacationRange],
    reservation_dates: &HashSet<NaiveDate>,
    start: NaiveDate,
) -> Vec<WeekDaySummary> {
    (0..7)
        .map(|i| {
            let date = start + Duration::days(i);
            let classification = if reservation_dates.contains(&date) {
                DayClassification::Booked
            } else if schedule.is_day_off(date.weekday()) {
                DayClassification::DayOff
            } else if vacations::is_vacation(vacation_ranges, date) {
                DayClassification::Vacation
            } else {
                DayClassification::Open
            };
            WeekDaySummary {
                date,
                classification,
            }
        })
        .collect()
}
