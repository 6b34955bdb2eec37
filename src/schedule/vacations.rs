//! Day-off and vacation range mutations.
//!
//! Vacation ranges are kept sorted, non-overlapping, and non-adjacent;
//! both mutations preserve that invariant on every call. These are pure
//! functions over the range list; the engine applies them under a
//! per-provider lock and writes the full set back.

use chrono::NaiveDate;

use super::types::VacationRange;

/// Mark a day as vacation.
///
/// A day already covered by a range is a no-op. A day bridging two
/// ranges merges them; a day touching one range extends it; otherwise a
/// new single-day range is created.
pub fn add_day_off(ranges: &mut Vec<VacationRange>, day: NaiveDate) {
    if ranges.iter().any(|r| r.contains(day)) {
        return;
    }

    let before = day
        .pred_opt()
        .and_then(|prev| ranges.iter().position(|r| r.end_date == prev));
    let after = day
        .succ_opt()
        .and_then(|next| ranges.iter().position(|r| r.start_date == next));

    match (before, after) {
        (Some(b), Some(a)) => {
            ranges[b].end_date = ranges[a].end_date;
            ranges.remove(a);
        }
        (Some(b), None) => ranges[b].end_date = day,
        (None, Some(a)) => ranges[a].start_date = day,
        (None, None) => ranges.push(VacationRange::single(day)),
    }
    ranges.sort_by_key(|r| r.start_date);
}

/// Unmark a vacation day.
///
/// A day outside every range is a no-op. A single-day range is deleted;
/// a boundary day shrinks its range; an interior day splits the range in
/// two.
pub fn remove_day_off(ranges: &mut Vec<VacationRange>, day: NaiveDate) {
    let Some(idx) = ranges.iter().position(|r| r.contains(day)) else {
        return;
    };
    let range = ranges[idx];

    if range.start_date == day && range.end_date == day {
        ranges.remove(idx);
    } else if range.start_date == day {
        if let Some(next) = day.succ_opt() {
            ranges[idx].start_date = next;
        }
    } else if range.end_date == day {
        if let Some(prev) = day.pred_opt() {
            ranges[idx].end_date = prev;
        }
    } else if let (Some(prev), Some(next)) = (day.pred_opt(), day.succ_opt()) {
        ranges[idx].end_date = prev;
        ranges.insert(idx + 1, VacationRange::new(next, range.end_date));
    }
}

/// Whether a day falls inside any of the ranges.
pub fn is_vacation(ranges: &[VacationRange], day: NaiveDate) -> bool {
    ranges.iter().any(|r| r.contains(day))
}
