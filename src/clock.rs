//! Quantum rounding and timezone resolution helpers.
//!
//! All schedule arithmetic happens on two planes: wall-clock times in a
//! provider's home zone (business rules) and absolute instants surfaced
//! in a viewer's zone (display). These helpers keep the crossings between
//! the two explicit.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

/// Round an instant up to the next boundary divisible by `quantum_minutes`.
///
/// Sub-minute precision is dropped; any residue (seconds, misaligned
/// minutes) pushes the result forward, so the output is never earlier
/// than the input. Already-aligned instants are returned unchanged.
pub fn ceil_to_quantum<Z: TimeZone>(instant: DateTime<Z>, quantum_minutes: u32) -> DateTime<Z> {
    let quantum = quantum_minutes.max(1);
    let sub_minute =
        Duration::seconds(instant.second() as i64) + Duration::nanoseconds(instant.nanosecond() as i64);
    let trimmed = instant - sub_minute;

    let rem = trimmed.minute() % quantum;
    if rem == 0 && sub_minute.is_zero() {
        trimmed
    } else if rem == 0 {
        trimmed + Duration::minutes(quantum as i64)
    } else {
        trimmed + Duration::minutes((quantum - rem) as i64)
    }
}

/// Round a duration in minutes up to the next multiple of `quantum`.
pub fn normalize_duration(minutes: u32, quantum: u32) -> u32 {
    let quantum = quantum.max(1);
    minutes.div_ceil(quantum) * quantum
}

/// Resolve a wall-clock time on a calendar day in a zone to an instant.
///
/// On a DST gap the time does not exist; the first valid instant after it
/// is used. On a fold the earlier of the two instants is used.
pub fn resolve_local(day: NaiveDate, time: NaiveTime, zone: Tz) -> DateTime<Tz> {
    let mut naive = day.and_time(time);
    // Probe across a full day: DST gaps are an hour, but date-line
    // changes have skipped an entire calendar day (Pacific/Apia, 2011).
    for _ in 0..96 {
        match zone.from_local_datetime(&naive) {
            LocalResult::Single(instant) => return instant,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => naive += Duration::minutes(15),
        }
    }
    // Unreachable with valid tz data; no gap exceeds 24 hours.
    zone.from_utc_datetime(&day.and_time(time))
}

/// Local midnight of a calendar day in a zone.
pub fn local_midnight(day: NaiveDate, zone: Tz) -> DateTime<Tz> {
    resolve_local(day, NaiveTime::MIN, zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, s).unwrap()
    }

    #[test]
    fn test_ceil_rounds_misaligned_minutes_up() {
        assert_eq!(ceil_to_quantum(utc(10, 3, 0), 15), utc(10, 15, 0));
        assert_eq!(ceil_to_quantum(utc(10, 16, 0), 15), utc(10, 30, 0));
    }

    #[test]
    fn test_ceil_keeps_aligned_instants() {
        assert_eq!(ceil_to_quantum(utc(10, 45, 0), 15), utc(10, 45, 0));
        assert_eq!(ceil_to_quantum(utc(0, 0, 0), 15), utc(0, 0, 0));
    }

    #[test]
    fn test_ceil_seconds_push_forward() {
        assert_eq!(ceil_to_quantum(utc(10, 15, 30), 15), utc(10, 30, 0));
        assert_eq!(ceil_to_quantum(utc(10, 14, 59), 15), utc(10, 15, 0));
    }

    #[test]
    fn test_ceil_crosses_hour_boundary() {
        assert_eq!(ceil_to_quantum(utc(9, 50, 0), 15), utc(10, 0, 0));
    }

    #[test]
    fn test_normalize_duration() {
        assert_eq!(normalize_duration(15, 15), 15);
        assert_eq!(normalize_duration(16, 15), 30);
        assert_eq!(normalize_duration(40, 15), 45);
        assert_eq!(normalize_duration(0, 15), 0);
    }

    #[test]
    fn test_local_midnight_plain_day() {
        let kyiv = chrono_tz::Europe::Kyiv;
        let midnight = local_midnight(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), kyiv);
        assert_eq!(midnight.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_resolve_local_skipped_calendar_day() {
        // Samoa skipped 2011-12-30 entirely when crossing the date line;
        // the first valid instant is midnight on the 31st.
        let apia = chrono_tz::Pacific::Apia;
        let day = NaiveDate::from_ymd_opt(2011, 12, 30).unwrap();
        let resolved = resolve_local(day, NaiveTime::from_hms_opt(12, 0, 0).unwrap(), apia);
        assert_eq!(
            resolved.date_naive(),
            NaiveDate::from_ymd_opt(2011, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_resolve_local_dst_gap() {
        // 2024-03-31 03:00 does not exist in Kyiv (clocks jump 03:00 -> 04:00).
        let kyiv = chrono_tz::Europe::Kyiv;
        let day = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let resolved = resolve_local(day, NaiveTime::from_hms_opt(3, 30, 0).unwrap(), kyiv);
        assert_eq!(resolved.date_naive(), day);
        assert!(resolved.time() >= NaiveTime::from_hms_opt(4, 0, 0).unwrap());
    }
}
