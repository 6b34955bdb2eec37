//! Core scheduling types: providers, services, reservations, breaks,
//! vacations, and the value types the availability engine produces.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::config::DEFAULT_QUANTUM_MINUTES;
use crate::error::{Result, SchedulingError};

// ============================================================================
// Provider Schedule
// ============================================================================

/// A provider's recurring working configuration.
///
/// Open/close and lunch times are wall-clock values in the provider's
/// home zone; they are projected onto concrete days during slot
/// computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSchedule {
    /// Unique identifier for the provider.
    pub id: String,
    /// IANA zone the wall-clock fields are defined in.
    pub home_zone: Tz,
    /// Daily opening time.
    pub open: NaiveTime,
    /// Daily closing time.
    pub close: NaiveTime,
    /// Optional daily lunch window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunch: Option<LunchWindow>,
    /// Recurring weekly days off.
    #[serde(default)]
    pub days_off: Vec<Weekday>,
    /// Configured slot size in minutes. Kept as schedule metadata and as
    /// the default break duration; slot stepping uses the requested
    /// service duration.
    pub slot_minutes: u32,
    /// Currency code for the provider's prices. Irrelevant to the
    /// availability computation.
    pub currency: String,
    /// When the schedule was created.
    pub created_at: DateTime<Utc>,
}

/// A daily lunch window, wall-clock in the provider's home zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LunchWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ProviderSchedule {
    /// Create a schedule with the given working hours, no lunch, and
    /// the weekend as the recurring days off.
    pub fn new(home_zone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            home_zone,
            open,
            close,
            lunch: None,
            days_off: vec![Weekday::Sat, Weekday::Sun],
            slot_minutes: DEFAULT_QUANTUM_MINUTES,
            currency: "UAH".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Create a schedule with a specific ID.
    pub fn with_id(id: impl Into<String>, home_zone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            id: id.into(),
            ..Self::new(home_zone, open, close)
        }
    }

    /// Set the lunch window.
    pub fn with_lunch(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.lunch = Some(LunchWindow { start, end });
        self
    }

    /// Set the recurring days off.
    pub fn with_days_off(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days_off = days.into_iter().collect();
        self
    }

    /// Set the configured slot size.
    pub fn with_slot_minutes(mut self, minutes: u32) -> Self {
        self.slot_minutes = minutes;
        self
    }

    /// Set the currency code.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Check the schedule invariants: open < close, and any lunch window
    /// satisfies open <= lunch.start < lunch.end <= close.
    pub fn validate(&self) -> Result<()> {
        if self.open >= self.close {
            return Err(SchedulingError::InvalidSchedule(format!(
                "open time {} must precede close time {}",
                self.open, self.close
            ))
            .into());
        }
        if let Some(lunch) = &self.lunch {
            if lunch.start >= lunch.end || lunch.start < self.open || lunch.end > self.close {
                return Err(SchedulingError::InvalidSchedule(format!(
                    "lunch window {}..{} must lie within working hours {}..{}",
                    lunch.start, lunch.end, self.open, self.close
                ))
                .into());
            }
        }
        if self.slot_minutes == 0 {
            return Err(
                SchedulingError::InvalidSchedule("slot size must be positive".into()).into(),
            );
        }
        Ok(())
    }

    /// Whether a weekday is a recurring day off.
    pub fn is_day_off(&self, weekday: Weekday) -> bool {
        self.days_off.contains(&weekday)
    }
}

/// Typed partial update for the mutable schedule fields.
///
/// Applying an update never bypasses validation: the store re-checks the
/// resulting schedule before accepting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<NaiveTime>,
    /// `Some(None)` clears the lunch window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunch: Option<Option<LunchWindow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_off: Option<Vec<Weekday>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_minutes: Option<u32>,
}

impl ScheduleUpdate {
    /// Apply the update to a schedule in place.
    pub fn apply_to(&self, schedule: &mut ProviderSchedule) {
        if let Some(open) = self.open {
            schedule.open = open;
        }
        if let Some(close) = self.close {
            schedule.close = close;
        }
        if let Some(lunch) = &self.lunch {
            schedule.lunch = *lunch;
        }
        if let Some(days_off) = &self.days_off {
            schedule.days_off = days_off.clone();
        }
        if let Some(slot_minutes) = self.slot_minutes {
            schedule.slot_minutes = slot_minutes;
        }
    }
}

// ============================================================================
// Services
// ============================================================================

/// A bookable service with a fixed duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Unique identifier for the service.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Duration in minutes, always a multiple of the base quantum.
    pub duration_minutes: u32,
    /// Whether the service can currently be booked.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Service {
    /// Create a service, rounding the duration up to the next quantum.
    pub fn new(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            duration_minutes: clock::normalize_duration(duration_minutes, DEFAULT_QUANTUM_MINUTES),
            is_active: true,
        }
    }

    /// The service duration as a chrono `Duration`.
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes as i64)
    }
}

// ============================================================================
// Reservations and Breaks
// ============================================================================

/// A booked appointment occupying a provider's time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier for the reservation.
    pub id: String,
    /// The provider whose time is occupied.
    pub provider_id: String,
    /// The booking client. `None` for provider-entered walk-ins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// The booked service, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant, always start + service duration.
    pub end: DateTime<Utc>,
    /// Whether the reservation has been canceled. Terminal; a canceled
    /// reservation does not occupy time.
    #[serde(default)]
    pub canceled: bool,
    /// When the reservation was created.
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Create a reservation; the end instant is derived from the
    /// duration here, before the value is ever stored.
    pub fn new(
        provider_id: impl Into<String>,
        client_id: Option<String>,
        service_id: Option<String>,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.into(),
            client_id,
            service_id,
            start,
            end: start + Duration::minutes(duration_minutes as i64),
            canceled: false,
            created_at: Utc::now(),
        }
    }

    /// Whether the reservation still occupies time.
    pub fn is_active(&self) -> bool {
        !self.canceled
    }

    /// Derived view: the reservation ended before `now` without being
    /// canceled. Not a stored state.
    pub fn is_completed(&self, now: DateTime<Utc>) -> bool {
        !self.canceled && self.end < now
    }

    /// The calendar date of the start instant in a zone.
    pub fn start_date_in(&self, zone: Tz) -> NaiveDate {
        self.start.with_timezone(&zone).date_naive()
    }
}

/// A provider-only occupied interval with no client or service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakSpan {
    /// Unique identifier for the break.
    pub id: String,
    /// The provider taking the break.
    pub provider_id: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
}

impl BreakSpan {
    /// Create a break of the given duration.
    pub fn new(provider_id: impl Into<String>, start: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.into(),
            start,
            end: start + Duration::minutes(duration_minutes as i64),
        }
    }
}

// ============================================================================
// Vacations
// ============================================================================

/// An inclusive date range during which a provider is unavailable.
///
/// The ranges stored for one provider are kept non-overlapping and
/// non-adjacent; adjacent ranges are merged on mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl VacationRange {
    /// A single-day range.
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start_date: day,
            end_date: day,
        }
    }

    /// A multi-day range. `start_date` must not follow `end_date`.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        debug_assert!(start_date <= end_date);
        Self {
            start_date,
            end_date,
        }
    }

    /// Whether the range contains a day.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    /// Whether the range intersects an inclusive date interval.
    pub fn intersects(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && self.end_date >= from
    }
}

// ============================================================================
// Occupied Intervals
// ============================================================================

/// A span of absolute time that cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: IntervalKind,
}

/// Why an interval is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    Reservation,
    Break,
    Lunch,
}

impl OccupiedInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, kind: IntervalKind) -> Self {
        Self { start, end, kind }
    }

    /// Half-open, strict overlap against a `[start, end)` window.
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        self.start < window.end && self.end > window.start
    }
}

/// A half-open `[start, end)` window of absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A window containing nothing. Slot computation treats such a
    /// window as "zero slots", never as an error.
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }
}

// ============================================================================
// Engine Outputs
// ============================================================================

/// The availability computed for one calendar day.
///
/// Slots are bookable start instants in the viewer's zone, each
/// implicitly paired with the requested duration. The two flags are
/// informational: a fully booked working day has zero slots with both
/// flags false.
#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    /// The queried calendar day, as seen by the viewer.
    pub day: NaiveDate,
    /// Bookable start instants in the viewer's zone, strictly
    /// increasing, spaced at least one duration apart.
    pub slots: Vec<DateTime<Tz>>,
    /// The date falls on a recurring day off (provider zone).
    pub is_day_off: bool,
    /// The date falls inside a vacation range (provider zone).
    pub is_vacation: bool,
}

/// Classification of a calendar day for the week overview.
///
/// Variants are listed in display precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayClassification {
    /// At least one active reservation starts on the day.
    Booked,
    /// Recurring weekly day off.
    DayOff,
    /// Inside a vacation range.
    Vacation,
    /// Nothing scheduled.
    Open,
}

impl DayClassification {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DayClassification::Booked => "Booked",
            DayClassification::DayOff => "Day off",
            DayClassification::Vacation => "Vacation",
            DayClassification::Open => "Open",
        }
    }
}

/// One entry of the 7-day overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekDaySummary {
    pub date: NaiveDate,
    pub classification: DayClassification,
}

/// Exception data for a provider over a date range, as supplied by the
/// store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleExceptions {
    /// Vacation ranges intersecting the queried range, sorted by start.
    pub vacations: Vec<VacationRange>,
    /// Recurring weekly days off.
    pub days_off: Vec<Weekday>,
    /// The provider's lunch window, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunch: Option<LunchWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_schedule_validation() {
        let schedule = ProviderSchedule::new(chrono_tz::Europe::Kyiv, t(9, 0), t(18, 0));
        assert!(schedule.validate().is_ok());

        let inverted = ProviderSchedule::new(chrono_tz::Europe::Kyiv, t(18, 0), t(9, 0));
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_lunch_must_fit_working_hours() {
        let base = ProviderSchedule::new(chrono_tz::Europe::Kyiv, t(9, 0), t(18, 0));

        assert!(base.clone().with_lunch(t(13, 0), t(14, 0)).validate().is_ok());
        assert!(base.clone().with_lunch(t(8, 0), t(9, 30)).validate().is_err());
        assert!(base.clone().with_lunch(t(17, 30), t(18, 30)).validate().is_err());
        assert!(base.with_lunch(t(14, 0), t(13, 0)).validate().is_err());
    }

    #[test]
    fn test_schedule_update_applies_and_clears_lunch() {
        let mut schedule = ProviderSchedule::new(chrono_tz::Europe::Kyiv, t(9, 0), t(18, 0))
            .with_lunch(t(13, 0), t(14, 0));

        let update = ScheduleUpdate {
            close: Some(t(17, 0)),
            lunch: Some(None),
            days_off: Some(vec![Weekday::Sun]),
            ..Default::default()
        };
        update.apply_to(&mut schedule);

        assert_eq!(schedule.close, t(17, 0));
        assert!(schedule.lunch.is_none());
        assert!(schedule.is_day_off(Weekday::Sun));
        assert!(!schedule.is_day_off(Weekday::Mon));
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn test_service_duration_rounds_up() {
        assert_eq!(Service::new("Haircut", 40).duration_minutes, 45);
        assert_eq!(Service::new("Trim", 30).duration_minutes, 30);
    }

    #[test]
    fn test_reservation_derives_end() {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let reservation = Reservation::new("p1", Some("c1".into()), None, start, 30);
        assert_eq!(reservation.end - reservation.start, Duration::minutes(30));
        assert!(reservation.is_active());
        assert!(reservation.is_completed(start + Duration::hours(1)));
    }

    #[test]
    fn test_overlap_rule_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let end = start + Duration::minutes(30);
        let interval = OccupiedInterval::new(start, end, IntervalKind::Reservation);

        // Touching windows do not overlap.
        assert!(!interval.overlaps(&TimeWindow::new(end, end + Duration::hours(1))));
        assert!(!interval.overlaps(&TimeWindow::new(start - Duration::hours(1), start)));
        // One shared minute does.
        assert!(interval.overlaps(&TimeWindow::new(
            end - Duration::minutes(1),
            end + Duration::hours(1)
        )));
    }

    #[test]
    fn test_vacation_range_contains() {
        let range = VacationRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        );
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 6, 4).unwrap()));
    }
}
