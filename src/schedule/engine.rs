//! Booking engine: the high-level API over a [`ScheduleStore`].
//!
//! The engine owns no scheduling rules of its own; it wires store
//! fetches into the pure computation layer (occupancy collection, slot
//! generation, week overviews, vacation set mutation) and funnels all
//! bookings through the store's atomic overlap rejection.
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                 BookingEngine                  │
//! │  fetch ──> collect_occupied ──> generate_slots │
//! └──────┬─────────────────────────────────────────┘
//!        │
//! ┌──────▼───────┐
//! │ScheduleStore │  conflict rejection, persistence
//! └──────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Result, SchedulingError};

use super::occupancy;
use super::overview;
use super::slots::{self, SlotQuery};
use super::store::ScheduleStore;
use super::types::{
    BreakSpan, DayAvailability, OccupiedInterval, ProviderSchedule, Reservation, TimeWindow,
    VacationRange, WeekDaySummary,
};
use super::vacations;

/// High-level booking API generic over the storage backend.
pub struct BookingEngine<S: ScheduleStore> {
    store: Arc<S>,
    config: EngineConfig,
    /// Per-provider mutation locks, created lazily. Vacation edits are
    /// read-modify-write over the full range set and must not
    /// interleave for the same provider.
    provider_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<S: ScheduleStore> BookingEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            provider_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, EngineConfig::default())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register a provider schedule, filling slot size and currency
    /// from the configured defaults.
    pub async fn register_provider(
        &self,
        home_zone: Tz,
        open: NaiveTime,
        close: NaiveTime,
    ) -> Result<ProviderSchedule> {
        let defaults = &self.config.provider_defaults;
        let schedule = ProviderSchedule::new(home_zone, open, close)
            .with_slot_minutes(defaults.slot_minutes)
            .with_currency(defaults.currency.clone());
        self.store.create_provider(schedule).await
    }

    async fn provider_lock(&self, provider_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.provider_locks.lock().await;
        locks
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    // ========================================================================
    // Availability
    // ========================================================================

    /// Bookable slots for a calendar day as the viewer sees it.
    ///
    /// When `client_id` is given, the client's own reservations with any
    /// provider also count as occupied time.
    pub async fn available_slots(
        &self,
        provider_id: &str,
        client_id: Option<&str>,
        day: NaiveDate,
        duration_minutes: u32,
        viewer_zone: Tz,
    ) -> Result<DayAvailability> {
        self.available_slots_at(provider_id, client_id, day, duration_minutes, viewer_zone, Utc::now())
            .await
    }

    /// [`Self::available_slots`] with an explicit "now" instant.
    pub async fn available_slots_at(
        &self,
        provider_id: &str,
        client_id: Option<&str>,
        day: NaiveDate,
        duration_minutes: u32,
        viewer_zone: Tz,
        now: DateTime<Utc>,
    ) -> Result<DayAvailability> {
        let schedule = self.store.provider_schedule(provider_id).await?;
        let exceptions = self
            .store
            .fetch_exceptions(
                provider_id,
                day - Duration::days(1),
                day + Duration::days(1),
            )
            .await?;

        let query = SlotQuery {
            day,
            duration_minutes,
            now,
            viewer_zone,
            quantum_minutes: self.config.quantum_minutes,
        };
        let window = slots::query_window(&query);
        if window.is_degenerate() {
            return Ok(slots::generate_slots(&schedule, &exceptions.vacations, &[], &query));
        }

        let reservations = self
            .store
            .fetch_reservations(provider_id, client_id, &window)
            .await?;
        let breaks = self.store.fetch_breaks(provider_id, &window).await?;
        let occupied =
            occupancy::collect_occupied(&schedule, day, &window, &reservations, &breaks);

        Ok(slots::generate_slots(
            &schedule,
            &exceptions.vacations,
            &occupied,
            &query,
        ))
    }

    /// Slots for a named service, `offset_days` from today in the
    /// viewer's zone. The service defines the event duration.
    pub async fn available_slots_for_service(
        &self,
        provider_id: &str,
        client_id: Option<&str>,
        service_id: &str,
        offset_days: i64,
        viewer_zone: Tz,
    ) -> Result<DayAvailability> {
        let service = self.store.service(service_id).await?;
        let now = Utc::now();
        let day = now.with_timezone(&viewer_zone).date_naive() + Duration::days(offset_days);
        self.available_slots_at(
            provider_id,
            client_id,
            day,
            service.duration_minutes,
            viewer_zone,
            now,
        )
        .await
    }

    /// Slots a provider can claim for a break, in their own home zone.
    pub async fn available_break_slots(
        &self,
        provider_id: &str,
        offset_days: i64,
        duration_minutes: u32,
    ) -> Result<DayAvailability> {
        let schedule = self.store.provider_schedule(provider_id).await?;
        let now = Utc::now();
        let day = now.with_timezone(&schedule.home_zone).date_naive() + Duration::days(offset_days);
        self.available_slots_at(
            provider_id,
            None,
            day,
            duration_minutes,
            schedule.home_zone,
            now,
        )
        .await
    }

    /// Everything occupying a provider's day as the viewer sees it,
    /// sorted by start. Canceled reservations are excluded.
    pub async fn day_events(
        &self,
        provider_id: &str,
        client_id: Option<&str>,
        day: NaiveDate,
        viewer_zone: Tz,
    ) -> Result<Vec<OccupiedInterval>> {
        let schedule = self.store.provider_schedule(provider_id).await?;
        let start = crate::clock::local_midnight(day, viewer_zone).with_timezone(&Utc);
        let end = crate::clock::local_midnight(day + Duration::days(1), viewer_zone)
            .with_timezone(&Utc);
        let window = TimeWindow::new(start, end);

        let reservations = self
            .store
            .fetch_reservations(provider_id, client_id, &window)
            .await?;
        let breaks = self.store.fetch_breaks(provider_id, &window).await?;
        Ok(occupancy::collect_occupied(
            &schedule,
            day,
            &window,
            &reservations,
            &breaks,
        ))
    }

    // ========================================================================
    // Week Overview
    // ========================================================================

    /// Seven-day overview starting `offset_days` from today in the
    /// provider's home zone.
    pub async fn week_overview(
        &self,
        provider_id: &str,
        offset_days: i64,
    ) -> Result<Vec<WeekDaySummary>> {
        self.week_overview_at(provider_id, offset_days, Utc::now())
            .await
    }

    /// [`Self::week_overview`] with an explicit "now" instant.
    pub async fn week_overview_at(
        &self,
        provider_id: &str,
        offset_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WeekDaySummary>> {
        if offset_days.abs() > self.config.max_overview_offset_days {
            return Err(SchedulingError::InvalidSchedule(format!(
                "overview offset {} exceeds the configured maximum of {} days",
                offset_days, self.config.max_overview_offset_days
            ))
            .into());
        }

        let schedule = self.store.provider_schedule(provider_id).await?;
        let start =
            now.with_timezone(&schedule.home_zone).date_naive() + Duration::days(offset_days);
        let vacation_ranges = self.store.vacation_ranges(provider_id).await?;

        let window = TimeWindow::new(
            crate::clock::local_midnight(start, schedule.home_zone).with_timezone(&Utc),
            crate::clock::local_midnight(start + Duration::days(7), schedule.home_zone)
                .with_timezone(&Utc),
        );
        let reservation_dates: HashSet<NaiveDate> = self
            .store
            .fetch_reservations(provider_id, None, &window)
            .await?
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.start_date_in(schedule.home_zone))
            .collect();

        Ok(overview::build_week_overview(
            &schedule,
            &vacation_ranges,
            &reservation_dates,
            start,
        ))
    }

    // ========================================================================
    // Booking
    // ========================================================================

    /// Book a service at a chosen start instant. The duration comes
    /// from the service; overlap rejection happens in the store.
    pub async fn book_reservation(
        &self,
        provider_id: &str,
        client_id: Option<String>,
        service_id: &str,
        start: DateTime<Utc>,
    ) -> Result<Reservation> {
        let service = self.store.service(service_id).await?;
        // Existence check up front so a ghost provider fails as such
        // instead of as a conflict probe.
        self.store.provider_schedule(provider_id).await?;
        let reservation = Reservation::new(
            provider_id,
            client_id,
            Some(service.id.clone()),
            start,
            service.duration_minutes,
        );
        let reservation = self.store.persist_reservation(reservation).await?;
        debug!(
            "Booked reservation {} ({} at {})",
            reservation.id, service.name, reservation.start
        );
        Ok(reservation)
    }

    /// Block out provider time as a break. Without an explicit
    /// duration the provider's configured slot size is used.
    pub async fn book_break(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        duration_minutes: Option<u32>,
    ) -> Result<BreakSpan> {
        let minutes = match duration_minutes {
            Some(minutes) => minutes,
            None => self.store.provider_schedule(provider_id).await?.slot_minutes,
        };
        let minutes = crate::clock::normalize_duration(minutes, self.config.quantum_minutes);
        if minutes == 0 {
            return Err(
                SchedulingError::InvalidSchedule("break duration must be positive".into()).into(),
            );
        }
        let span = BreakSpan::new(provider_id, start, minutes);
        self.store.persist_break(span).await
    }

    /// Cancel a reservation. The slot becomes bookable again; the
    /// record itself survives for history.
    pub async fn cancel_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        self.store.cancel_reservation(reservation_id).await
    }

    /// Remove a break entirely.
    pub async fn cancel_break(&self, provider_id: &str, break_id: &str) -> Result<()> {
        self.store.cancel_break(provider_id, break_id).await
    }

    // ========================================================================
    // Vacations
    // ========================================================================

    /// Add a single day to the provider's vacation set, merging with
    /// adjacent ranges. Idempotent.
    pub async fn add_day_off(&self, provider_id: &str, day: NaiveDate) -> Result<Vec<VacationRange>> {
        let lock = self.provider_lock(provider_id).await;
        let _guard = lock.lock().await;

        let mut ranges = self.store.vacation_ranges(provider_id).await?;
        vacations::add_day_off(&mut ranges, day);
        self.store
            .persist_vacation_ranges(provider_id, ranges.clone())
            .await?;
        debug!("Provider {} now has {} vacation ranges", provider_id, ranges.len());
        Ok(ranges)
    }

    /// Remove a single day from the vacation set, splitting a range if
    /// the day is interior. Idempotent.
    pub async fn remove_day_off(
        &self,
        provider_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<VacationRange>> {
        let lock = self.provider_lock(provider_id).await;
        let _guard = lock.lock().await;

        let mut ranges = self.store.vacation_ranges(provider_id).await?;
        vacations::remove_day_off(&mut ranges, day);
        self.store
            .persist_vacation_ranges(provider_id, ranges.clone())
            .await?;
        Ok(ranges)
    }

    /// Vacation ranges that have not fully elapsed, judged against
    /// today in the provider's home zone.
    pub async fn upcoming_vacations(&self, provider_id: &str) -> Result<Vec<VacationRange>> {
        let schedule = self.store.provider_schedule(provider_id).await?;
        let today = Utc::now().with_timezone(&schedule.home_zone).date_naive();
        let ranges = self.store.vacation_ranges(provider_id).await?;
        Ok(ranges
            .into_iter()
            .filter(|r| r.end_date >= today)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimegridError;
    use crate::schedule::store::EmbeddedScheduleStore;
    use crate::schedule::types::{DayClassification, IntervalKind, ProviderSchedule, Service};
    use chrono::{NaiveTime, TimeZone};
    use chrono_tz::UTC;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    async fn engine_with_provider() -> (BookingEngine<EmbeddedScheduleStore>, Service) {
        let store = Arc::new(EmbeddedScheduleStore::new());
        let schedule = ProviderSchedule::with_id("p1", UTC, t(9, 0), t(18, 0));
        store.create_provider(schedule).await.unwrap();
        let service = store
            .create_service(Service::new("haircut", 30))
            .await
            .unwrap();
        (BookingEngine::with_defaults(store), service)
    }

    #[tokio::test]
    async fn test_booking_removes_the_slot() {
        let (engine, service) = engine_with_provider().await;
        let day = d(2030, 6, 3);
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 8, 0, 0).unwrap();

        let before = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(before.slots.len(), 18);

        let start = Utc.with_ymd_and_hms(2030, 6, 3, 10, 0, 0).unwrap();
        engine
            .book_reservation("p1", Some("c1".into()), &service.id, start)
            .await
            .unwrap();

        let after = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(after.slots.len(), 17);
        assert!(!after
            .slots
            .iter()
            .any(|s| s.with_timezone(&Utc) == start));
    }

    #[tokio::test]
    async fn test_cancellation_restores_the_slot() {
        let (engine, service) = engine_with_provider().await;
        let day = d(2030, 6, 3);
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 8, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2030, 6, 3, 10, 0, 0).unwrap();

        let reservation = engine
            .book_reservation("p1", Some("c1".into()), &service.id, start)
            .await
            .unwrap();
        engine.cancel_reservation(&reservation.id).await.unwrap();

        let availability = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(availability.slots.len(), 18);
    }

    #[tokio::test]
    async fn test_client_busy_elsewhere_loses_the_slot() {
        let (engine, service) = engine_with_provider().await;
        let store = Arc::clone(engine.store());
        store
            .create_provider(ProviderSchedule::with_id("p2", UTC, t(9, 0), t(18, 0)))
            .await
            .unwrap();

        let start = Utc.with_ymd_and_hms(2030, 6, 3, 10, 0, 0).unwrap();
        engine
            .book_reservation("p2", Some("c1".into()), &service.id, start)
            .await
            .unwrap();

        let day = d(2030, 6, 3);
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 8, 0, 0).unwrap();
        let for_client = engine
            .available_slots_at("p1", Some("c1"), day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(for_client.slots.len(), 17);

        // Another client still sees p1 fully open.
        let for_other = engine
            .available_slots_at("p1", Some("c2"), day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(for_other.slots.len(), 18);
    }

    #[tokio::test]
    async fn test_day_off_round_trip() {
        let (engine, _) = engine_with_provider().await;
        let day = d(2030, 7, 10);

        engine.add_day_off("p1", day).await.unwrap();
        let now = Utc.with_ymd_and_hms(2030, 7, 1, 8, 0, 0).unwrap();
        let availability = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert!(availability.is_vacation);
        assert!(availability.slots.is_empty());

        engine.remove_day_off("p1", day).await.unwrap();
        let availability = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert!(!availability.is_vacation);
        assert_eq!(availability.slots.len(), 18);
    }

    #[tokio::test]
    async fn test_break_blocks_availability_until_canceled() {
        let (engine, _) = engine_with_provider().await;
        let day = d(2030, 6, 3);
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 8, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap();

        let span = engine.book_break("p1", start, Some(60)).await.unwrap();
        let availability = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(availability.slots.len(), 16);

        engine.cancel_break("p1", &span.id).await.unwrap();
        let availability = engine
            .available_slots_at("p1", None, day, 30, UTC, now)
            .await
            .unwrap();
        assert_eq!(availability.slots.len(), 18);
    }

    #[tokio::test]
    async fn test_week_overview_reflects_bookings_and_vacations() {
        let (engine, service) = engine_with_provider().await;
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 8, 0, 0).unwrap();

        let start = Utc.with_ymd_and_hms(2030, 6, 4, 10, 0, 0).unwrap();
        engine
            .book_reservation("p1", Some("c1".into()), &service.id, start)
            .await
            .unwrap();
        engine.add_day_off("p1", d(2030, 6, 5)).await.unwrap();

        let summaries = engine.week_overview_at("p1", 0, now).await.unwrap();
        assert_eq!(summaries.len(), 7);
        assert_eq!(summaries[0].date, d(2030, 6, 3));
        assert_eq!(summaries[1].classification, DayClassification::Booked);
        assert_eq!(summaries[2].classification, DayClassification::Vacation);
        assert_eq!(summaries[0].classification, DayClassification::Open);
    }

    #[tokio::test]
    async fn test_week_overview_offset_bounds() {
        let (engine, _) = engine_with_provider().await;
        let result = engine.week_overview_at("p1", 10_000, Utc::now()).await;
        assert!(matches!(
            result,
            Err(TimegridError::Scheduling(SchedulingError::InvalidSchedule(_)))
        ));
    }

    #[tokio::test]
    async fn test_day_events_sorted_and_typed() {
        let (engine, service) = engine_with_provider().await;
        let day = d(2030, 6, 3);

        engine
            .book_break(
                "p1",
                Utc.with_ymd_and_hms(2030, 6, 3, 14, 0, 0).unwrap(),
                Some(30),
            )
            .await
            .unwrap();
        engine
            .book_reservation(
                "p1",
                Some("c1".into()),
                &service.id,
                Utc.with_ymd_and_hms(2030, 6, 3, 10, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        let events = engine.day_events("p1", None, day, UTC).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, IntervalKind::Reservation);
        assert_eq!(events[1].kind, IntervalKind::Break);
        assert!(events[0].start < events[1].start);
    }

    #[tokio::test]
    async fn test_registered_provider_carries_configured_defaults() {
        let store = Arc::new(EmbeddedScheduleStore::new());
        let mut config = EngineConfig::default();
        config.provider_defaults.slot_minutes = 30;
        config.provider_defaults.currency = "EUR".to_string();
        let engine = BookingEngine::new(store, config);

        let schedule = engine
            .register_provider(UTC, t(9, 0), t(18, 0))
            .await
            .unwrap();
        assert_eq!(schedule.slot_minutes, 30);
        assert_eq!(schedule.currency, "EUR");

        // A break without an explicit duration uses the slot size.
        let start = Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap();
        let span = engine.book_break(&schedule.id, start, None).await.unwrap();
        assert_eq!(span.end - span.start, Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_booking_unknown_service_fails() {
        let (engine, _) = engine_with_provider().await;
        let result = engine
            .book_reservation("p1", None, "ghost", Utc::now())
            .await;
        assert!(matches!(
            result,
            Err(TimegridError::Scheduling(SchedulingError::UnknownService(_)))
        ));
    }
}
