//! Schedule storage trait and the embedded reference implementation.
//!
//! The engine is persistence-agnostic: any backend that supplies
//! provider configuration, exceptions, and occupied rows, and rejects
//! overlapping bookings atomically, satisfies [`ScheduleStore`].
//! The embedded store keeps everything in memory behind one `RwLock`,
//! with optional JSON snapshot persistence.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::debug;

use crate::error::{Result, SchedulingError, StorageError};

use super::types::{
    BreakSpan, ProviderSchedule, Reservation, ScheduleExceptions, ScheduleUpdate, Service,
    TimeWindow, VacationRange,
};

// ============================================================================
// ScheduleStore Trait
// ============================================================================

/// Trait for schedule storage backends.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    // ========================================================================
    // Providers and Services
    // ========================================================================

    /// Create a provider schedule. Fails on invariant violations.
    async fn create_provider(&self, schedule: ProviderSchedule) -> Result<ProviderSchedule>;

    /// Get a provider's schedule configuration.
    async fn provider_schedule(&self, provider_id: &str) -> Result<ProviderSchedule>;

    /// Apply a typed partial update to a provider's schedule. The
    /// resulting schedule is re-validated before being accepted.
    async fn update_schedule(
        &self,
        provider_id: &str,
        update: ScheduleUpdate,
    ) -> Result<ProviderSchedule>;

    /// Delete a provider and everything it owns (reservations, breaks,
    /// vacations).
    async fn delete_provider(&self, provider_id: &str) -> Result<bool>;

    /// Create a service. The duration must be positive.
    async fn create_service(&self, service: Service) -> Result<Service>;

    /// Get a service by ID.
    async fn service(&self, service_id: &str) -> Result<Service>;

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Exception data (vacations in range, recurring days off, lunch)
    /// for a provider over an inclusive date range.
    async fn fetch_exceptions(
        &self,
        provider_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ScheduleExceptions>;

    /// All vacation ranges of a provider, sorted by start date.
    async fn vacation_ranges(&self, provider_id: &str) -> Result<Vec<VacationRange>>;

    /// Replace a provider's full vacation range set after a mutation.
    async fn persist_vacation_ranges(
        &self,
        provider_id: &str,
        ranges: Vec<VacationRange>,
    ) -> Result<()>;

    // ========================================================================
    // Occupancy Rows
    // ========================================================================

    /// Reservations overlapping a window, scoped to the provider plus,
    /// when given, the client's own reservations with any provider.
    /// Canceled reservations are included; callers filter on activity.
    async fn fetch_reservations(
        &self,
        provider_id: &str,
        client_id: Option<&str>,
        window: &TimeWindow,
    ) -> Result<Vec<Reservation>>;

    /// A provider's breaks overlapping a window.
    async fn fetch_breaks(&self, provider_id: &str, window: &TimeWindow)
        -> Result<Vec<BreakSpan>>;

    // ========================================================================
    // Booking
    // ========================================================================

    /// Persist a reservation, failing atomically with
    /// [`SchedulingError::Conflict`] if its interval overlaps an active
    /// reservation or break of the provider.
    async fn persist_reservation(&self, reservation: Reservation) -> Result<Reservation>;

    /// Persist a break under the same overlap rejection.
    async fn persist_break(&self, span: BreakSpan) -> Result<BreakSpan>;

    /// Get a reservation by ID.
    async fn reservation(&self, reservation_id: &str) -> Result<Reservation>;

    /// Mark a reservation canceled. Terminal: there is no way back to
    /// an active reservation.
    async fn cancel_reservation(&self, reservation_id: &str) -> Result<Reservation>;

    /// Delete a break.
    async fn cancel_break(&self, provider_id: &str, break_id: &str) -> Result<()>;
}

// ============================================================================
// Internal Data Structure
// ============================================================================

/// Internal data storage structure.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleData {
    /// Provider schedules indexed by ID.
    providers: HashMap<String, ProviderSchedule>,
    /// Services indexed by ID.
    services: HashMap<String, Service>,
    /// Reservations indexed by ID.
    reservations: HashMap<String, Reservation>,
    /// Breaks indexed by ID.
    breaks: HashMap<String, BreakSpan>,
    /// Vacation range sets per provider, sorted by start date.
    vacations: HashMap<String, Vec<VacationRange>>,
    /// Index: provider_id -> reservation IDs.
    reservations_by_provider: HashMap<String, Vec<String>>,
    /// Index: client_id -> reservation IDs.
    reservations_by_client: HashMap<String, Vec<String>>,
    /// Index: provider_id -> break IDs.
    breaks_by_provider: HashMap<String, Vec<String>>,
}

impl ScheduleData {
    fn index_reservation(&mut self, reservation: &Reservation) {
        self.reservations_by_provider
            .entry(reservation.provider_id.clone())
            .or_default()
            .push(reservation.id.clone());
        if let Some(client_id) = &reservation.client_id {
            self.reservations_by_client
                .entry(client_id.clone())
                .or_default()
                .push(reservation.id.clone());
        }
    }

    fn index_break(&mut self, span: &BreakSpan) {
        self.breaks_by_provider
            .entry(span.provider_id.clone())
            .or_default()
            .push(span.id.clone());
    }

    fn unindex_break(&mut self, span: &BreakSpan) {
        if let Some(ids) = self.breaks_by_provider.get_mut(&span.provider_id) {
            ids.retain(|id| id != &span.id);
        }
    }

    /// Find what an interval would collide with: any active reservation
    /// or break of the provider overlapping `[start, end)`.
    fn has_conflict(&self, provider_id: &str, window: &TimeWindow) -> bool {
        let reserved = self
            .reservations_by_provider
            .get(provider_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.reservations.get(id))
            .any(|r| r.is_active() && r.start < window.end && r.end > window.start);
        if reserved {
            return true;
        }
        self.breaks_by_provider
            .get(provider_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.breaks.get(id))
            .any(|b| b.start < window.end && b.end > window.start)
    }
}

// ============================================================================
// Embedded Implementation
// ============================================================================

/// In-memory schedule store with optional JSON snapshot persistence.
pub struct EmbeddedScheduleStore {
    /// All data protected by a single RwLock. Booking conflict checks
    /// and inserts happen under one write acquisition, which is what
    /// serializes concurrent attempts on the same provider window.
    data: RwLock<ScheduleData>,
    /// Optional snapshot file path.
    snapshot_path: Option<PathBuf>,
    /// Mutex for snapshot writes.
    snapshot_lock: AsyncMutex<()>,
}

impl EmbeddedScheduleStore {
    /// Create a new in-memory store without persistence.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(ScheduleData::default()),
            snapshot_path: None,
            snapshot_lock: AsyncMutex::new(()),
        }
    }

    /// Create a store backed by a JSON snapshot file, loading it if it
    /// exists.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(StorageError::Io)?;
            serde_json::from_str(&content).map_err(StorageError::Snapshot)?
        } else {
            ScheduleData::default()
        };
        Ok(Self {
            data: RwLock::new(data),
            snapshot_path: Some(path),
            snapshot_lock: AsyncMutex::new(()),
        })
    }

    /// Write the current state to the snapshot file, if configured.
    ///
    /// The snapshot lock is taken before the state is read, so the file
    /// writes happen in the same order as the states they capture and a
    /// newer snapshot can never be overwritten by an older one.
    async fn snapshot(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let _guard = self.snapshot_lock.lock().await;

        let serialized = {
            let data = self.data.read().await;
            serde_json::to_string_pretty(&*data).map_err(StorageError::Snapshot)?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::Io)?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, serialized)
            .await
            .map_err(StorageError::Io)?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(StorageError::Io)?;

        Ok(())
    }
}

impl Default for EmbeddedScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleStore for EmbeddedScheduleStore {
    async fn create_provider(&self, schedule: ProviderSchedule) -> Result<ProviderSchedule> {
        schedule.validate()?;
        {
            let mut data = self.data.write().await;
            data.vacations.entry(schedule.id.clone()).or_default();
            data.providers.insert(schedule.id.clone(), schedule.clone());
        }
        self.snapshot().await?;
        debug!("Created provider schedule {}", schedule.id);
        Ok(schedule)
    }

    async fn provider_schedule(&self, provider_id: &str) -> Result<ProviderSchedule> {
        let data = self.data.read().await;
        data.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| SchedulingError::UnknownProvider(provider_id.to_string()).into())
    }

    async fn update_schedule(
        &self,
        provider_id: &str,
        update: ScheduleUpdate,
    ) -> Result<ProviderSchedule> {
        let updated = {
            let mut data = self.data.write().await;
            let schedule = data
                .providers
                .get_mut(provider_id)
                .ok_or_else(|| SchedulingError::UnknownProvider(provider_id.to_string()))?;
            let mut candidate = schedule.clone();
            update.apply_to(&mut candidate);
            candidate.validate()?;
            *schedule = candidate.clone();
            candidate
        };
        self.snapshot().await?;
        debug!("Updated provider schedule {}", provider_id);
        Ok(updated)
    }

    async fn delete_provider(&self, provider_id: &str) -> Result<bool> {
        let existed = {
            let mut data = self.data.write().await;
            let existed = data.providers.remove(provider_id).is_some();
            if existed {
                data.vacations.remove(provider_id);
                if let Some(ids) = data.reservations_by_provider.remove(provider_id) {
                    for id in ids {
                        if let Some(reservation) = data.reservations.remove(&id) {
                            if let Some(client_id) = &reservation.client_id {
                                if let Some(by_client) =
                                    data.reservations_by_client.get_mut(client_id)
                                {
                                    by_client.retain(|rid| rid != &id);
                                }
                            }
                        }
                    }
                }
                if let Some(ids) = data.breaks_by_provider.remove(provider_id) {
                    for id in ids {
                        data.breaks.remove(&id);
                    }
                }
            }
            existed
        };
        self.snapshot().await?;
        debug!("Deleted provider {} (existed: {})", provider_id, existed);
        Ok(existed)
    }

    async fn create_service(&self, service: Service) -> Result<Service> {
        if service.duration_minutes == 0 {
            return Err(
                SchedulingError::InvalidSchedule("service duration must be positive".into()).into(),
            );
        }
        {
            let mut data = self.data.write().await;
            data.services.insert(service.id.clone(), service.clone());
        }
        self.snapshot().await?;
        debug!("Created service {} ({})", service.name, service.id);
        Ok(service)
    }

    async fn service(&self, service_id: &str) -> Result<Service> {
        let data = self.data.read().await;
        data.services
            .get(service_id)
            .cloned()
            .ok_or_else(|| SchedulingError::UnknownService(service_id.to_string()).into())
    }

    async fn fetch_exceptions(
        &self,
        provider_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ScheduleExceptions> {
        let data = self.data.read().await;
        let schedule = data
            .providers
            .get(provider_id)
            .ok_or_else(|| SchedulingError::UnknownProvider(provider_id.to_string()))?;
        let vacations = data
            .vacations
            .get(provider_id)
            .into_iter()
            .flatten()
            .filter(|r| r.intersects(from, to))
            .copied()
            .collect();
        Ok(ScheduleExceptions {
            vacations,
            days_off: schedule.days_off.clone(),
            lunch: schedule.lunch,
        })
    }

    async fn vacation_ranges(&self, provider_id: &str) -> Result<Vec<VacationRange>> {
        let data = self.data.read().await;
        if !data.providers.contains_key(provider_id) {
            return Err(SchedulingError::UnknownProvider(provider_id.to_string()).into());
        }
        Ok(data.vacations.get(provider_id).cloned().unwrap_or_default())
    }

    async fn persist_vacation_ranges(
        &self,
        provider_id: &str,
        mut ranges: Vec<VacationRange>,
    ) -> Result<()> {
        {
            let mut data = self.data.write().await;
            if !data.providers.contains_key(provider_id) {
                return Err(SchedulingError::UnknownProvider(provider_id.to_string()).into());
            }
            ranges.sort_by_key(|r| r.start_date);
            data.vacations.insert(provider_id.to_string(), ranges);
        }
        self.snapshot().await?;
        Ok(())
    }

    async fn fetch_reservations(
        &self,
        provider_id: &str,
        client_id: Option<&str>,
        window: &TimeWindow,
    ) -> Result<Vec<Reservation>> {
        let data = self.data.read().await;
        let provider_ids = data
            .reservations_by_provider
            .get(provider_id)
            .into_iter()
            .flatten();
        let client_ids = client_id
            .and_then(|c| data.reservations_by_client.get(c))
            .into_iter()
            .flatten();

        let mut seen = std::collections::HashSet::new();
        let mut reservations: Vec<Reservation> = provider_ids
            .chain(client_ids)
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| data.reservations.get(id))
            .filter(|r| r.start < window.end && r.end > window.start)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.start);
        Ok(reservations)
    }

    async fn fetch_breaks(
        &self,
        provider_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<BreakSpan>> {
        let data = self.data.read().await;
        let mut breaks: Vec<BreakSpan> = data
            .breaks_by_provider
            .get(provider_id)
            .into_iter()
            .flatten()
            .filter_map(|id| data.breaks.get(id))
            .filter(|b| b.start < window.end && b.end > window.start)
            .cloned()
            .collect();
        breaks.sort_by_key(|b| b.start);
        Ok(breaks)
    }

    async fn persist_reservation(&self, reservation: Reservation) -> Result<Reservation> {
        {
            let mut data = self.data.write().await;
            if !data.providers.contains_key(&reservation.provider_id) {
                return Err(
                    SchedulingError::UnknownProvider(reservation.provider_id.clone()).into(),
                );
            }
            let window = TimeWindow::new(reservation.start, reservation.end);
            if data.has_conflict(&reservation.provider_id, &window) {
                return Err(SchedulingError::Conflict {
                    start: reservation.start,
                    end: reservation.end,
                }
                .into());
            }
            data.index_reservation(&reservation);
            data.reservations
                .insert(reservation.id.clone(), reservation.clone());
        }
        self.snapshot().await?;
        debug!(
            "Persisted reservation {} for provider {}",
            reservation.id, reservation.provider_id
        );
        Ok(reservation)
    }

    async fn persist_break(&self, span: BreakSpan) -> Result<BreakSpan> {
        {
            let mut data = self.data.write().await;
            if !data.providers.contains_key(&span.provider_id) {
                return Err(SchedulingError::UnknownProvider(span.provider_id.clone()).into());
            }
            let window = TimeWindow::new(span.start, span.end);
            if data.has_conflict(&span.provider_id, &window) {
                return Err(SchedulingError::Conflict {
                    start: span.start,
                    end: span.end,
                }
                .into());
            }
            data.index_break(&span);
            data.breaks.insert(span.id.clone(), span.clone());
        }
        self.snapshot().await?;
        debug!("Persisted break {} for provider {}", span.id, span.provider_id);
        Ok(span)
    }

    async fn reservation(&self, reservation_id: &str) -> Result<Reservation> {
        let data = self.data.read().await;
        data.reservations
            .get(reservation_id)
            .cloned()
            .ok_or_else(|| SchedulingError::UnknownReservation(reservation_id.to_string()).into())
    }

    async fn cancel_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        let canceled = {
            let mut data = self.data.write().await;
            let reservation = data
                .reservations
                .get_mut(reservation_id)
                .ok_or_else(|| SchedulingError::UnknownReservation(reservation_id.to_string()))?;
            reservation.canceled = true;
            reservation.clone()
        };
        self.snapshot().await?;
        debug!("Canceled reservation {}", reservation_id);
        Ok(canceled)
    }

    async fn cancel_break(&self, provider_id: &str, break_id: &str) -> Result<()> {
        {
            let mut data = self.data.write().await;
            let span = data
                .breaks
                .get(break_id)
                .filter(|b| b.provider_id == provider_id)
                .cloned()
                .ok_or_else(|| SchedulingError::UnknownBreak(break_id.to_string()))?;
            data.unindex_break(&span);
            data.breaks.remove(break_id);
        }
        self.snapshot().await?;
        debug!("Canceled break {}", break_id);
        Ok(())
    }
}
