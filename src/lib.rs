//! Timegrid: timezone-aware appointment availability engine.
//!
//! Computes bookable time slots for service providers from working
//! hours, lunch windows, recurring days off, vacations, reservations,
//! and breaks. Rules are evaluated in the provider's home zone, results
//! are surfaced in the viewer's zone, and everything persisted is an
//! absolute UTC instant.

pub mod clock;
pub mod config;
pub mod error;
pub mod schedule;

pub use config::{EngineConfig, ProviderDefaults, DEFAULT_QUANTUM_MINUTES};
pub use error::{ConfigError, Result, SchedulingError, StorageError, TimegridError};
pub use schedule::{
    BookingEngine, BreakSpan, DayAvailability, DayClassification, EmbeddedScheduleStore,
    IntervalKind, LunchWindow, OccupiedInterval, ProviderSchedule, Reservation,
    ScheduleExceptions, ScheduleStore, ScheduleUpdate, Service, SlotQuery, TimeWindow,
    VacationRange, WeekDaySummary,
};
