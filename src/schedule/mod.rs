//! Schedule module: availability computation and booking.
//!
//! Everything touching wall-clock semantics lives here. Storage holds
//! absolute UTC instants only; provider rules (working hours, lunch,
//! days off) are wall-clock values in the provider's home zone, and
//! every query carries a viewer zone the results are surfaced in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     BookingEngine                        │
//! │  ┌────────────┐ ┌─────────────┐ ┌─────────────────────┐  │
//! │  │ Occupancy  │ │    Slot     │ │ Week Overview /     │  │
//! │  │ Collector  │ │  Generator  │ │ Vacation Calendar   │  │
//! │  └────────────┘ └─────────────┘ └─────────────────────┘  │
//! └───────────────────────┬──────────────────────────────────┘
//!                         │
//!                ┌────────▼────────┐
//!                │  ScheduleStore  │  atomic conflict rejection
//!                └─────────────────┘
//! ```

mod engine;
mod occupancy;
mod overview;
mod slots;
mod store;
mod types;
mod vacations;

pub use engine::BookingEngine;
pub use occupancy::collect_occupied;
pub use overview::build_week_overview;
pub use slots::{generate_slots, query_window, SlotQuery};
pub use store::{EmbeddedScheduleStore, ScheduleStore};
pub use types::*;
pub use vacations::{add_day_off, is_vacation, remove_day_off};
