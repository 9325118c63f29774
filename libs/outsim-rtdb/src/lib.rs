//! Outstation Point Database
//!
//! In-memory table of typed points (binary output status, analog input,
//! counter) with change-event metadata.
//!
//! # Key Components
//!
//! - **PointTable**: the table itself; plain data, no locking
//! - **PointDatabase**: the single mutation authority wrapping a `PointTable`
//!   in a mutex, with `transaction` for compound read-modify-write work
//! - **EventBuffer**: bounded FIFO of change events with overflow latch
//! - **EventClock**: timestamp source for committed changes

pub mod clock;
pub mod database;
pub mod events;
pub mod table;

// Re-exports
pub use database::PointDatabase;
pub use events::{EventBatch, EventBuffer};
pub use table::PointTable;
pub use clock::{EventClock, ManualClock, WallClock};
