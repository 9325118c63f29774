//! Outstation simulator service
//!
//! A device-side telemetry endpoint backed by a simulated tank:
//!
//! - **outstation**: engine wiring (database, process model, publisher)
//! - **handler**: select / operate command handling
//! - **scheduler**: periodic process step, counter advance and snapshot
//! - **session**: TCP protocol session translating frames to handler calls
//! - **trend**: read-only snapshot subscriber that logs the tank trend

pub mod bootstrap;
pub mod config;
pub mod handler;
pub mod outstation;
pub mod scheduler;
pub mod session;
pub mod trend;

pub use config::OstsrvConfig;
pub use handler::{CommandHandler, ControlHandler, HandlerConfig};
pub use outstation::{Outstation, Publisher, SharedModel, SnapshotReceiver};
pub use scheduler::{SchedulerConfig, TickReport, UpdateScheduler};
pub use session::{QueueSink, SessionConfig, TcpSession, UpdateBatch, UpdateKind, UpdateSink};
