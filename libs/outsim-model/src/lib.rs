//! Outstation simulator model layer
//!
//! Shared vocabulary of the simulator:
//!
//! - **types**: point classes, values and database sizing
//! - **command**: binary-output control commands, operation-code
//!   classification and command outcomes
//! - **process**: the process model adapter seam and the tank model

pub mod command;
pub mod process;
pub mod types;

pub use command::{
    Command, CommandOutcome, CommandStatus, ControlAction, ControlCode, ControlRelayOutputBlock,
    RejectReason,
};
pub use process::{ProcessModel, TankModel, TankParams};
pub use types::{DatabaseSizes, Point, PointType, PointValue};
