//! Binary-output control commands
//!
//! A control relay output block (CROB) carries an operation code. The code is
//! classified through a fixed table into the action applied to the binary
//! output; codes outside the table are rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CROB operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCode {
    Nul,
    PulseOn,
    PulseOff,
    LatchOn,
    LatchOff,
    ClosePulseOn,
    TripPulseOn,
    /// Any code this outstation does not know
    #[serde(other)]
    Undefined,
}

/// Action applied to the binary output status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    TurnOn,
    TurnOff,
    Toggle,
    Unrecognized,
}

impl ControlCode {
    /// Classification table
    ///
    /// | code                       | action       |
    /// |----------------------------|--------------|
    /// | LatchOn, PulseOn           | TurnOn       |
    /// | LatchOff, PulseOff         | TurnOff      |
    /// | ClosePulseOn, TripPulseOn  | Toggle       |
    /// | Nul, Undefined             | Unrecognized |
    pub fn classify(&self) -> ControlAction {
        match self {
            ControlCode::LatchOn | ControlCode::PulseOn => ControlAction::TurnOn,
            ControlCode::LatchOff | ControlCode::PulseOff => ControlAction::TurnOff,
            ControlCode::ClosePulseOn | ControlCode::TripPulseOn => ControlAction::Toggle,
            ControlCode::Nul | ControlCode::Undefined => ControlAction::Unrecognized,
        }
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlCode::Nul => "NUL",
            ControlCode::PulseOn => "PULSE_ON",
            ControlCode::PulseOff => "PULSE_OFF",
            ControlCode::LatchOn => "LATCH_ON",
            ControlCode::LatchOff => "LATCH_OFF",
            ControlCode::ClosePulseOn => "CLOSE_PULSE_ON",
            ControlCode::TripPulseOn => "TRIP_PULSE_ON",
            ControlCode::Undefined => "UNDEFINED",
        };
        f.write_str(s)
    }
}

impl ControlAction {
    /// New output state, or `None` when the action is not executable
    pub fn apply(&self, current: bool) -> Option<bool> {
        match self {
            ControlAction::TurnOn => Some(true),
            ControlAction::TurnOff => Some(false),
            ControlAction::Toggle => Some(!current),
            ControlAction::Unrecognized => None,
        }
    }
}

fn default_count() -> u8 {
    1
}

/// Control relay output block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRelayOutputBlock {
    pub code: ControlCode,
    #[serde(default = "default_count")]
    pub count: u8,
    #[serde(default)]
    pub on_time_ms: u32,
    #[serde(default)]
    pub off_time_ms: u32,
}

impl ControlRelayOutputBlock {
    pub fn new(code: ControlCode) -> Self {
        Self {
            code,
            count: 1,
            on_time_ms: 0,
            off_time_ms: 0,
        }
    }
}

/// A decoded control request as delivered by the protocol session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Crob(ControlRelayOutputBlock),
    AnalogOutput {
        value: f64,
    },
    /// Any other object routed to the control handler (file transfer, time sync, ...)
    #[serde(other)]
    Unsupported,
}

impl Command {
    pub fn crob(code: ControlCode) -> Self {
        Command::Crob(ControlRelayOutputBlock::new(code))
    }

    pub fn as_crob(&self) -> Option<&ControlRelayOutputBlock> {
        match self {
            Command::Crob(crob) => Some(crob),
            _ => None,
        }
    }
}

/// Why a command was not executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    IndexOutOfRange,
    UnsupportedOperation,
    /// Operate without a live matching select
    NoSelect,
}

/// Result of select / operate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted)
    }
}

/// Status returned to the master in a command response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    NoSelect,
    FormatError,
    NotSupported,
    OutOfRange,
}

impl CommandStatus {
    /// Numeric status code carried on the wire
    pub fn code(&self) -> u8 {
        match self {
            CommandStatus::Success => 0,
            CommandStatus::NoSelect => 2,
            CommandStatus::FormatError => 3,
            CommandStatus::NotSupported => 4,
            CommandStatus::OutOfRange => 16,
        }
    }
}

impl From<CommandOutcome> for CommandStatus {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Accepted => CommandStatus::Success,
            CommandOutcome::Rejected(RejectReason::IndexOutOfRange) => CommandStatus::OutOfRange,
            CommandOutcome::Rejected(RejectReason::UnsupportedOperation) => {
                CommandStatus::NotSupported
            },
            CommandOutcome::Rejected(RejectReason::NoSelect) => CommandStatus::NoSelect,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases = [
            (ControlCode::LatchOn, ControlAction::TurnOn),
            (ControlCode::PulseOn, ControlAction::TurnOn),
            (ControlCode::LatchOff, ControlAction::TurnOff),
            (ControlCode::PulseOff, ControlAction::TurnOff),
            (ControlCode::ClosePulseOn, ControlAction::Toggle),
            (ControlCode::TripPulseOn, ControlAction::Toggle),
            (ControlCode::Nul, ControlAction::Unrecognized),
            (ControlCode::Undefined, ControlAction::Unrecognized),
        ];
        for (code, action) in cases {
            assert_eq!(code.classify(), action, "code {}", code);
        }
    }

    #[test]
    fn test_action_apply() {
        assert_eq!(ControlAction::TurnOn.apply(false), Some(true));
        assert_eq!(ControlAction::TurnOn.apply(true), Some(true));
        assert_eq!(ControlAction::TurnOff.apply(true), Some(false));
        assert_eq!(ControlAction::Toggle.apply(true), Some(false));
        assert_eq!(ControlAction::Toggle.apply(false), Some(true));
        assert_eq!(ControlAction::Unrecognized.apply(false), None);
    }

    #[test]
    fn test_unknown_code_decodes_as_undefined() {
        let crob: ControlRelayOutputBlock =
            serde_json::from_str(r#"{"code":"modulate_everything"}"#).unwrap();
        assert_eq!(crob.code, ControlCode::Undefined);
        assert_eq!(crob.count, 1);
    }

    #[test]
    fn test_command_decoding() {
        let cmd: Command = serde_json::from_str(r#"{"type":"crob","code":"latch_on"}"#).unwrap();
        assert_eq!(cmd, Command::crob(ControlCode::LatchOn));

        let cmd: Command = serde_json::from_str(r#"{"type":"file_open"}"#).unwrap();
        assert_eq!(cmd, Command::Unsupported);

        let cmd: Command =
            serde_json::from_str(r#"{"type":"analog_output","value":12.5}"#).unwrap();
        assert!(cmd.as_crob().is_none());
    }

    #[test]
    fn test_outcome_to_status() {
        assert_eq!(
            CommandStatus::from(CommandOutcome::Accepted),
            CommandStatus::Success
        );
        assert_eq!(
            CommandStatus::from(CommandOutcome::Rejected(RejectReason::IndexOutOfRange)),
            CommandStatus::OutOfRange
        );
        assert_eq!(CommandStatus::NotSupported.code(), 4);
    }
}
