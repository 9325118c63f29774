//! Wire frames
//!
//! One JSON object per line: a link envelope (`src`, `dest`) around an
//! application body tagged by `fc`.

use outsim_model::{Command, CommandStatus, DatabaseSizes, Point};
use serde::{Deserialize, Serialize};

use super::UpdateBatch;

/// Link envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub src: u16,
    pub dest: u16,
    pub body: Body,
}

/// Application layer body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fc", rename_all = "snake_case")]
pub enum Body {
    // ======================================
    // Master -> outstation
    // ======================================
    IntegrityPoll {
        seq: u32,
    },
    EventPoll {
        seq: u32,
    },
    Select {
        seq: u32,
        index: u16,
        command: Command,
    },
    Operate {
        seq: u32,
        index: u16,
        command: Command,
    },
    DirectOperate {
        seq: u32,
        index: u16,
        command: Command,
    },
    EnableUnsolicited {
        seq: u32,
    },
    DisableUnsolicited {
        seq: u32,
    },
    DeviceAttributes {
        seq: u32,
    },

    // ======================================
    // Either direction
    // ======================================
    LinkStatus,

    // ======================================
    // Outstation -> master
    // ======================================
    Response {
        seq: u32,
        points: Vec<Point>,
        #[serde(default)]
        event_overflow: bool,
    },
    CommandResponse {
        seq: u32,
        index: u16,
        status: CommandStatus,
    },
    Unsolicited {
        update: UpdateBatch,
    },
    Attributes {
        seq: u32,
        sizes: DatabaseSizes,
        local_addr: u16,
        remote_addr: u16,
    },
    /// Confirms enable/disable unsolicited
    Ack {
        seq: u32,
        unsolicited: bool,
    },
    /// Negative response to a request that could not be processed
    Error {
        #[serde(default)]
        seq: Option<u32>,
        status: CommandStatus,
        message: String,
    },

    /// Unknown function code
    #[serde(other)]
    Unknown,
}

impl Body {
    /// Function name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Body::IntegrityPoll { .. } => "integrity_poll",
            Body::EventPoll { .. } => "event_poll",
            Body::Select { .. } => "select",
            Body::Operate { .. } => "operate",
            Body::DirectOperate { .. } => "direct_operate",
            Body::EnableUnsolicited { .. } => "enable_unsolicited",
            Body::DisableUnsolicited { .. } => "disable_unsolicited",
            Body::DeviceAttributes { .. } => "device_attributes",
            Body::LinkStatus => "link_status",
            Body::Response { .. } => "response",
            Body::CommandResponse { .. } => "command_response",
            Body::Unsolicited { .. } => "unsolicited",
            Body::Attributes { .. } => "attributes",
            Body::Ack { .. } => "ack",
            Body::Error { .. } => "error",
            Body::Unknown => "unknown",
        }
    }
}
