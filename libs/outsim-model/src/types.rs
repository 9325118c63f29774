//! Point classes and values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point class; index spaces are independent per class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    /// Binary output status (control relay feedback)
    #[serde(alias = "bo", alias = "binary_output")]
    BinaryOutputStatus,

    /// Analog input (floating point telemetry)
    #[serde(alias = "ai", alias = "analog")]
    AnalogInput,

    /// Counter (wrapping unsigned)
    #[serde(alias = "c")]
    Counter,
}

impl PointType {
    /// Snapshot order: binary outputs, analogs, counters
    pub const ALL: [PointType; 3] = [
        PointType::BinaryOutputStatus,
        PointType::AnalogInput,
        PointType::Counter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointType::BinaryOutputStatus => "BinaryOutputStatus",
            PointType::AnalogInput => "AnalogInput",
            PointType::Counter => "Counter",
        }
    }

    /// Value a freshly provisioned point starts with
    pub fn default_value(&self) -> PointValue {
        match self {
            PointType::BinaryOutputStatus => PointValue::Binary(false),
            PointType::AnalogInput => PointValue::Analog(0.0),
            PointType::Counter => PointValue::Counter(0),
        }
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-dependent point value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointValue {
    Binary(bool),
    Analog(f64),
    Counter(u32),
}

impl PointValue {
    /// Point class this value belongs to
    pub fn point_type(&self) -> PointType {
        match self {
            PointValue::Binary(_) => PointType::BinaryOutputStatus,
            PointValue::Analog(_) => PointType::AnalogInput,
            PointValue::Counter(_) => PointType::Counter,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PointValue::Binary(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Analog(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PointValue::Counter(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Binary(v) => write!(f, "{}", u8::from(*v)),
            PointValue::Analog(v) => write!(f, "{:.3}", v),
            PointValue::Counter(v) => write!(f, "{}", v),
        }
    }
}

/// A single addressable point as stored and reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub point_type: PointType,
    pub index: u16,
    pub value: PointValue,
    /// Quality flag, false until the point has been written once
    pub online: bool,
    /// Logical sequence of the last real change
    pub sequence: u64,
    /// Wall-clock time of the last real change (ms since epoch)
    pub timestamp_ms: i64,
}

impl Point {
    pub fn new(point_type: PointType, index: u16) -> Self {
        Self {
            point_type,
            index,
            value: point_type.default_value(),
            online: false,
            sequence: 0,
            timestamp_ms: 0,
        }
    }
}

/// Provisioned index range per point class; fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSizes {
    pub binary_outputs: u16,
    pub analog_inputs: u16,
    pub counters: u16,
}

impl Default for DatabaseSizes {
    fn default() -> Self {
        Self {
            binary_outputs: 10,
            analog_inputs: 2,
            counters: 13,
        }
    }
}

impl DatabaseSizes {
    pub fn new(binary_outputs: u16, analog_inputs: u16, counters: u16) -> Self {
        Self {
            binary_outputs,
            analog_inputs,
            counters,
        }
    }

    pub fn count(&self, point_type: PointType) -> u16 {
        match point_type {
            PointType::BinaryOutputStatus => self.binary_outputs,
            PointType::AnalogInput => self.analog_inputs,
            PointType::Counter => self.counters,
        }
    }

    pub fn contains(&self, point_type: PointType, index: u16) -> bool {
        index < self.count(point_type)
    }

    pub fn total(&self) -> usize {
        self.binary_outputs as usize + self.analog_inputs as usize + self.counters as usize
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_database_sizes_contains() {
        let sizes = DatabaseSizes::new(2, 2, 3);
        assert!(sizes.contains(PointType::BinaryOutputStatus, 1));
        assert!(!sizes.contains(PointType::BinaryOutputStatus, 2));
        assert!(sizes.contains(PointType::Counter, 2));
        assert_eq!(sizes.total(), 7);
    }

    #[test]
    fn test_point_type_aliases() {
        let t: PointType = serde_json::from_str("\"bo\"").unwrap();
        assert_eq!(t, PointType::BinaryOutputStatus);
        let t: PointType = serde_json::from_str("\"analog_input\"").unwrap();
        assert_eq!(t, PointType::AnalogInput);
    }

    #[test]
    fn test_counter_value_is_not_decoded_as_analog() {
        let json = serde_json::to_string(&PointValue::Counter(7)).unwrap();
        let back: PointValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PointValue::Counter(7));
        assert_eq!(back.point_type(), PointType::Counter);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(PointValue::Binary(true).to_string(), "1");
        assert_eq!(PointValue::Analog(50.0).to_string(), "50.000");
    }
}
