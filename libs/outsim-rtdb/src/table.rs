//! Point table
//!
//! Contiguous per-class storage, index == slot. The index space of every
//! class is fixed when the table is built; points are never created lazily.

use std::sync::Arc;

use errors::{SimError, SimResult};
use outsim_model::{DatabaseSizes, Point, PointType, PointValue};

use crate::events::{EventBatch, EventBuffer};
use crate::clock::{EventClock, WallClock};

pub struct PointTable {
    sizes: DatabaseSizes,
    binary_outputs: Box<[Point]>,
    analog_inputs: Box<[Point]>,
    counters: Box<[Point]>,
    events: EventBuffer,
    /// Last issued change sequence
    sequence: u64,
    clock: Arc<dyn EventClock>,
}

impl std::fmt::Debug for PointTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointTable")
            .field("sizes", &self.sizes)
            .field("sequence", &self.sequence)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

fn provision(point_type: PointType, count: u16) -> Box<[Point]> {
    (0..count)
        .map(|index| Point::new(point_type, index))
        .collect::<Vec<_>>()
        .into_boxed_slice()
}

/// Store `value` in `slot` and record a change event if it differs
///
/// Returns the previous value. The slot is marked online either way.
fn commit(
    slot: &mut Point,
    value: PointValue,
    now_ms: i64,
    sequence: &mut u64,
    events: &mut EventBuffer,
) -> PointValue {
    let previous = slot.value;
    slot.online = true;
    if previous == value {
        return previous;
    }

    *sequence += 1;
    slot.value = value;
    slot.sequence = *sequence;
    slot.timestamp_ms = now_ms;
    events.push(slot.clone());
    previous
}

impl PointTable {
    pub fn new(sizes: DatabaseSizes, event_capacity: usize) -> Self {
        Self::with_clock(sizes, event_capacity, Arc::new(WallClock))
    }

    pub fn with_clock(sizes: DatabaseSizes, event_capacity: usize, clock: Arc<dyn EventClock>) -> Self {
        Self {
            sizes,
            binary_outputs: provision(PointType::BinaryOutputStatus, sizes.binary_outputs),
            analog_inputs: provision(PointType::AnalogInput, sizes.analog_inputs),
            counters: provision(PointType::Counter, sizes.counters),
            events: EventBuffer::new(event_capacity),
            sequence: 0,
            clock,
        }
    }

    pub fn sizes(&self) -> DatabaseSizes {
        self.sizes
    }

    fn slots(&self, point_type: PointType) -> &[Point] {
        match point_type {
            PointType::BinaryOutputStatus => &self.binary_outputs,
            PointType::AnalogInput => &self.analog_inputs,
            PointType::Counter => &self.counters,
        }
    }

    /// Full point record
    pub fn point(&self, point_type: PointType, index: u16) -> SimResult<&Point> {
        self.slots(point_type)
            .get(index as usize)
            .ok_or_else(|| SimError::index_out_of_range(point_type, index))
    }

    pub fn get(&self, point_type: PointType, index: u16) -> SimResult<PointValue> {
        self.point(point_type, index).map(|p| p.value)
    }

    /// Write a value, returning the previous one
    ///
    /// Writing the current value again succeeds without recording a change
    /// event; the point is still marked online.
    pub fn set(&mut self, point_type: PointType, index: u16, value: PointValue) -> SimResult<PointValue> {
        if value.point_type() != point_type {
            return Err(SimError::TypeMismatch {
                expected: point_type.to_string(),
                actual: value.point_type().to_string(),
            });
        }

        let now = self.clock.now_ms();
        // Field-level borrow so sequence and events stay reachable
        let slots = match point_type {
            PointType::BinaryOutputStatus => &mut self.binary_outputs,
            PointType::AnalogInput => &mut self.analog_inputs,
            PointType::Counter => &mut self.counters,
        };
        let slot = slots
            .get_mut(index as usize)
            .ok_or_else(|| SimError::index_out_of_range(point_type, index))?;
        Ok(commit(slot, value, now, &mut self.sequence, &mut self.events))
    }

    /// Advance every counter by one, wrapping at `modulus`
    pub fn increment_counters(&mut self, modulus: u32) {
        let now = self.clock.now_ms();
        for slot in self.counters.iter_mut() {
            let current = slot.value.as_u32().unwrap_or(0);
            let next = if modulus == 0 {
                current.wrapping_add(1)
            } else {
                ((current as u64 + 1) % modulus as u64) as u32
            };
            commit(
                slot,
                PointValue::Counter(next),
                now,
                &mut self.sequence,
                &mut self.events,
            );
        }
    }

    /// Point-in-time copy in deterministic order: class, then index
    pub fn snapshot(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.sizes.total());
        for point_type in PointType::ALL {
            points.extend(self.slots(point_type).iter().cloned());
        }
        points
    }

    /// Current binary output states by index
    pub fn binary_states(&self) -> Vec<bool> {
        self.binary_outputs
            .iter()
            .map(|p| p.value.as_bool().unwrap_or(false))
            .collect()
    }

    pub fn drain_events(&mut self) -> EventBatch {
        self.events.drain()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
