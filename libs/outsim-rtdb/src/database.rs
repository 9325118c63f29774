//! Point database: the single mutation authority
//!
//! Every read and write of point state goes through one mutex. Callers that
//! need read-modify-write plus publication (toggle commands, scheduler
//! ticks) do it inside [`PointDatabase::transaction`] so that no other writer
//! or snapshot can interleave.

use std::sync::Arc;

use errors::SimResult;
use outsim_model::{DatabaseSizes, Point, PointType, PointValue};
use parking_lot::Mutex;

use crate::events::EventBatch;
use crate::table::PointTable;
use crate::clock::EventClock;

#[derive(Debug)]
pub struct PointDatabase {
    sizes: DatabaseSizes,
    table: Mutex<PointTable>,
}

impl PointDatabase {
    pub fn new(sizes: DatabaseSizes, event_capacity: usize) -> Self {
        Self {
            sizes,
            table: Mutex::new(PointTable::new(sizes, event_capacity)),
        }
    }

    pub fn with_clock(sizes: DatabaseSizes, event_capacity: usize, clock: Arc<dyn EventClock>) -> Self {
        Self {
            sizes,
            table: Mutex::new(PointTable::with_clock(sizes, event_capacity, clock)),
        }
    }

    /// Provisioned sizes; immutable for the database lifetime
    pub fn sizes(&self) -> DatabaseSizes {
        self.sizes
    }

    pub fn get(&self, point_type: PointType, index: u16) -> SimResult<PointValue> {
        self.table.lock().get(point_type, index)
    }

    pub fn set(&self, point_type: PointType, index: u16, value: PointValue) -> SimResult<PointValue> {
        self.table.lock().set(point_type, index, value)
    }

    pub fn snapshot(&self) -> Vec<Point> {
        self.table.lock().snapshot()
    }

    pub fn drain_events(&self) -> EventBatch {
        self.table.lock().drain_events()
    }

    /// Run `f` with exclusive access to the table
    ///
    /// Keep `f` short and non-blocking: the command path and the scheduler
    /// both wait on this lock.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut PointTable) -> R) -> R {
        let mut table = self.table.lock();
        f(&mut table)
    }
}
