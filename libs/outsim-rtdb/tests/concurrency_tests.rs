//! Concurrent access tests for the point database
//!
//! Writers on disjoint point classes (command path on binary outputs,
//! scheduler on analogs and counters) must never lose or revert each other's
//! updates.

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;
use std::thread;

use outsim_model::{DatabaseSizes, PointType, PointValue};
use outsim_rtdb::PointDatabase;

#[test]
fn test_disjoint_command_writers_with_ticks() {
    const OUTPUTS: u16 = 8;
    const TOGGLES_PER_OUTPUT: usize = 101;
    const TICKS: u32 = 500;

    let db = Arc::new(PointDatabase::new(DatabaseSizes::new(OUTPUTS, 2, 4), 64));

    let mut handles = Vec::new();
    for index in 0..OUTPUTS {
        let db = db.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..TOGGLES_PER_OUTPUT {
                db.transaction(|t| {
                    let current = t
                        .get(PointType::BinaryOutputStatus, index)
                        .unwrap()
                        .as_bool()
                        .unwrap();
                    t.set(
                        PointType::BinaryOutputStatus,
                        index,
                        PointValue::Binary(!current),
                    )
                    .unwrap();
                });
            }
        }));
    }

    let ticker = {
        let db = db.clone();
        thread::spawn(move || {
            for tick in 0..TICKS {
                db.transaction(|t| {
                    t.set(PointType::AnalogInput, 0, PointValue::Analog(tick as f64))
                        .unwrap();
                    t.increment_counters(1_000_000);
                    // A tick never writes binary outputs; snapshot must be coherent
                    let snapshot = t.snapshot();
                    assert_eq!(snapshot.len(), 14);
                });
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    ticker.join().unwrap();

    // Odd number of toggles per output: every output ends up on
    for index in 0..OUTPUTS {
        assert_eq!(
            db.get(PointType::BinaryOutputStatus, index).unwrap(),
            PointValue::Binary(true),
            "output {} lost an update",
            index
        );
    }
    assert_eq!(
        db.get(PointType::AnalogInput, 0).unwrap(),
        PointValue::Analog((TICKS - 1) as f64)
    );
    assert_eq!(
        db.get(PointType::Counter, 3).unwrap(),
        PointValue::Counter(TICKS)
    );
}

#[test]
fn test_snapshots_without_mutation_are_identical() {
    let db = PointDatabase::new(DatabaseSizes::default(), 100);
    db.set(PointType::AnalogInput, 0, PointValue::Analog(50.0))
        .unwrap();
    db.set(PointType::AnalogInput, 1, PointValue::Analog(25.0))
        .unwrap();

    let first = db.snapshot();
    let second = db.snapshot();
    assert_eq!(first, second);
    assert_eq!(first.len(), 25);
}

#[test]
fn test_out_of_range_leaves_database_unchanged() {
    let db = PointDatabase::new(DatabaseSizes::new(2, 2, 1), 10);
    let before = db.snapshot();

    assert!(db
        .set(PointType::BinaryOutputStatus, 5, PointValue::Binary(true))
        .is_err());
    assert!(db.get(PointType::AnalogInput, 2).is_err());

    assert_eq!(db.snapshot(), before);
    assert!(db.drain_events().events.is_empty());
}
