//! Tank trend logger
//!
//! Read-only consumer of the periodic snapshot feed; logs the tank level and
//! valve states in place of a live plot.

use std::sync::Arc;

use outsim_model::process::{ACTUATOR_DRAIN_VALVE, ACTUATOR_FILL_VALVE, CHANNEL_LEVEL};
use outsim_model::{Point, PointType};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::outstation::SnapshotReceiver;

/// One trend sample extracted from a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSample {
    pub level: f64,
    pub fill_valve: bool,
    pub drain_valve: bool,
}

impl TrendSample {
    pub fn from_snapshot(points: &[Point]) -> Option<Self> {
        let find = |point_type: PointType, index: usize| {
            points
                .iter()
                .find(|p| p.point_type == point_type && p.index as usize == index)
        };
        Some(Self {
            level: find(PointType::AnalogInput, CHANNEL_LEVEL)?.value.as_f64()?,
            fill_valve: find(PointType::BinaryOutputStatus, ACTUATOR_FILL_VALVE)?
                .value
                .as_bool()?,
            drain_valve: find(PointType::BinaryOutputStatus, ACTUATOR_DRAIN_VALVE)?
                .value
                .as_bool()?,
        })
    }
}

/// Log every snapshot change until cancelled or the feed closes
pub fn spawn_trend_logger(
    mut snapshots: SnapshotReceiver,
    setpoint: f64,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest: Arc<Vec<Point>> = snapshots.borrow_and_update().clone();
                    if let Some(sample) = TrendSample::from_snapshot(&latest) {
                        debug!(
                            "Trend: level {:.2} (setpoint {:.1}, {:+.2}) fill={} drain={}",
                            sample.level,
                            setpoint,
                            sample.level - setpoint,
                            u8::from(sample.fill_valve),
                            u8::from(sample.drain_valve)
                        );
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use outsim_model::PointValue;

    fn point(point_type: PointType, index: u16, value: PointValue) -> Point {
        let mut p = Point::new(point_type, index);
        p.value = value;
        p
    }

    #[test]
    fn test_sample_from_snapshot() {
        let snapshot = vec![
            point(PointType::BinaryOutputStatus, 0, PointValue::Binary(true)),
            point(PointType::BinaryOutputStatus, 1, PointValue::Binary(false)),
            point(PointType::AnalogInput, 0, PointValue::Analog(61.25)),
        ];
        let sample = TrendSample::from_snapshot(&snapshot).unwrap();
        assert_eq!(
            sample,
            TrendSample {
                level: 61.25,
                fill_valve: true,
                drain_valve: false
            }
        );
    }

    #[test]
    fn test_incomplete_snapshot_has_no_sample() {
        let snapshot = vec![point(PointType::AnalogInput, 0, PointValue::Analog(1.0))];
        assert!(TrendSample::from_snapshot(&snapshot).is_none());
    }

    #[tokio::test]
    async fn test_logger_exits_when_feed_closes() {
        let (tx, rx) = tokio::sync::watch::channel(Arc::new(Vec::new()));
        let handle = spawn_trend_logger(rx, 60.0, CancellationToken::new());
        drop(tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
