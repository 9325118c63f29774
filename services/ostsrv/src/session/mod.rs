//! Protocol session boundary
//!
//! The engine hands outbound updates to an [`UpdateSink`]; the TCP session
//! drains them and translates inbound frames into command handler calls.
//! Nothing in here holds point state.

pub mod codec;
pub mod frame;
pub mod tcp;

use errors::{SimError, SimResult};
use outsim_model::Point;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use codec::{FrameCodec, Inbound};
pub use frame::{Body, Frame};
pub use tcp::{SessionConfig, TcpSession};

/// Why an update was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Periodic full snapshot
    Integrity,
    /// Out-of-band change caused by an accepted command
    Event,
}

/// Points handed to the session for transmission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub kind: UpdateKind,
    pub points: Vec<Point>,
}

impl UpdateBatch {
    pub fn integrity(points: Vec<Point>) -> Self {
        Self {
            kind: UpdateKind::Integrity,
            points,
        }
    }

    pub fn event(point: Point) -> Self {
        Self {
            kind: UpdateKind::Event,
            points: vec![point],
        }
    }
}

/// Outbound side of the protocol session
///
/// Producers call this while holding the point database lock, so
/// implementations must never block or await.
pub trait UpdateSink: Send + Sync {
    fn publish(&self, batch: UpdateBatch) -> SimResult<()>;
}

/// Bounded queue towards the TCP session
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::Sender<UpdateBatch>,
}

impl QueueSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UpdateBatch>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl UpdateSink for QueueSink {
    fn publish(&self, batch: UpdateBatch) -> SimResult<()> {
        self.tx.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(b) => SimError::transport(format!(
                "outbound queue full, dropped {:?} update ({} points)",
                b.kind,
                b.points.len()
            )),
            mpsc::error::TrySendError::Closed(_) => {
                SimError::transport("outbound queue closed".to_string())
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use outsim_model::PointType;

    #[test]
    fn test_queue_sink_full_is_transport_failure() {
        let (sink, mut rx) = QueueSink::channel(1);
        let point = Point::new(PointType::BinaryOutputStatus, 0);

        sink.publish(UpdateBatch::event(point.clone())).unwrap();
        let err = sink.publish(UpdateBatch::event(point)).unwrap_err();
        assert!(matches!(err, SimError::TransportFailure(_)));

        assert_eq!(rx.try_recv().unwrap().kind, UpdateKind::Event);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_queue_sink_closed() {
        let (sink, rx) = QueueSink::channel(4);
        drop(rx);
        let err = sink.publish(UpdateBatch::integrity(vec![])).unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
