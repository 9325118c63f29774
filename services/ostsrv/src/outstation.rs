//! Outstation engine
//!
//! Owns the point database, the process model and the outbound publisher,
//! and wires the command handler and update scheduler to them.
//!
//! Lock order is always database, then model. Every outbound publication
//! happens while the database lock is held, so the order in which updates
//! reach the session is the order in which the database changed.

use std::sync::Arc;

use errors::SimResult;
use outsim_model::{Point, PointType, PointValue, ProcessModel, TankModel};
use outsim_rtdb::PointDatabase;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::OstsrvConfig;
use crate::handler::{CommandHandler, HandlerConfig};
use crate::scheduler::{SchedulerConfig, UpdateScheduler};
use crate::session::{QueueSink, UpdateBatch, UpdateKind, UpdateSink};

/// Process model shared by the scheduler and the command handler
pub type SharedModel = Arc<Mutex<dyn ProcessModel>>;

/// Latest published full snapshot
pub type SnapshotReceiver = watch::Receiver<Arc<Vec<Point>>>;

// ============================================================================
// Publisher
// ============================================================================

/// Fans outbound updates to the session sink and the snapshot monitor
pub struct Publisher {
    sink: Arc<dyn UpdateSink>,
    monitor: watch::Sender<Arc<Vec<Point>>>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn UpdateSink>) -> Self {
        let (monitor, _) = watch::channel(Arc::new(Vec::new()));
        Self { sink, monitor }
    }

    /// Non-blocking; a failure means the batch was dropped for the session
    pub fn publish(&self, batch: UpdateBatch) -> SimResult<()> {
        if batch.kind == UpdateKind::Integrity {
            self.monitor.send_replace(Arc::new(batch.points.clone()));
        }
        self.sink.publish(batch)
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.monitor.subscribe()
    }
}

// ============================================================================
// Outstation
// ============================================================================

pub struct Outstation {
    db: Arc<PointDatabase>,
    model: SharedModel,
    publisher: Arc<Publisher>,
    handler: Arc<CommandHandler>,
}

impl Outstation {
    pub fn new(
        db: Arc<PointDatabase>,
        model: SharedModel,
        sink: Arc<dyn UpdateSink>,
        handler_config: HandlerConfig,
    ) -> Self {
        let publisher = Arc::new(Publisher::new(sink));
        let handler = Arc::new(CommandHandler::new(
            db.clone(),
            model.clone(),
            publisher.clone(),
            handler_config,
        ));
        Self {
            db,
            model,
            publisher,
            handler,
        }
    }

    /// Build the engine described by `config` with a tank model and a queue sink
    ///
    /// The returned receiver is the session's outbound queue.
    pub fn from_config(config: &OstsrvConfig) -> (Self, mpsc::Receiver<UpdateBatch>) {
        let db = Arc::new(PointDatabase::new(
            config.database,
            config.outstation.event_buffer_size,
        ));
        let model: SharedModel = Arc::new(Mutex::new(TankModel::new(config.process.tank.clone())));
        let (sink, outbound) = QueueSink::channel(config.outstation.outbound_queue);
        let outstation = Self::new(db, model, Arc::new(sink), HandlerConfig::from(config));
        (outstation, outbound)
    }

    /// Write initial values before the session is enabled
    ///
    /// Outputs off, counters zero, analogs from the model's current reads.
    /// Publishes the result as the first integrity snapshot.
    pub fn preload(&self) -> SimResult<()> {
        let sizes = self.db.sizes();
        let readings = {
            let model = self.model.lock();
            let channels = model.analog_channels().min(sizes.analog_inputs as usize);
            (0..channels)
                .map(|channel| model.read(channel).map(|v| (channel as u16, v)))
                .collect::<SimResult<Vec<_>>>()?
        };

        self.db.transaction(|table| {
            for index in 0..sizes.binary_outputs {
                table.set(PointType::BinaryOutputStatus, index, PointValue::Binary(false))?;
            }
            for index in 0..sizes.counters {
                table.set(PointType::Counter, index, PointValue::Counter(0))?;
            }
            for index in 0..sizes.analog_inputs {
                table.set(PointType::AnalogInput, index, PointValue::Analog(0.0))?;
            }
            for (index, value) in &readings {
                table.set(PointType::AnalogInput, *index, PointValue::Analog(*value))?;
            }
            // Preload values are initial state, not change events
            let discarded = table.drain_events();
            debug!("Preload: {} initial values written", discarded.events.len());

            if let Err(e) = self.publisher.publish(UpdateBatch::integrity(table.snapshot())) {
                warn!("Preload: initial snapshot not queued: {}", e);
            }
            Ok::<_, errors::SimError>(())
        })?;

        info!(
            "Database preloaded: {} binary outputs, {} analog inputs, {} counters",
            sizes.binary_outputs, sizes.analog_inputs, sizes.counters
        );
        Ok(())
    }

    pub fn database(&self) -> Arc<PointDatabase> {
        self.db.clone()
    }

    pub fn model(&self) -> SharedModel {
        self.model.clone()
    }

    pub fn handler(&self) -> Arc<CommandHandler> {
        self.handler.clone()
    }

    pub fn scheduler(&self, config: SchedulerConfig) -> UpdateScheduler {
        UpdateScheduler::new(
            self.db.clone(),
            self.model.clone(),
            self.publisher.clone(),
            config,
        )
    }

    /// Read-only view of the latest periodic snapshot
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.publisher.subscribe()
    }
}
