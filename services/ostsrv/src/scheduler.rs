//! Update scheduler
//!
//! Fixed-period loop. Each tick, in order:
//!
//! 1. apply the current binary outputs to the model's actuators and step it
//! 2. write the model's analog reads into the database
//! 3. advance every counter by one
//! 4. publish a full snapshot
//!
//! The whole tick runs as one database transaction, so a command is either
//! fully before or fully after it and no snapshot can report a stale output.
//! Failures are logged per tick; the loop itself never stops on one.

use std::sync::Arc;
use std::time::Duration;

use errors::SimResult;
use outsim_model::{PointType, PointValue, ProcessModel};
use outsim_rtdb::{PointDatabase, PointTable};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OstsrvConfig;
use crate::outstation::{Publisher, SharedModel};
use crate::session::UpdateBatch;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub period: Duration,
    /// Counters wrap back to zero at this value
    pub counter_modulus: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(200),
            counter_modulus: 1_000_000,
        }
    }
}

impl From<&OstsrvConfig> for SchedulerConfig {
    fn from(config: &OstsrvConfig) -> Self {
        Self {
            period: config.tick_period(),
            counter_modulus: config.outstation.counter_modulus,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Model advanced and was read
    pub stepped: bool,
    pub analogs_written: usize,
    /// Reads that failed or had no provisioned analog index
    pub analogs_skipped: usize,
    /// Snapshot reached the session queue
    pub published: bool,
}

pub struct UpdateScheduler {
    db: Arc<PointDatabase>,
    model: SharedModel,
    publisher: Arc<Publisher>,
    config: SchedulerConfig,
    ticks: u64,
}

impl UpdateScheduler {
    pub fn new(
        db: Arc<PointDatabase>,
        model: SharedModel,
        publisher: Arc<Publisher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            model,
            publisher,
            config,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..Default::default()
        };

        self.db.transaction(|table| {
            let readings = {
                let mut model = self.model.lock();
                match advance(table, &mut *model) {
                    Ok(readings) => Some(readings),
                    Err(e) => {
                        warn!("Tick {}: process step failed: {}", report.tick, e);
                        None
                    },
                }
            };

            if let Some(readings) = readings {
                report.stepped = true;
                for (channel, reading) in readings.into_iter().enumerate() {
                    let result = reading.and_then(|value| {
                        table.set(
                            PointType::AnalogInput,
                            channel as u16,
                            PointValue::Analog(value),
                        )
                    });
                    match result {
                        Ok(_) => report.analogs_written += 1,
                        Err(e) => {
                            warn!("Tick {}: AI[{}] skipped: {}", report.tick, channel, e);
                            report.analogs_skipped += 1;
                        },
                    }
                }
            }

            table.increment_counters(self.config.counter_modulus);

            match self.publisher.publish(UpdateBatch::integrity(table.snapshot())) {
                Ok(()) => report.published = true,
                Err(e) => debug!("Tick {}: snapshot dropped: {}", report.tick, e),
            }
        });

        report
    }

    /// Tick every period until `cancel` fires
    ///
    /// Ticks that overrun the period delay the next one instead of bursting.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Update scheduler started: period {:?}, counter modulus {}",
            self.config.period, self.config.counter_modulus
        );

        let mut dropped = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let report = self.tick();
                    if !report.published {
                        dropped += 1;
                        if dropped == 1 || dropped % 100 == 0 {
                            warn!("Snapshots dropped so far: {}", dropped);
                        }
                    }
                }
            }
        }

        info!("Update scheduler stopped after {} ticks", self.ticks);
    }
}

/// Sync actuators from the outputs, step, and read every analog channel
///
/// Channels beyond the provisioned analog inputs are still read so the
/// caller can log them as out of range.
fn advance(table: &PointTable, model: &mut dyn ProcessModel) -> SimResult<Vec<SimResult<f64>>> {
    let outputs = table.binary_states();
    for (channel, state) in outputs
        .into_iter()
        .enumerate()
        .take(model.actuator_channels())
    {
        model.actuate(channel, state)?;
    }
    model.step()?;
    Ok((0..model.analog_channels())
        .map(|channel| model.read(channel))
        .collect())
}
