//! Command handler
//!
//! Validates and executes binary-output control commands. Select records a
//! per-index token; operate consumes a live token with the same code and
//! then applies the action in one database transaction, drives the bound
//! actuator and publishes the changed point as an event.
//!
//! Rejections are returned as [`CommandOutcome`] values, never as errors.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use outsim_model::{
    Command, CommandOutcome, ControlAction, ControlRelayOutputBlock, PointType, PointValue,
    RejectReason,
};
use outsim_rtdb::PointDatabase;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::OstsrvConfig;
use crate::outstation::{Publisher, SharedModel};
use crate::session::UpdateBatch;

/// Control interface the protocol session dispatches to
///
/// A request fragment may carry several commands; the session brackets them
/// with `begin_fragment` / `end_fragment`.
pub trait ControlHandler: Send + Sync {
    fn begin_fragment(&self);
    fn end_fragment(&self);
    fn select(&self, command: &Command, index: u16) -> CommandOutcome;
    fn operate(&self, command: &Command, index: u16) -> CommandOutcome;
}

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Operate only with a live matching select
    pub require_select: bool,
    pub select_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            require_select: true,
            select_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&OstsrvConfig> for HandlerConfig {
    fn from(config: &OstsrvConfig) -> Self {
        Self {
            require_select: config.outstation.require_select,
            select_timeout: config.select_timeout(),
        }
    }
}

/// Pending select for one index
#[derive(Debug, Clone, Copy)]
struct SelectToken {
    crob: ControlRelayOutputBlock,
    selected_at: Instant,
}

pub struct CommandHandler {
    db: Arc<PointDatabase>,
    model: SharedModel,
    publisher: Arc<Publisher>,
    config: HandlerConfig,
    selections: DashMap<u16, SelectToken>,
}

impl CommandHandler {
    pub fn new(
        db: Arc<PointDatabase>,
        model: SharedModel,
        publisher: Arc<Publisher>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            db,
            model,
            publisher,
            config,
            selections: DashMap::new(),
        }
    }

    /// Command kind and index checks shared by select and operate
    fn validate(&self, command: &Command, index: u16) -> Result<ControlRelayOutputBlock, RejectReason> {
        let crob = command
            .as_crob()
            .copied()
            .ok_or(RejectReason::UnsupportedOperation)?;
        if !self
            .db
            .sizes()
            .contains(PointType::BinaryOutputStatus, index)
        {
            return Err(RejectReason::IndexOutOfRange);
        }
        Ok(crob)
    }

    fn reject(&self, phase: &str, index: u16, reason: RejectReason) -> CommandOutcome {
        warn!("{} rejected: BO[{}] {:?}", phase, index, reason);
        CommandOutcome::Rejected(reason)
    }

    /// Operate without a preceding select (protocol direct operate)
    pub fn direct_operate(&self, command: &Command, index: u16) -> CommandOutcome {
        let crob = match self.validate(command, index) {
            Ok(crob) => crob,
            Err(reason) => return self.reject("Direct operate", index, reason),
        };
        self.execute(index, crob)
    }

    /// Take the token for `index` if it is live and selected `crob`'s code
    fn consume_selection(&self, index: u16, crob: &ControlRelayOutputBlock) -> bool {
        let Some((_, token)) = self.selections.remove(&index) else {
            debug!("Operate BO[{}]: no pending select", index);
            return false;
        };
        if token.selected_at.elapsed() > self.config.select_timeout {
            debug!("Operate BO[{}]: select expired", index);
            return false;
        }
        if token.crob.code != crob.code {
            debug!(
                "Operate BO[{}]: code {} does not match selected {}",
                index, crob.code, token.crob.code
            );
            return false;
        }
        true
    }

    /// Apply the classified action; the database write, the actuator call
    /// and the event publication happen under one database lock
    fn execute(&self, index: u16, crob: ControlRelayOutputBlock) -> CommandOutcome {
        let action = crob.code.classify();
        if action == ControlAction::Unrecognized {
            return self.reject("Operate", index, RejectReason::UnsupportedOperation);
        }

        let result = self.db.transaction(|table| {
            let current = table
                .get(PointType::BinaryOutputStatus, index)?
                .as_bool()
                .unwrap_or(false);
            let Some(state) = action.apply(current) else {
                return Err(errors::SimError::UnsupportedOperation(crob.code.to_string()));
            };
            let previous =
                table.set(PointType::BinaryOutputStatus, index, PointValue::Binary(state))?;

            {
                let mut model = self.model.lock();
                if (index as usize) < model.actuator_channels() {
                    // The scheduler re-applies outputs every tick
                    if let Err(e) = model.actuate(index as usize, state) {
                        warn!("Operate BO[{}]: actuator failed: {}", index, e);
                    }
                }
            }

            // Rewriting the current state is not a change
            if previous != PointValue::Binary(state) {
                let point = table.point(PointType::BinaryOutputStatus, index)?.clone();
                if let Err(e) = self.publisher.publish(UpdateBatch::event(point)) {
                    warn!("Operate BO[{}]: event not queued: {}", index, e);
                }
            }
            Ok(state)
        });

        match result {
            Ok(state) => {
                info!(
                    "Operate BO[{}]: {} -> {}",
                    index,
                    crob.code,
                    u8::from(state)
                );
                CommandOutcome::Accepted
            },
            Err(errors::SimError::IndexOutOfRange { .. }) => {
                self.reject("Operate", index, RejectReason::IndexOutOfRange)
            },
            Err(e) => {
                warn!("Operate BO[{}]: {}", index, e);
                CommandOutcome::Rejected(RejectReason::UnsupportedOperation)
            },
        }
    }

    /// Drop select tokens older than the select timeout
    pub fn purge_expired(&self) {
        let timeout = self.config.select_timeout;
        self.selections
            .retain(|_, token| token.selected_at.elapsed() <= timeout);
    }

    /// Number of live select tokens
    pub fn pending_selections(&self) -> usize {
        self.selections.len()
    }
}

impl ControlHandler for CommandHandler {
    fn begin_fragment(&self) {
        trace!("Command fragment begin");
    }

    fn end_fragment(&self) {
        self.purge_expired();
        trace!("Command fragment end");
    }

    fn select(&self, command: &Command, index: u16) -> CommandOutcome {
        let crob = match self.validate(command, index) {
            Ok(crob) => crob,
            Err(reason) => return self.reject("Select", index, reason),
        };
        self.selections.insert(
            index,
            SelectToken {
                crob,
                selected_at: Instant::now(),
            },
        );
        debug!("Select BO[{}]: {}", index, crob.code);
        CommandOutcome::Accepted
    }

    fn operate(&self, command: &Command, index: u16) -> CommandOutcome {
        let crob = match self.validate(command, index) {
            Ok(crob) => crob,
            Err(reason) => return self.reject("Operate", index, reason),
        };
        if crob.code.classify() == ControlAction::Unrecognized {
            self.selections.remove(&index);
            return self.reject("Operate", index, RejectReason::UnsupportedOperation);
        }
        if self.config.require_select && !self.consume_selection(index, &crob) {
            return self.reject("Operate", index, RejectReason::NoSelect);
        }
        self.execute(index, crob)
    }
}
