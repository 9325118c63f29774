//! TCP protocol session
//!
//! Serves one master at a time. Further connections wait in the listener
//! backlog until the active session ends. While no master is connected,
//! queued outbound updates are discarded.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use errors::{SimError, SimResult};
use futures::{SinkExt, StreamExt};
use outsim_model::{CommandOutcome, CommandStatus};
use outsim_rtdb::PointDatabase;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::codec::{FrameCodec, Inbound};
use super::frame::{Body, Frame};
use super::UpdateBatch;
use crate::config::OstsrvConfig;
use crate::handler::{CommandHandler, ControlHandler};

/// Pause after a failed accept before retrying
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type Connection = Framed<TcpStream, FrameCodec>;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub listen: SocketAddr,
    pub local_addr: u16,
    pub remote_addr: u16,
    pub keep_alive: Option<Duration>,
    /// Upper bound for writing one frame
    pub response_timeout: Duration,
    /// Unsolicited reporting state at session start
    pub allow_unsolicited: bool,
}

impl SessionConfig {
    pub fn from_config(config: &OstsrvConfig) -> SimResult<Self> {
        Ok(Self {
            listen: config.listen_addr()?,
            local_addr: config.link.local_addr,
            remote_addr: config.link.remote_addr,
            keep_alive: config.keep_alive(),
            response_timeout: config.response_timeout(),
            allow_unsolicited: config.outstation.allow_unsolicited,
        })
    }
}

// ============================================================================
// Request dispatch
// ============================================================================

/// Translates requests into handler and database calls
struct Dispatcher {
    config: SessionConfig,
    handler: Arc<CommandHandler>,
    db: Arc<PointDatabase>,
}

impl Dispatcher {
    /// Reply for `frame`, or `None` when it is dropped
    fn dispatch(&self, frame: Frame, unsolicited: &mut bool) -> Option<Body> {
        if frame.dest != self.config.local_addr {
            warn!(
                "Dropping {} for link address {} (local {})",
                frame.body.name(),
                frame.dest,
                self.config.local_addr
            );
            return None;
        }
        if frame.src != self.config.remote_addr {
            warn!(
                "Dropping {} from unknown master {} (expected {})",
                frame.body.name(),
                frame.src,
                self.config.remote_addr
            );
            return None;
        }

        debug!("Request: {}", frame.body.name());
        let reply = match frame.body {
            Body::IntegrityPoll { seq } => Body::Response {
                seq,
                points: self.db.snapshot(),
                event_overflow: false,
            },
            Body::EventPoll { seq } => {
                let batch = self.db.drain_events();
                if batch.overflow {
                    warn!("Event buffer overflowed since last poll, oldest events lost");
                }
                Body::Response {
                    seq,
                    points: batch.events,
                    event_overflow: batch.overflow,
                }
            },
            Body::Select {
                seq,
                index,
                command,
            } => self.command(seq, index, |h| h.select(&command, index)),
            Body::Operate {
                seq,
                index,
                command,
            } => self.command(seq, index, |h| h.operate(&command, index)),
            Body::DirectOperate {
                seq,
                index,
                command,
            } => self.command(seq, index, |h| h.direct_operate(&command, index)),
            Body::EnableUnsolicited { seq } => {
                *unsolicited = true;
                info!("Unsolicited reporting enabled by master");
                Body::Ack {
                    seq,
                    unsolicited: true,
                }
            },
            Body::DisableUnsolicited { seq } => {
                *unsolicited = false;
                info!("Unsolicited reporting disabled by master");
                Body::Ack {
                    seq,
                    unsolicited: false,
                }
            },
            Body::DeviceAttributes { seq } => Body::Attributes {
                seq,
                sizes: self.db.sizes(),
                local_addr: self.config.local_addr,
                remote_addr: self.config.remote_addr,
            },
            Body::LinkStatus => Body::LinkStatus,
            other => {
                warn!("Unsupported function: {}", other.name());
                Body::Error {
                    seq: None,
                    status: CommandStatus::NotSupported,
                    message: format!("function {} not supported", other.name()),
                }
            },
        };
        Some(reply)
    }

    fn command(
        &self,
        seq: u32,
        index: u16,
        execute: impl FnOnce(&CommandHandler) -> CommandOutcome,
    ) -> Body {
        self.handler.begin_fragment();
        let outcome = execute(&self.handler);
        self.handler.end_fragment();
        Body::CommandResponse {
            seq,
            index,
            status: outcome.into(),
        }
    }

    /// Write one frame within the response timeout
    async fn send(&self, conn: &mut Connection, body: Body) -> SimResult<()> {
        let name = body.name();
        let frame = Frame {
            src: self.config.local_addr,
            dest: self.config.remote_addr,
            body,
        };
        match tokio::time::timeout(self.config.response_timeout, conn.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(SimError::transport(format!(
                "{} not written within {:?}",
                name, self.config.response_timeout
            ))),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

enum ListenerActivity {
    Shutdown,
    Accepted(std::io::Result<(TcpStream, SocketAddr)>),
    Outbound(Option<UpdateBatch>),
}

enum SessionActivity {
    Shutdown,
    Request(Option<SimResult<Inbound>>),
    Outbound(Option<UpdateBatch>),
    Idle,
}

async fn keep_alive_due(period: Option<Duration>, last_inbound: Instant) {
    match period {
        Some(period) => tokio::time::sleep_until(last_inbound + period).await,
        None => std::future::pending::<()>().await,
    }
}

pub struct TcpSession {
    listener: TcpListener,
    outbound: mpsc::Receiver<UpdateBatch>,
    outbound_open: bool,
    dispatcher: Dispatcher,
}

impl TcpSession {
    pub async fn bind(
        config: SessionConfig,
        handler: Arc<CommandHandler>,
        db: Arc<PointDatabase>,
        outbound: mpsc::Receiver<UpdateBatch>,
    ) -> SimResult<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| SimError::transport(format!("bind {} failed: {}", config.listen, e)))?;
        Ok(Self {
            listener,
            outbound,
            outbound_open: true,
            dispatcher: Dispatcher {
                config,
                handler,
                db,
            },
        })
    }

    pub fn local_addr(&self) -> SimResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve masters until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) -> SimResult<()> {
        info!(
            "Outstation listening on {} (local {}, remote {})",
            self.local_addr()?,
            self.dispatcher.config.local_addr,
            self.dispatcher.config.remote_addr
        );

        loop {
            let activity = tokio::select! {
                biased;
                _ = cancel.cancelled() => ListenerActivity::Shutdown,
                accepted = self.listener.accept() => ListenerActivity::Accepted(accepted),
                batch = self.outbound.recv(), if self.outbound_open => ListenerActivity::Outbound(batch),
            };

            match activity {
                ListenerActivity::Shutdown => break,
                ListenerActivity::Accepted(Ok((stream, peer))) => {
                    info!("Master connected from {}", peer);
                    match self.serve(stream, &cancel).await {
                        Ok(()) => info!("Master {} disconnected", peer),
                        Err(e) => warn!("Session with {} ended: {}", peer, e),
                    }
                },
                ListenerActivity::Accepted(Err(e)) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                },
                ListenerActivity::Outbound(Some(batch)) => {
                    trace!("No master connected, {:?} update discarded", batch.kind);
                },
                ListenerActivity::Outbound(None) => {
                    debug!("Outbound queue closed");
                    self.outbound_open = false;
                },
            }
        }

        info!("Protocol session stopped, listener released");
        Ok(())
    }

    async fn serve(&mut self, stream: TcpStream, cancel: &CancellationToken) -> SimResult<()> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY not set: {}", e);
        }
        let mut conn = Framed::new(stream, FrameCodec::new());
        let mut unsolicited = self.dispatcher.config.allow_unsolicited;
        let keep_alive = self.dispatcher.config.keep_alive;
        let mut last_inbound = Instant::now();

        loop {
            let activity = tokio::select! {
                biased;
                _ = cancel.cancelled() => SessionActivity::Shutdown,
                inbound = conn.next() => SessionActivity::Request(inbound),
                batch = self.outbound.recv(), if self.outbound_open => SessionActivity::Outbound(batch),
                _ = keep_alive_due(keep_alive, last_inbound) => SessionActivity::Idle,
            };

            match activity {
                SessionActivity::Shutdown => {
                    self.flush(&mut conn, unsolicited).await;
                    return Ok(());
                },
                SessionActivity::Request(None) => return Ok(()),
                SessionActivity::Request(Some(Err(e))) => return Err(e),
                SessionActivity::Request(Some(Ok(Inbound::Malformed(reason)))) => {
                    last_inbound = Instant::now();
                    warn!("Malformed frame: {}", reason);
                    let reply = Body::Error {
                        seq: None,
                        status: CommandStatus::FormatError,
                        message: reason,
                    };
                    self.dispatcher.send(&mut conn, reply).await?;
                },
                SessionActivity::Request(Some(Ok(Inbound::Frame(frame)))) => {
                    last_inbound = Instant::now();
                    if let Some(reply) = self.dispatcher.dispatch(frame, &mut unsolicited) {
                        self.dispatcher.send(&mut conn, reply).await?;
                    }
                },
                SessionActivity::Outbound(Some(update)) => {
                    if unsolicited {
                        self.dispatcher
                            .send(&mut conn, Body::Unsolicited { update })
                            .await?;
                    } else {
                        trace!("Unsolicited disabled, {:?} update discarded", update.kind);
                    }
                },
                SessionActivity::Outbound(None) => {
                    debug!("Outbound queue closed");
                    self.outbound_open = false;
                },
                SessionActivity::Idle => {
                    last_inbound = Instant::now();
                    debug!("Keep-alive: no request for {:?}", keep_alive);
                    self.dispatcher.send(&mut conn, Body::LinkStatus).await?;
                },
            }
        }
    }

    /// Send what is already queued, then stop; gives up on the first failure
    async fn flush(&mut self, conn: &mut Connection, unsolicited: bool) {
        let mut flushed = 0usize;
        while let Ok(update) = self.outbound.try_recv() {
            if !unsolicited {
                continue;
            }
            if let Err(e) = self
                .dispatcher
                .send(conn, Body::Unsolicited { update })
                .await
            {
                warn!("Shutdown flush aborted: {}", e);
                return;
            }
            flushed += 1;
        }
        info!("Flushed {} queued updates before close", flushed);
    }
}
