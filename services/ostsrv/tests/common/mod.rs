//! Shared fixtures for ostsrv integration tests

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ostsrv::session::{Body, Frame, FrameCodec, Inbound};
use ostsrv::{OstsrvConfig, Outstation, SessionConfig, TcpSession};
use outsim_model::DatabaseSizes;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

pub const MASTER: u16 = 1;
pub const OUTSTATION: u16 = 10;

/// Two outputs, two analogs, 200ms tick: the reference tank device
pub fn tank_config() -> OstsrvConfig {
    let mut config = OstsrvConfig::default();
    config.database = DatabaseSizes::new(2, 2, 3);
    config.network.listen_ip = "127.0.0.1".to_string();
    config.network.port = 0;
    config.process.dt_ms = 200;
    config.logging.file = false;
    config
}

pub struct RunningSession {
    pub addr: SocketAddr,
    pub outstation: Outstation,
    pub cancel: CancellationToken,
    pub task: JoinHandle<errors::SimResult<()>>,
}

pub async fn start_session(config: OstsrvConfig) -> RunningSession {
    config.validate().unwrap();
    let (outstation, outbound) = Outstation::from_config(&config);
    outstation.preload().unwrap();

    let session = TcpSession::bind(
        SessionConfig::from_config(&config).unwrap(),
        outstation.handler(),
        outstation.database(),
        outbound,
    )
    .await
    .unwrap();
    let addr = session.local_addr().unwrap();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(session.run(cancel.clone()));
    RunningSession {
        addr,
        outstation,
        cancel,
        task,
    }
}

pub struct Master {
    conn: Framed<TcpStream, FrameCodec>,
}

impl Master {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            conn: Framed::new(stream, FrameCodec::new()),
        }
    }

    pub async fn send(&mut self, body: Body) {
        self.send_as(MASTER, OUTSTATION, body).await;
    }

    pub async fn send_as(&mut self, src: u16, dest: u16, body: Body) {
        self.conn.send(Frame { src, dest, body }).await.unwrap();
    }

    pub async fn send_raw(&mut self, line: &str) {
        use tokio::io::AsyncWriteExt;
        self.conn.get_mut().write_all(line.as_bytes()).await.unwrap();
    }

    /// Next frame of any kind
    pub async fn next(&mut self) -> Frame {
        let inbound = tokio::time::timeout(Duration::from_secs(2), self.conn.next())
            .await
            .expect("no frame within 2s")
            .expect("connection closed")
            .unwrap();
        match inbound {
            Inbound::Frame(frame) => frame,
            Inbound::Malformed(e) => panic!("outstation sent malformed frame: {}", e),
        }
    }

    /// Next frame that is not an unsolicited update
    pub async fn reply(&mut self) -> Body {
        loop {
            let frame = self.next().await;
            assert_eq!(frame.src, OUTSTATION);
            assert_eq!(frame.dest, MASTER);
            if !matches!(frame.body, Body::Unsolicited { .. }) {
                return frame.body;
            }
        }
    }
}
