//! Protocol session tests over a loopback TCP connection

#![allow(clippy::disallowed_methods)]

mod common;

use std::time::Duration;

use common::{start_session, tank_config, Master, MASTER, OUTSTATION};
use ostsrv::session::Body;
use ostsrv::UpdateKind;
use outsim_model::{Command, CommandStatus, ControlCode, DatabaseSizes, PointType, PointValue};

fn latch_on() -> Command {
    Command::crob(ControlCode::LatchOn)
}

#[tokio::test]
async fn test_device_attributes() {
    let running = start_session(tank_config()).await;
    let mut master = Master::connect(running.addr).await;

    master.send(Body::DeviceAttributes { seq: 1 }).await;
    match master.reply().await {
        Body::Attributes {
            seq,
            sizes,
            local_addr,
            remote_addr,
        } => {
            assert_eq!(seq, 1);
            assert_eq!(sizes, DatabaseSizes::new(2, 2, 3));
            assert_eq!(local_addr, OUTSTATION);
            assert_eq!(remote_addr, MASTER);
        },
        other => panic!("unexpected reply {:?}", other),
    }

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_select_operate_round_trip_with_event() {
    let running = start_session(tank_config()).await;
    let mut master = Master::connect(running.addr).await;

    master
        .send(Body::Select {
            seq: 1,
            index: 0,
            command: latch_on(),
        })
        .await;
    assert_eq!(
        master.reply().await,
        Body::CommandResponse {
            seq: 1,
            index: 0,
            status: CommandStatus::Success
        }
    );

    master
        .send(Body::Operate {
            seq: 2,
            index: 0,
            command: latch_on(),
        })
        .await;

    // The response and the unsolicited event may arrive in either order
    let mut response = None;
    let mut event = None;
    while response.is_none() || event.is_none() {
        match master.next().await.body {
            Body::CommandResponse { seq, status, .. } => response = Some((seq, status)),
            Body::Unsolicited { update } if update.kind == UpdateKind::Event => {
                event = Some(update)
            },
            Body::Unsolicited { .. } => {},
            other => panic!("unexpected frame {:?}", other),
        }
    }
    assert_eq!(response, Some((2, CommandStatus::Success)));
    let event = event.unwrap();
    assert_eq!(event.points.len(), 1);
    assert_eq!(event.points[0].point_type, PointType::BinaryOutputStatus);
    assert_eq!(event.points[0].value, PointValue::Binary(true));

    master.send(Body::IntegrityPoll { seq: 3 }).await;
    match master.reply().await {
        Body::Response { seq, points, .. } => {
            assert_eq!(seq, 3);
            assert_eq!(points[0].value, PointValue::Binary(true));
            assert_eq!(points.len(), 7);
        },
        other => panic!("unexpected reply {:?}", other),
    }

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_command_rejections_map_to_statuses() {
    let running = start_session(tank_config()).await;
    let mut master = Master::connect(running.addr).await;

    master
        .send(Body::Operate {
            seq: 1,
            index: 5,
            command: latch_on(),
        })
        .await;
    assert_eq!(
        master.reply().await,
        Body::CommandResponse {
            seq: 1,
            index: 5,
            status: CommandStatus::OutOfRange
        }
    );

    master
        .send(Body::Operate {
            seq: 2,
            index: 0,
            command: latch_on(),
        })
        .await;
    assert_eq!(
        master.reply().await,
        Body::CommandResponse {
            seq: 2,
            index: 0,
            status: CommandStatus::NoSelect
        }
    );

    master
        .send(Body::DirectOperate {
            seq: 3,
            index: 1,
            command: Command::Unsupported,
        })
        .await;
    assert_eq!(
        master.reply().await,
        Body::CommandResponse {
            seq: 3,
            index: 1,
            status: CommandStatus::NotSupported
        }
    );

    let db = running.outstation.database();
    assert_eq!(
        db.get(PointType::BinaryOutputStatus, 0).unwrap(),
        PointValue::Binary(false)
    );

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_foreign_link_addresses_are_dropped() {
    let running = start_session(tank_config()).await;
    let mut master = Master::connect(running.addr).await;

    master
        .send_as(MASTER, 99, Body::DeviceAttributes { seq: 1 })
        .await;
    master
        .send_as(7, OUTSTATION, Body::DeviceAttributes { seq: 2 })
        .await;
    master.send(Body::LinkStatus).await;

    // Only the correctly addressed request is answered
    assert_eq!(master.reply().await, Body::LinkStatus);

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_frame_keeps_session_open() {
    let running = start_session(tank_config()).await;
    let mut master = Master::connect(running.addr).await;

    master.send_raw("{\"src\":1,\"dest\":10,\"body\":\n").await;
    match master.reply().await {
        Body::Error { status, .. } => assert_eq!(status, CommandStatus::FormatError),
        other => panic!("unexpected reply {:?}", other),
    }

    master.send(Body::LinkStatus).await;
    assert_eq!(master.reply().await, Body::LinkStatus);

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_event_poll_and_unsolicited_toggle() {
    let mut config = tank_config();
    config.outstation.require_select = false;
    let running = start_session(config).await;
    let mut master = Master::connect(running.addr).await;

    master.send(Body::DisableUnsolicited { seq: 1 }).await;
    assert_eq!(
        master.reply().await,
        Body::Ack {
            seq: 1,
            unsolicited: false
        }
    );

    master
        .send(Body::Operate {
            seq: 2,
            index: 1,
            command: Command::crob(ControlCode::PulseOn),
        })
        .await;
    assert!(matches!(
        master.next().await.body,
        Body::CommandResponse {
            status: CommandStatus::Success,
            ..
        }
    ));

    master.send(Body::EventPoll { seq: 3 }).await;
    match master.next().await.body {
        Body::Response {
            seq,
            points,
            event_overflow,
        } => {
            assert_eq!(seq, 3);
            assert!(!event_overflow);
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].index, 1);
            assert_eq!(points[0].value, PointValue::Binary(true));
        },
        other => panic!("unexpected frame {:?}", other),
    }

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_keep_alive_link_status() {
    let mut config = tank_config();
    config.link.keep_alive_timeout_ms = Some(100);
    config.outstation.allow_unsolicited = false;
    let running = start_session(config).await;
    let mut master = Master::connect(running.addr).await;

    let frame = master.next().await;
    assert_eq!(frame.body, Body::LinkStatus);

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_listener() {
    let running = start_session(tank_config()).await;
    let addr = running.addr;
    let master = Master::connect(addr).await;

    running.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("session did not stop")
        .unwrap()
        .unwrap();
    drop(master);

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_next_master_served_after_disconnect() {
    let running = start_session(tank_config()).await;

    let first = Master::connect(running.addr).await;
    drop(first);

    let mut second = Master::connect(running.addr).await;
    second.send(Body::LinkStatus).await;
    assert_eq!(second.reply().await, Body::LinkStatus);

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}
