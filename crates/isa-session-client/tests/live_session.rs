// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end tests against an in-process fake simulator service.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration;

use isa_app_core::config::ClientConfig;
use isa_session_client::{
    assemble::ASSEMBLE_ERROR_PREFIX, drive_until, AssembleClient, ChannelEventKind,
    HttpAssembleClient, SessionController, SessionStatus, SimulationChannel, WsChannel,
};
use isa_session_proto::{wire::Inbound, Command, ServerEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn next_kind(rx: &mut UnboundedReceiver<isa_session_client::ChannelEvent>) -> ChannelEventKind {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("event stream ended")
        .kind
}

#[tokio::test]
async fn assemble_client_posts_source_and_parses_result() {
    let svc = common::spawn().await;
    let client = HttpAssembleClient::new(&svc.config()).unwrap();
    let result = client.post_assemble("ADDI R1,R0,5\nHALT").await;
    assert!(result.success);
    assert_eq!(result.binary, vec![17, 0]);
    assert!(result.errors.is_empty());

    let bad = client.post_assemble("FOO R1").await;
    assert!(!bad.success);
    assert_eq!(bad.errors, vec!["unknown opcode FOO".to_string()]);
}

#[tokio::test]
async fn assemble_client_converts_refused_connection() {
    let addr = common::dead_addr().await;
    let cfg = ClientConfig {
        api_url: format!("http://{addr}"),
        ..ClientConfig::default()
    };
    let client = HttpAssembleClient::new(&cfg).unwrap();
    let result = client.post_assemble("HALT").await;
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with(ASSEMBLE_ERROR_PREFIX));
}

#[tokio::test]
async fn assemble_client_converts_malformed_body() {
    let svc = common::spawn().await;
    let cfg = ClientConfig {
        api_url: format!("http://{}/broken", svc.addr),
        ..svc.config()
    };
    let client = HttpAssembleClient::new(&cfg).unwrap();
    let result = client.post_assemble("HALT").await;
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(client.try_assemble("HALT").await.is_err());
}

#[tokio::test]
async fn service_info_probe() {
    let svc = common::spawn().await;
    let client = HttpAssembleClient::new(&svc.config()).unwrap();
    let info = client.service_info().await.unwrap();
    assert_eq!(info.version, "1.0.0");
}

#[tokio::test]
async fn ws_channel_flushes_commands_queued_before_open() {
    let svc = common::spawn().await;
    let (mut channel, mut rx) = WsChannel::new(svc.config().ws_url);
    let id = channel.open();
    channel.send(Command::Reset);
    channel.send(Command::load(vec![17, 0]));

    assert_eq!(next_kind(&mut rx).await, ChannelEventKind::Opened);
    for _ in 0..2 {
        match next_kind(&mut rx).await {
            ChannelEventKind::Message(Inbound::Event(ServerEvent::StateUpdate { .. })) => {}
            other => panic!("expected state update, got {other:?}"),
        }
    }
    assert_eq!(
        svc.received(),
        vec![Command::Reset, Command::load(vec![17, 0])]
    );
    assert_eq!(channel.current(), Some(id));
}

#[tokio::test]
async fn ws_channel_close_is_idempotent() {
    let svc = common::spawn().await;
    let (mut channel, mut rx) = WsChannel::new(svc.config().ws_url);
    channel.close();
    channel.close();

    channel.open();
    assert_eq!(next_kind(&mut rx).await, ChannelEventKind::Opened);
    channel.close();
    channel.close();
    assert_eq!(channel.current(), None);
    assert_eq!(next_kind(&mut rx).await, ChannelEventKind::Closed);
}

#[tokio::test]
async fn ws_channel_reports_connect_failure() {
    let addr = common::dead_addr().await;
    let (mut channel, mut rx) = WsChannel::new(format!("ws://{addr}/ws/simulate"));
    channel.open();
    assert!(matches!(next_kind(&mut rx).await, ChannelEventKind::Error(_)));
    assert_eq!(next_kind(&mut rx).await, ChannelEventKind::Closed);
}

#[tokio::test]
async fn live_session_assemble_step_run() {
    let svc = common::spawn().await;
    let cfg = svc.config();
    let (channel, mut events) = WsChannel::new(cfg.ws_url.clone());
    let mut session = SessionController::new(HttpAssembleClient::new(&cfg).unwrap(), channel);

    assert!(session.assemble("ADDI R1,R0,5\nADDI R2,R0,3\nHALT").await);
    assert_eq!(session.status(), SessionStatus::Connecting);
    let loaded = timeout(
        WAIT,
        drive_until(&mut session, &mut events, |s| {
            s.status() == SessionStatus::Ready && s.state().is_some()
        }),
    )
    .await
    .unwrap();
    assert!(loaded);

    assert!(session.step());
    timeout(
        WAIT,
        drive_until(&mut session, &mut events, |s| s.trace().len() == 1),
    )
    .await
    .unwrap();
    assert_eq!(session.trace().entries(), ["PC=0"]);

    assert!(session.run(10_000));
    assert!(!session.step());
    timeout(
        WAIT,
        drive_until(&mut session, &mut events, |s| !s.is_running()),
    )
    .await
    .unwrap();
    assert_eq!(session.trace().entries(), ["PC=1", "PC=2"]);
    assert!(session.display().halted);

    let received = svc.received();
    assert_eq!(
        &received[..2],
        &[Command::Reset, Command::load(vec![17, 17, 0])]
    );
    assert_eq!(received[2], Command::Step);
    assert_eq!(received[3], Command::Run { max_steps: 10_000 });

    session.teardown();
    assert_eq!(session.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn live_session_falls_back_to_idle_when_channel_unreachable() {
    let svc = common::spawn().await;
    let dead = common::dead_addr().await;
    let cfg = ClientConfig {
        ws_url: format!("ws://{dead}/ws/simulate"),
        ..svc.config()
    };
    let (channel, mut events) = WsChannel::new(cfg.ws_url.clone());
    let mut session = SessionController::new(HttpAssembleClient::new(&cfg).unwrap(), channel);

    assert!(session.assemble("HALT").await);
    let settled = timeout(
        WAIT,
        drive_until(&mut session, &mut events, |s| s.active_channel().is_none()),
    )
    .await
    .unwrap();
    assert!(settled);
    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(!session.notices().is_empty());
    assert!(svc.received().is_empty());
}
