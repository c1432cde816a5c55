// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Simulation channel: one persistent WebSocket per channel instance.
//!
//! Each `open()` mints a fresh [`ChannelId`]; every event the connection task
//! reports is stamped with it, so the owner can tell a live instance from a
//! superseded one. Commands sent before the socket is up sit in the outbound
//! queue and go out in FIFO order right after `Opened`.

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use isa_session_proto::{
    wire::{decode_event, encode_command, Inbound},
    Command,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, trace, warn};

/// Identity of one channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// What happened on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEventKind {
    /// The connection is established; queued commands are being flushed.
    Opened,
    /// A frame arrived.
    Message(Inbound),
    /// The connection is gone (after `close()`, a server close, or a failure).
    Closed,
    /// Connect, send or receive failed.
    Error(String),
}

/// Event stamped with the instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// Producing instance.
    pub channel: ChannelId,
    /// Payload.
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    /// Shorthand constructor.
    pub fn new(channel: ChannelId, kind: ChannelEventKind) -> Self {
        Self { channel, kind }
    }
}

/// Port over the streaming connection to the simulator.
pub trait SimulationChannel {
    /// Start a new instance, closing any open or opening one first.
    fn open(&mut self) -> ChannelId;
    /// Send on the current instance; queued until it opens.
    fn send(&mut self, command: Command);
    /// Close the current instance. Safe to call any number of times.
    fn close(&mut self);
    /// Instance currently owned, if any.
    fn current(&self) -> Option<ChannelId>;
}

struct Connection {
    id: ChannelId,
    outbound: UnboundedSender<Command>,
}

/// [`SimulationChannel`] over `tokio-tungstenite`.
///
/// `open()` spawns the connection task, so it must run inside a tokio runtime.
pub struct WsChannel {
    url: String,
    events: UnboundedSender<ChannelEvent>,
    next_id: u64,
    active: Option<Connection>,
}

impl fmt::Debug for WsChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsChannel")
            .field("url", &self.url)
            .field("active", &self.current())
            .finish_non_exhaustive()
    }
}

impl WsChannel {
    /// Channel factory for `url`, plus the receiver all its events arrive on.
    pub fn new(url: impl Into<String>) -> (Self, UnboundedReceiver<ChannelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                url: url.into(),
                events,
                next_id: 0,
                active: None,
            },
            rx,
        )
    }

    /// Endpoint this factory connects to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SimulationChannel for WsChannel {
    fn open(&mut self) -> ChannelId {
        self.close();
        self.next_id += 1;
        let id = ChannelId(self.next_id);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(
            id,
            self.url.clone(),
            outbound_rx,
            self.events.clone(),
        ));
        info!(channel = %id, url = %self.url, "opening simulation channel");
        self.active = Some(Connection { id, outbound });
        id
    }

    fn send(&mut self, command: Command) {
        match &self.active {
            Some(conn) => {
                trace!(channel = %conn.id, action = command.action(), "queue command");
                if conn.outbound.send(command).is_err() {
                    warn!(channel = %conn.id, "connection task ended; command dropped");
                }
            }
            None => warn!(action = command.action(), "no open channel; command dropped"),
        }
    }

    fn close(&mut self) {
        // Dropping the sender makes the task send a close frame and exit.
        if let Some(conn) = self.active.take() {
            debug!(channel = %conn.id, "closing simulation channel");
        }
    }

    fn current(&self) -> Option<ChannelId> {
        self.active.as_ref().map(|c| c.id)
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    id: ChannelId,
    url: String,
    mut outbound: UnboundedReceiver<Command>,
    events: UnboundedSender<ChannelEvent>,
) {
    let emit = |kind: ChannelEventKind| {
        // Receiver gone means the owner is gone too; nothing left to tell.
        let _ = events.send(ChannelEvent::new(id, kind));
    };

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            warn!(channel = %id, %err, "channel connect failed");
            emit(ChannelEventKind::Error(format!("connect failed: {err}")));
            emit(ChannelEventKind::Closed);
            return;
        }
    };
    debug!(channel = %id, "channel open");
    emit(ChannelEventKind::Opened);

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            cmd = outbound.recv() => {
                let Some(cmd) = cmd else {
                    let _ = sink.close().await;
                    break;
                };
                let text = match encode_command(&cmd) {
                    Ok(text) => text,
                    Err(err) => {
                        emit(ChannelEventKind::Error(format!("encode failed: {err}")));
                        continue;
                    }
                };
                trace!(channel = %id, frame = %text, "send");
                if let Err(err) = sink.send(WsMessage::Text(text.into())).await {
                    warn!(channel = %id, %err, "channel send failed");
                    emit(ChannelEventKind::Error(format!("send failed: {err}")));
                    break;
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        emit(ChannelEventKind::Message(decode_event(text.as_str())));
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        let inbound = match std::str::from_utf8(&bytes) {
                            Ok(text) => decode_event(text),
                            Err(_) => Inbound::Unrecognized {
                                tag: None,
                                reason: "binary frame is not utf-8".into(),
                            },
                        };
                        emit(ChannelEventKind::Message(inbound));
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(channel = %id, %err, "channel receive failed");
                        emit(ChannelEventKind::Error(format!("receive failed: {err}")));
                        break;
                    }
                }
            }
        }
    }
    debug!(channel = %id, "channel closed");
    emit(ChannelEventKind::Closed);
}
