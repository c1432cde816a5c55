// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client for the ISA simulator service: HTTP assemble client, WebSocket
//! simulation channel, and the session controller that sequences them.

pub mod assemble;
pub mod channel;
pub mod controller;

pub use assemble::{AssembleClient, AssembleError, HttpAssembleClient};
pub use channel::{ChannelEvent, ChannelEventKind, ChannelId, SimulationChannel, WsChannel};
pub use controller::{drive_until, SessionController, SessionStatus};

/// Controller wired to the real transports.
pub type LiveSession = SessionController<HttpAssembleClient, WsChannel>;
