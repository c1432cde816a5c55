// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session controller: sequences assemble → open → reset → load → step/run.
//!
//! The controller exclusively owns the simulation channel. Reset and Load are
//! queued when a channel is opened and flushed only when that channel reports
//! `Opened`; user commands are accepted only after the flush. Channel events
//! carry the id of the instance that produced them and anything from a
//! superseded instance is dropped.

use std::collections::{BTreeSet, VecDeque};

use isa_app_core::{
    notice::{NoticeBoard, NoticeSource},
    state_view::{self, DisplayModel},
    trace_log::TraceLog,
};
use isa_session_proto::{wire::Inbound, Command, ServerEvent, SimulatorState};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::assemble::AssembleClient;
use crate::channel::{ChannelEvent, ChannelEventKind, ChannelId, SimulationChannel};

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No usable channel; assemble to start.
    Idle,
    /// Waiting on the assemble service.
    Assembling,
    /// Channel requested; Reset/Load queued until it opens.
    Connecting,
    /// Program loaded; Step/Run accepted.
    Ready,
    /// A Run is in flight; Step/Run rejected until it completes or fails.
    Running,
}

/// Drives one IDE session against the assemble service and a simulation channel.
#[derive(Debug)]
pub struct SessionController<A, C> {
    assembler: A,
    channel: C,
    status: SessionStatus,
    active: Option<ChannelId>,
    pending: VecDeque<Command>,
    binary: Vec<i64>,
    errors: Vec<String>,
    state: Option<SimulatorState>,
    revision: u64,
    trace: TraceLog,
    breakpoints: BTreeSet<i64>,
    notices: NoticeBoard,
    torn_down: bool,
}

impl<A, C> SessionController<A, C>
where
    A: AssembleClient,
    C: SimulationChannel,
{
    /// Fresh, idle controller.
    pub fn new(assembler: A, channel: C) -> Self {
        Self {
            assembler,
            channel,
            status: SessionStatus::Idle,
            active: None,
            pending: VecDeque::new(),
            binary: Vec::new(),
            errors: Vec::new(),
            state: None,
            revision: 0,
            trace: TraceLog::new(),
            breakpoints: BTreeSet::new(),
            notices: NoticeBoard::default(),
            torn_down: false,
        }
    }

    /// Assemble `source` and, on success, open a fresh channel with Reset and
    /// Load queued. Only accepted from `Idle` or `Ready`; returns whether the
    /// call was accepted (not whether assembly succeeded).
    pub async fn assemble(&mut self, source: &str) -> bool {
        if self.torn_down || !matches!(self.status, SessionStatus::Idle | SessionStatus::Ready) {
            debug!(status = ?self.status, "assemble rejected");
            return false;
        }
        self.trace.clear();
        self.state = None;
        self.status = SessionStatus::Assembling;

        let result = self.assembler.post_assemble(source).await;
        self.binary = result.binary;
        self.errors = result.errors;

        if !result.success {
            info!(errors = self.errors.len(), "assemble failed");
            self.status = SessionStatus::Idle;
            return true;
        }

        info!(words = self.binary.len(), "assembled; opening channel");
        if self.active.take().is_some() {
            self.channel.close();
        }
        self.pending.clear();
        self.pending.push_back(Command::Reset);
        self.pending.push_back(Command::load(self.binary.clone()));
        self.breakpoints.clear();
        self.trace.clear();
        self.status = SessionStatus::Connecting;
        self.active = Some(self.channel.open());
        true
    }

    /// Execute one instruction. Only sends in `Ready` with a snapshot held.
    pub fn step(&mut self) -> bool {
        if !self.can_command() {
            debug!(status = ?self.status, "step rejected");
            return false;
        }
        self.channel.send(Command::Step);
        true
    }

    /// Run up to `max_steps` instructions. Only sends in `Ready` with a
    /// snapshot held; moves to `Running` and clears the trace.
    pub fn run(&mut self, max_steps: u64) -> bool {
        if !self.can_command() {
            debug!(status = ?self.status, "run rejected");
            return false;
        }
        self.status = SessionStatus::Running;
        self.trace.clear();
        self.channel.send(Command::Run { max_steps });
        true
    }

    /// Reset the simulator. Accepted whenever a channel is open; clears the
    /// trace, the held state and `Running` without waiting for the server.
    pub fn reset(&mut self) -> bool {
        if self.torn_down || self.active.is_none() || self.status == SessionStatus::Connecting {
            debug!(status = ?self.status, "reset rejected");
            return false;
        }
        self.channel.send(Command::Reset);
        self.trace.clear();
        self.state = None;
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Ready;
        }
        true
    }

    /// Ask the simulator to stop at `address`. Only sends in `Ready`; the
    /// local set changes when the server acknowledges.
    pub fn set_breakpoint(&mut self, address: i64) -> bool {
        if !self.can_command() {
            return false;
        }
        self.channel.send(Command::SetBreakpoint { address });
        true
    }

    /// Ask the simulator to drop the breakpoint at `address`. Only sends in `Ready`.
    pub fn clear_breakpoint(&mut self, address: i64) -> bool {
        if !self.can_command() {
            return false;
        }
        self.channel.send(Command::ClearBreakpoint { address });
        true
    }

    /// Feed one channel event.
    pub fn handle_event(&mut self, event: ChannelEvent) {
        if self.torn_down {
            debug!(channel = %event.channel, "session torn down; event dropped");
            return;
        }
        if self.active != Some(event.channel) {
            debug!(channel = %event.channel, "event from superseded channel dropped");
            return;
        }
        match event.kind {
            ChannelEventKind::Opened => self.on_opened(event.channel),
            ChannelEventKind::Message(Inbound::Event(ev)) => self.apply_server_event(ev),
            ChannelEventKind::Message(Inbound::Unrecognized { tag, reason }) => {
                warn!(channel = %event.channel, ?tag, %reason, "unrecognized frame ignored");
            }
            ChannelEventKind::Error(message) => self.on_channel_error(event.channel, message),
            ChannelEventKind::Closed => self.on_closed(event.channel),
        }
    }

    /// End the session: close the channel once and ignore everything after.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(id) = self.active.take() {
            debug!(channel = %id, "teardown closing channel");
            self.channel.close();
        }
        self.pending.clear();
        self.status = SessionStatus::Idle;
    }

    fn can_command(&self) -> bool {
        !self.torn_down
            && self.active.is_some()
            && self.status == SessionStatus::Ready
            && self.state.is_some()
    }

    fn on_opened(&mut self, id: ChannelId) {
        if self.status != SessionStatus::Connecting {
            debug!(channel = %id, status = ?self.status, "duplicate open ignored");
            return;
        }
        debug!(channel = %id, queued = self.pending.len(), "channel opened; flushing");
        while let Some(cmd) = self.pending.pop_front() {
            self.channel.send(cmd);
        }
        self.status = SessionStatus::Ready;
    }

    fn apply_server_event(&mut self, event: ServerEvent) {
        debug!(event = event.type_name(), status = ?self.status, "server event");
        match event {
            ServerEvent::StateUpdate { state, trace } => {
                self.accept_state(state);
                if let Some(line) = trace {
                    self.trace.append(line);
                }
            }
            ServerEvent::Complete { state, trace_log } => {
                self.accept_state(state);
                self.trace.replace_all(trace_log);
                if self.status == SessionStatus::Running {
                    self.status = SessionStatus::Ready;
                }
            }
            ServerEvent::Error { message } => {
                warn!(%message, "simulator error");
                self.notices.error(NoticeSource::Simulator, message);
                if matches!(self.status, SessionStatus::Ready | SessionStatus::Running) {
                    self.status = self.fallback_status();
                }
            }
            ServerEvent::BreakpointSet { address } => {
                self.breakpoints.insert(address);
            }
            ServerEvent::BreakpointCleared { address } => {
                self.breakpoints.remove(&address);
            }
        }
    }

    fn accept_state(&mut self, state: SimulatorState) {
        self.state = Some(state);
        self.revision += 1;
        // An error dropped us to Idle; a fresh snapshot on a live channel recovers.
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Ready;
        }
    }

    fn on_channel_error(&mut self, id: ChannelId, message: String) {
        warn!(channel = %id, %message, "channel error");
        self.notices.error(NoticeSource::Channel, message);
        if matches!(
            self.status,
            SessionStatus::Connecting | SessionStatus::Ready | SessionStatus::Running
        ) {
            self.pending.clear();
            self.status = self.fallback_status();
        }
    }

    fn on_closed(&mut self, id: ChannelId) {
        info!(channel = %id, "channel closed");
        self.notices.warn(NoticeSource::Channel, "simulation channel closed");
        self.active = None;
        self.pending.clear();
        self.status = SessionStatus::Idle;
    }

    fn fallback_status(&self) -> SessionStatus {
        if self.state.is_some() {
            SessionStatus::Ready
        } else {
            SessionStatus::Idle
        }
    }
}

impl<A, C> SessionController<A, C> {
    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// True while a Run is in flight.
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Most recent snapshot, if one is held.
    pub fn state(&self) -> Option<&SimulatorState> {
        self.state.as_ref()
    }

    /// Number of snapshots accepted over the controller's lifetime.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Display projection of the most recent snapshot.
    pub fn display(&self) -> DisplayModel {
        state_view::project(self.state.as_ref())
    }

    /// Trace for the current channel.
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Diagnostics from the last assemble, verbatim.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Binary from the last assemble.
    pub fn binary(&self) -> &[i64] {
        &self.binary
    }

    /// Breakpoints the server has acknowledged on the current channel.
    pub fn breakpoints(&self) -> &BTreeSet<i64> {
        &self.breakpoints
    }

    /// Errors surfaced from the channel and the simulator.
    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Channel instance the controller currently owns.
    pub fn active_channel(&self) -> Option<ChannelId> {
        self.active
    }

    /// Underlying channel port.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// True once [`teardown`](SessionController::teardown) ran.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

/// Feed events from `events` into `controller` until `done` holds.
///
/// Returns `false` if the event stream ended first.
pub async fn drive_until<A, C, F>(
    controller: &mut SessionController<A, C>,
    events: &mut UnboundedReceiver<ChannelEvent>,
    mut done: F,
) -> bool
where
    A: AssembleClient,
    C: SimulationChannel,
    F: FnMut(&SessionController<A, C>) -> bool,
{
    while !done(controller) {
        match events.recv().await {
            Some(event) => controller.handle_event(event),
            None => return false,
        }
    }
    true
}
