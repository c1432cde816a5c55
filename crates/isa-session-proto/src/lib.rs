// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session wire schema for the ISA simulator service.
//!
//! Two surfaces share these types: the request/response assemble endpoint and
//! the streaming simulation channel. Channel frames are single JSON objects,
//! tagged by `action` (client → server) or `type` (server → client); see
//! [`wire`] for framing helpers.

use serde::{Deserialize, Serialize};

pub mod wire;

/// Step budget the IDE uses for a full run.
pub const DEFAULT_MAX_STEPS: u64 = 10_000;

/// Load address used for freshly assembled programs.
pub const DEFAULT_START_ADDRESS: i64 = 0;

/// Number of general purpose registers the simulator reports.
pub const REGISTER_COUNT: usize = 16;

/// Body of `POST /assemble`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssembleRequest {
    /// Assembly source text, passed through untouched.
    pub source: String,
}

/// Outcome of one assemble call.
///
/// `binary` holds one machine word per instruction; `errors` is the
/// assembler's diagnostics in source order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssembleResult {
    /// True when the source assembled without diagnostics.
    pub success: bool,
    /// Assembled machine words.
    #[serde(default)]
    pub binary: Vec<i64>,
    /// Diagnostics, verbatim from the assembler.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AssembleResult {
    /// Failed result carrying a single synthetic diagnostic.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            binary: Vec::new(),
            errors: vec![message.into()],
        }
    }
}

/// Response of the service root probe (`GET /`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Human readable service name.
    pub message: String,
    /// Service version string.
    pub version: String,
}

/// Condition flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flags {
    /// Zero.
    #[serde(rename = "Z")]
    pub z: bool,
    /// Negative.
    #[serde(rename = "N")]
    pub n: bool,
    /// Carry.
    #[serde(rename = "C")]
    pub c: bool,
}

/// Authoritative simulator snapshot as sent by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatorState {
    /// Register file, R0 first.
    pub registers: Vec<i64>,
    /// Program counter.
    pub pc: i64,
    /// Condition flags.
    pub flags: Flags,
    /// Memory prefix (the server may truncate it).
    pub memory: Vec<u8>,
    /// Cycles elapsed since the last load or reset.
    pub cycle_count: u64,
    /// Instructions retired since the last load or reset.
    pub instruction_count: u64,
    /// True once the program executed HALT.
    pub halted: bool,
}

/// Client → server channel command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Reinitialise the simulator.
    Reset,
    /// Load a program image.
    Load {
        /// Machine words to place in memory.
        binary: Vec<i64>,
        /// Byte address of the first word.
        start_address: i64,
    },
    /// Execute a single instruction.
    Step,
    /// Execute until halt, breakpoint or `max_steps`.
    Run {
        /// Upper bound on executed instructions.
        max_steps: u64,
    },
    /// Add a breakpoint.
    SetBreakpoint {
        /// PC value to stop at.
        address: i64,
    },
    /// Remove a breakpoint.
    ClearBreakpoint {
        /// Address to remove.
        address: i64,
    },
}

impl Command {
    /// Load a program at [`DEFAULT_START_ADDRESS`].
    pub fn load(binary: Vec<i64>) -> Self {
        Command::Load {
            binary,
            start_address: DEFAULT_START_ADDRESS,
        }
    }

    /// Wire `action` tag for this command.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Reset => "reset",
            Command::Load { .. } => "load",
            Command::Step => "step",
            Command::Run { .. } => "run",
            Command::SetBreakpoint { .. } => "set_breakpoint",
            Command::ClearBreakpoint { .. } => "clear_breakpoint",
        }
    }
}

/// Server → client channel event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Incremental state push (after reset, load or step).
    #[serde(rename = "state")]
    StateUpdate {
        /// New snapshot.
        state: SimulatorState,
        /// Trace line of the executed instruction, when one ran.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },
    /// A run finished; carries the whole trace of that run.
    Complete {
        /// Snapshot after the run.
        state: SimulatorState,
        /// Every trace line produced by the run.
        trace_log: Vec<String>,
    },
    /// Server-side failure while handling a command.
    Error {
        /// Diagnostic text.
        message: String,
    },
    /// Breakpoint acknowledged.
    BreakpointSet {
        /// Address that now has a breakpoint.
        address: i64,
    },
    /// Breakpoint removal acknowledged.
    BreakpointCleared {
        /// Address that no longer has a breakpoint.
        address: i64,
    },
}

impl ServerEvent {
    /// Wire `type` tag for this event.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerEvent::StateUpdate { .. } => "state",
            ServerEvent::Complete { .. } => "complete",
            ServerEvent::Error { .. } => "error",
            ServerEvent::BreakpointSet { .. } => "breakpoint_set",
            ServerEvent::BreakpointCleared { .. } => "breakpoint_cleared",
        }
    }
}
