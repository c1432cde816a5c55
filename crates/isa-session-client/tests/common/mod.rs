// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process fake of the simulator service (assemble + streaming channel).

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use isa_app_core::config::ClientConfig;
use isa_session_proto::{
    wire::{decode_command, encode_event},
    AssembleRequest, AssembleResult, Command, Flags, ServerEvent, ServiceInfo, SimulatorState,
};

/// Commands the fake simulator received, in arrival order.
pub type Received = Arc<Mutex<Vec<Command>>>;

pub struct FakeService {
    pub addr: SocketAddr,
    pub received: Received,
}

impl FakeService {
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_url: format!("http://{}", self.addr),
            ws_url: format!("ws://{}/ws/simulate", self.addr),
        }
    }

    pub fn received(&self) -> Vec<Command> {
        self.received.lock().unwrap().clone()
    }
}

pub async fn spawn() -> FakeService {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/", get(info))
        .route("/assemble", post(assemble))
        .route("/broken/assemble", post(|| async { "not json" }))
        .route("/ws/simulate", get(ws_handler))
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeService { addr, received }
}

/// Address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "ISA Simulator API".into(),
        version: "1.0.0".into(),
    })
}

/// `HALT` assembles to 0, everything else to 17; `FOO` is an error.
async fn assemble(Json(req): Json<AssembleRequest>) -> Json<AssembleResult> {
    let mut binary = Vec::new();
    let mut errors = Vec::new();
    for line in req.source.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.split_whitespace().next() {
            Some("HALT") => binary.push(0),
            Some("FOO") => errors.push("unknown opcode FOO".to_owned()),
            _ => binary.push(17),
        }
    }
    Json(AssembleResult {
        success: errors.is_empty(),
        binary,
        errors,
    })
}

async fn ws_handler(State(received): State<Received>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| simulate(socket, received))
}

struct Machine {
    program: Vec<i64>,
    pc: i64,
    steps: u64,
}

impl Machine {
    fn snapshot(&self) -> SimulatorState {
        let mut memory = vec![0u8; 64];
        for (slot, word) in memory.iter_mut().step_by(2).zip(&self.program) {
            *slot = (*word & 0xFF) as u8;
        }
        SimulatorState {
            registers: vec![0; 16],
            pc: self.pc,
            flags: Flags::default(),
            memory,
            cycle_count: self.steps,
            instruction_count: self.steps,
            halted: self.pc as usize >= self.program.len() * 2,
        }
    }

    fn step(&mut self) -> String {
        let line = format!("PC={}", self.pc / 2);
        self.pc += 2;
        self.steps += 1;
        line
    }
}

async fn simulate(mut socket: WebSocket, received: Received) {
    let mut m = Machine {
        program: Vec::new(),
        pc: 0,
        steps: 0,
    };
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let cmd = match decode_command(text.as_str()) {
            Ok(cmd) => cmd,
            Err(err) => {
                let ev = ServerEvent::Error {
                    message: err.to_string(),
                };
                let _ = socket
                    .send(Message::Text(encode_event(&ev).unwrap().into()))
                    .await;
                continue;
            }
        };
        received.lock().unwrap().push(cmd.clone());

        let mut frames = Vec::new();
        match cmd {
            Command::Reset => {
                m.pc = 0;
                m.steps = 0;
                frames.push(state(&m, None));
            }
            Command::Load { binary, .. } => {
                m.program = binary;
                m.pc = 0;
                m.steps = 0;
                frames.push(state(&m, None));
            }
            Command::Step => {
                let line = m.step();
                frames.push(state(&m, Some(line)));
            }
            Command::Run { max_steps } => {
                frames.push(r#"{"type":"telemetry","cpu":0.5}"#.to_owned());
                let mut log = Vec::new();
                while !m.snapshot().halted && (log.len() as u64) < max_steps {
                    log.push(m.step());
                }
                let ev = ServerEvent::Complete {
                    state: m.snapshot(),
                    trace_log: log,
                };
                frames.push(encode_event(&ev).unwrap());
            }
            Command::SetBreakpoint { address } => {
                frames.push(encode_event(&ServerEvent::BreakpointSet { address }).unwrap());
            }
            Command::ClearBreakpoint { address } => {
                frames.push(encode_event(&ServerEvent::BreakpointCleared { address }).unwrap());
            }
        }
        for frame in frames {
            if socket.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
    }
}

fn state(m: &Machine, trace: Option<String>) -> String {
    encode_event(&ServerEvent::StateUpdate {
        state: m.snapshot(),
        trace,
    })
    .unwrap()
}
