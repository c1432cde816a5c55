// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `isa-ide`: drive an ISA simulator session from the terminal.
//!
//! Assembles a source file, opens the simulation channel, and steps or runs
//! the program, printing the trace and the final machine state.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use isa_app_core::{config::ClientConfig, notice::NoticeKind, state_view::DisplayModel};
use isa_session_client::{
    drive_until, AssembleClient, ChannelEvent, HttpAssembleClient, LiveSession, SessionController,
    SessionStatus, WsChannel,
};
use isa_session_proto::DEFAULT_MAX_STEPS;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "ISA simulator IDE session driver")]
struct Args {
    /// Assemble service base URL (overrides ISA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Simulation channel URL (overrides ISA_WS_URL)
    #[arg(long, global = true)]
    ws_url: Option<String>,
    /// Seconds to wait on the simulator at each stage
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Subcommand, Debug)]
enum Cmd {
    /// Probe the service root
    Info,
    /// Print the effective endpoint configuration
    Config,
    /// Assemble a file and print the machine words
    Assemble {
        /// Assembly source file
        file: PathBuf,
    },
    /// Assemble, load, and single-step
    Step {
        /// Assembly source file
        file: PathBuf,
        /// Instructions to execute
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Assemble, load, and run to completion
    Run {
        /// Assembly source file
        file: PathBuf,
        /// Upper bound on executed instructions
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,
        /// Breakpoint address (decimal or 0x-prefixed hex); repeatable
        #[arg(long = "break", value_parser = parse_address)]
        breakpoints: Vec<i64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env().with_overrides(args.api_url, args.ws_url);
    config.validate().context("invalid endpoint configuration")?;
    let wait = Duration::from_secs(args.timeout_secs);
    debug!(?config, "effective configuration");

    match args.cmd {
        Cmd::Info => {
            let client = HttpAssembleClient::new(&config)?;
            let info = client
                .service_info()
                .await
                .with_context(|| format!("probe {}", config.info_url()))?;
            println!("{} {}", info.message, info.version);
        }
        Cmd::Config => println!("{}", config.to_json()?),
        Cmd::Assemble { file } => {
            let source = read_source(&file)?;
            let result = HttpAssembleClient::new(&config)?
                .post_assemble(&source)
                .await;
            if !result.success {
                print_errors(&result.errors);
                bail!("assembly failed with {} error(s)", result.errors.len());
            }
            for (i, word) in result.binary.iter().enumerate() {
                println!("{:>4}: 0x{word:04X}", i * 2);
            }
        }
        Cmd::Step { file, count } => {
            let (mut session, mut events) = open_session(&config, &file, wait).await?;
            for _ in 0..count {
                let rev = session.revision();
                let notices = session.notices().len();
                if !session.step() {
                    bail!("session not ready to step ({:?})", session.status());
                }
                wait_for(&mut session, &mut events, wait, "step", |s| {
                    s.revision() > rev || s.notices().len() > notices || !can_continue(s)
                })
                .await?;
                if let Some(line) = session.trace().entries().last() {
                    println!("{line}");
                }
                if session.state().is_some_and(|st| st.halted) {
                    info!("program halted");
                    break;
                }
            }
            print_display(&session.display());
            finish(&mut session)?;
        }
        Cmd::Run {
            file,
            max_steps,
            breakpoints,
        } => {
            let (mut session, mut events) = open_session(&config, &file, wait).await?;
            for address in breakpoints {
                if !session.set_breakpoint(address) {
                    bail!("session not ready for breakpoints ({:?})", session.status());
                }
                wait_for(&mut session, &mut events, wait, "breakpoint ack", |s| {
                    s.breakpoints().contains(&address) || !can_continue(s)
                })
                .await?;
            }
            if !session.run(max_steps) {
                bail!("session not ready to run ({:?})", session.status());
            }
            wait_for(&mut session, &mut events, wait, "run to complete", |s| {
                !s.is_running()
            })
            .await?;
            for line in session.trace() {
                println!("{line}");
            }
            print_display(&session.display());
            finish(&mut session)?;
        }
    }

    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Assemble `file` and wait until the program is loaded.
async fn open_session(
    config: &ClientConfig,
    file: &Path,
    wait: Duration,
) -> Result<(LiveSession, UnboundedReceiver<ChannelEvent>)> {
    let source = read_source(file)?;
    let (channel, mut events) = WsChannel::new(config.ws_url.clone());
    let mut session = SessionController::new(HttpAssembleClient::new(config)?, channel);

    let rev = session.revision();
    session.assemble(&source).await;
    if session.status() != SessionStatus::Connecting {
        print_errors(session.errors());
        bail!("assembly failed with {} error(s)", session.errors().len());
    }
    info!(words = session.binary().len(), "assembled");

    // One snapshot for the Reset reply, one for the Load reply.
    wait_for(&mut session, &mut events, wait, "program load", |s| {
        s.revision() >= rev + 2 || s.active_channel().is_none()
    })
    .await?;
    if session.status() != SessionStatus::Ready {
        let reason = session
            .notices()
            .latest()
            .map_or_else(|| "channel closed".to_owned(), |n| n.message.clone());
        bail!("could not load program: {reason}");
    }
    Ok((session, events))
}

fn can_continue(session: &LiveSession) -> bool {
    session.status() == SessionStatus::Ready
}

async fn wait_for<F>(
    session: &mut LiveSession,
    events: &mut UnboundedReceiver<ChannelEvent>,
    wait: Duration,
    what: &str,
    done: F,
) -> Result<()>
where
    F: FnMut(&LiveSession) -> bool,
{
    let finished = time::timeout(wait, drive_until(session, events, done))
        .await
        .with_context(|| format!("timed out waiting for {what}"))?;
    if !finished {
        bail!("channel event stream ended while waiting for {what}");
    }
    Ok(())
}

/// Report surfaced notices and close the channel. Errors fail the command.
fn finish(session: &mut LiveSession) -> Result<()> {
    let mut errors = Vec::new();
    for notice in session.notices().all() {
        match notice.kind {
            NoticeKind::Error => errors.push(notice.message.clone()),
            NoticeKind::Warn => eprintln!("warning: {}", notice.message),
        }
    }
    session.teardown();
    if errors.is_empty() {
        return Ok(());
    }
    print_errors(&errors);
    bail!("simulator reported {} error(s)", errors.len());
}

fn print_errors(errors: &[String]) {
    for err in errors {
        eprintln!("error: {err}");
    }
}

fn print_display(model: &DisplayModel) {
    if !model.has_state {
        println!("(no state)");
        return;
    }
    println!();
    for row in model.registers.chunks(4) {
        let cells: Vec<String> = row
            .iter()
            .map(|r| format!("{:<3} = {:>6} ({})", r.name, r.value, r.hex))
            .collect();
        println!("{}", cells.join("   "));
    }
    let flags: Vec<String> = model
        .flags
        .iter()
        .map(|f| format!("{}={}", f.name, u8::from(f.set)))
        .collect();
    println!("flags: {}", flags.join(" "));
    println!(
        "pc: {}  cycles: {}  instructions: {}  halted: {}",
        model.pc_hex,
        model.cycle_count,
        model.instruction_count,
        if model.halted { "yes" } else { "no" }
    );
    for row in &model.memory {
        println!("{}: {}", row.label, row.hex_bytes().join(" "));
    }
}

fn parse_address(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    let parsed = match raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    match parsed {
        Ok(addr) if addr >= 0 => Ok(addr),
        Ok(_) => Err(format!("address must not be negative: {raw}")),
        Err(err) => Err(format!("invalid address `{raw}`: {err}")),
    }
}
