// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ralph - autonomous development-loop supervisor

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod output;
mod wiring;

use clap::{Parser, Subcommand};
use ralph_engine::LoopError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "ralph",
    version,
    about = "Ralph - run a coding agent against your plan until the work is done"
)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long = "project", global = true, value_name = "DIR")]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the development loop
    Run(RunArgs),
    /// Show the preflight summary without invoking the agent
    Status(LimitArgs),
    /// Block until the rate-limit window resets
    Wait(LimitArgs),
    /// Reset the circuit breaker and forget the agent session
    Reset,
}

#[derive(clap::Args, Clone)]
struct RunArgs {
    /// Maximum number of iterations
    #[arg(long, default_value_t = 50)]
    max_loops: u64,

    #[command(flatten)]
    limit: LimitArgs,

    /// Halt after this many iterations without file changes
    #[arg(long, default_value_t = 3)]
    no_progress_threshold: u32,

    /// Halt after this many repeats of the same error
    #[arg(long, default_value_t = 5)]
    same_error_threshold: u32,

    /// Auto-mark tasks whose referenced files already exist
    #[arg(long)]
    auto_sync: bool,

    /// Agent backend
    #[arg(long, value_enum, default_value_t = Backend::Cli)]
    backend: Backend,

    /// Agent binary for the cli backend
    #[arg(long, default_value = "codex")]
    binary: String,

    /// Server URL for the remote backend (omit to launch a managed server)
    #[arg(long)]
    server_url: Option<String>,

    /// Basic-auth username for the remote backend
    #[arg(long)]
    username: Option<String>,

    /// Model identifier for the remote backend
    #[arg(long, default_value = "gpt-5-codex")]
    model: String,

    /// Per-iteration timeout in seconds (0 = unbounded)
    #[arg(long, default_value_t = 1800)]
    timeout_secs: u64,
}

#[derive(clap::Args, Clone)]
struct LimitArgs {
    /// Maximum agent calls per window
    #[arg(long, default_value_t = 100)]
    max_calls: u32,

    /// Window length in hours (0 = lifetime cap)
    #[arg(long, default_value_t = 5)]
    window_hours: i64,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Backend {
    Cli,
    Remote,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let project = cli
        .project
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Command::Run(ref args) => wiring::run_loop(&project, args, cancel_on_ctrl_c()).await,
        Command::Status(ref args) => wiring::print_status(&project, args),
        Command::Wait(ref args) => wiring::wait_for_reset(&project, args, cancel_on_ctrl_c()).await,
        Command::Reset => wiring::reset(&project),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ralph: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Breaker-open gets its own exit code so wrappers can tell "needs an
/// operator reset" from ordinary failure.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LoopError>() {
        Some(LoopError::BreakerOpen) => 2,
        _ => 1,
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("RALPH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// One cancellation token for the whole process, fired by ctrl-c.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            trigger.cancel();
        }
    });
    token
}

impl RunArgs {
    fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
