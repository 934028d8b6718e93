// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command wiring
//!
//! Builds the engine from CLI arguments and drives it. The heavy lifting
//! lives in the library crates; this module only assembles them.

use crate::output::print_event;
use crate::{Backend, LimitArgs, RunArgs};
use anyhow::{Context, Result};
use ralph_adapters::{build_runner, BackendConfig, CliConfig, RemoteConfig};
use ralph_core::{Observer, SystemClock};
use ralph_engine::{CircuitBreaker, ControllerConfig, LoopController, RateLimiter};
use ralph_storage::StateStore;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run_loop(
    project: &Path,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let project = project
        .canonicalize()
        .with_context(|| format!("project directory {} not found", project.display()))?;
    let store = StateStore::new(&project);

    let backend = match args.backend {
        Backend::Cli => BackendConfig::Cli(CliConfig {
            binary: args.binary.clone(),
            project_dir: project.clone(),
            timeout: args.timeout(),
        }),
        Backend::Remote => BackendConfig::Remote(RemoteConfig {
            server_url: args.server_url.clone(),
            username: args.username.clone(),
            password: std::env::var("RALPH_SERVER_PASSWORD").ok(),
            model_id: args.model.clone(),
            timeout: args.timeout(),
            ..RemoteConfig::default()
        }),
    };
    let runner = build_runner(backend, store.clone());

    let limiter = RateLimiter::load(
        store.clone(),
        SystemClock,
        args.limit.max_calls,
        args.limit.window_hours,
    )?;
    let breaker = CircuitBreaker::load(
        store.clone(),
        SystemClock,
        args.no_progress_threshold,
        args.same_error_threshold,
    )?;

    let observer: Observer = Arc::new(print_event);
    let mut controller = LoopController::new(
        ControllerConfig {
            project_dir: project,
            max_loops: args.max_loops,
            auto_sync: args.auto_sync,
        },
        runner,
        limiter,
        breaker,
        store,
        observer,
    );

    controller.run(&cancel).await?;
    Ok(())
}

/// One-shot preflight: what `run` would decide right now, without ever
/// invoking the agent.
pub fn print_status(project: &Path, args: &LimitArgs) -> Result<()> {
    let store = StateStore::new(project);
    let limiter = RateLimiter::load(store.clone(), SystemClock, args.max_calls, args.window_hours)?;
    let breaker = CircuitBreaker::load(store.clone(), SystemClock, 3, 5)?;

    // A controller exists here only for its preflight; the runner is
    // never invoked.
    let runner = build_runner(
        BackendConfig::Cli(CliConfig {
            binary: "codex".to_string(),
            project_dir: project.to_path_buf(),
            timeout: None,
        }),
        store.clone(),
    );
    let observer: Observer = Arc::new(|_| {});
    let controller = LoopController::new(
        ControllerConfig {
            project_dir: project.to_path_buf(),
            max_loops: u64::MAX,
            auto_sync: false,
        },
        runner,
        limiter,
        breaker,
        store.clone(),
        observer,
    );

    let summary = controller.preflight()?;
    println!("mode:            {}", summary.mode);
    println!(
        "plan:            {}",
        summary.plan_file.as_deref().unwrap_or("(none)")
    );
    println!(
        "tasks:           {} total, {} remaining",
        summary.total_tasks, summary.remaining_count
    );
    for task in &summary.first_remaining {
        println!("  - {task}");
    }
    println!("circuit breaker: {}", summary.circuit_state);
    println!(
        "rate limit:      {} calls remaining",
        summary.calls_remaining
    );
    println!("exit signals:    {:?}", store.load_exit_signals()?);
    if summary.should_skip || controller.should_continue() {
        let reason = summary.skip_reason.as_deref().unwrap_or("stop condition met");
        println!("would run:       no ({reason})");
    } else {
        println!("would run:       yes");
    }
    Ok(())
}

pub async fn wait_for_reset(
    project: &Path,
    args: &LimitArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let store = StateStore::new(project);
    let limiter = RateLimiter::load(store, SystemClock, args.max_calls, args.window_hours)?;

    if limiter.can_call() {
        println!("rate limit not exhausted ({} calls left)", limiter.calls_remaining());
        return Ok(());
    }

    limiter
        .wait_for_reset(&cancel, |remaining| {
            println!("rate-limit window resets in {}s", remaining.as_secs());
        })
        .await;
    Ok(())
}

pub fn reset(project: &Path) -> Result<()> {
    let store = StateStore::new(project);
    let mut breaker = CircuitBreaker::load(store.clone(), SystemClock, 3, 5)?;
    breaker.reset()?;
    store.clear_session_id()?;
    let removed = store.cleanup()?;
    println!("breaker closed, session cleared, {removed} temp files removed");
    Ok(())
}
