// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loop controller
//!
//! Owns the iteration state machine: preflight gating, prompt assembly,
//! the agent invocation, result recording, and the continue/stop decision.
//! At most one agent invocation is in flight at any time; all blocking
//! points are cancellation-aware.

use crate::breaker::CircuitBreaker;
use crate::prompt::{context_injection, truncate_summary, InjectionArgs};
use crate::rate_limiter::RateLimiter;
use crate::LoopError;
use ralph_adapters::{AgentRunner, RunnerError};
use ralph_core::{
    analyze, AgentEvent, AgentStatus, Clock, LogLevel, LoopEvent, Observer, PreflightSummary,
    ToolCallStatus,
};
use ralph_plan::{remaining, PlanError, PlanStore, AUTO_MARK_CONFIDENCE};
use ralph_storage::StateStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll cadence while paused.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Back-off after a failed iteration.
const RETRY_SLEEP: Duration = Duration::from_secs(5);

/// Cap on the carried-forward summary.
const SUMMARY_MAX_CHARS: usize = 200;

/// Confidence at which a COMPLETE status stops the loop.
const STOP_CONFIDENCE: f64 = 0.9;

const SKIP_NO_PLAN: &str = "No plan file found";
const SKIP_ALL_DONE: &str = "All tasks complete";
const SKIP_BREAKER_OPEN: &str = "Circuit breaker is OPEN";
const SKIP_RATE_LIMIT: &str = "Rate limit reached";

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub project_dir: PathBuf,
    pub max_loops: u64,
    /// Scan the plan for filesystem evidence before each iteration.
    pub auto_sync: bool,
}

/// Shared pause toggle for the dashboard.
#[derive(Clone)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The iteration engine.
pub struct LoopController<R: AgentRunner, C: Clock> {
    config: ControllerConfig,
    runner: R,
    limiter: RateLimiter<C>,
    breaker: CircuitBreaker<C>,
    plans: PlanStore,
    store: StateStore,
    observer: Observer,
    paused: Arc<AtomicBool>,
    loop_num: u64,
    last_summary: String,
    should_stop: bool,
}

impl<R: AgentRunner, C: Clock> LoopController<R, C> {
    pub fn new(
        config: ControllerConfig,
        runner: R,
        limiter: RateLimiter<C>,
        breaker: CircuitBreaker<C>,
        store: StateStore,
        observer: Observer,
    ) -> Self {
        // The runner gets only a callback, never a controller reference.
        let forward = observer.clone();
        runner.set_observer(Arc::new(move |event| forward(map_agent_event(event))));

        let plans = PlanStore::new(&config.project_dir);
        Self {
            config,
            runner,
            limiter,
            breaker,
            plans,
            store,
            observer,
            paused: Arc::new(AtomicBool::new(false)),
            loop_num: 0,
            last_summary: String::new(),
            should_stop: false,
        }
    }

    /// Completed iteration count.
    pub fn loop_num(&self) -> u64 {
        self.loop_num
    }

    pub fn last_summary(&self) -> &str {
        &self.last_summary
    }

    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter<C> {
        &self.limiter
    }

    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle(Arc::clone(&self.paused))
    }

    /// 1-based loop number for events and the context injection.
    fn display_loop(&self) -> u64 {
        self.loop_num + 1
    }

    fn emit(&self, event: LoopEvent) {
        (self.observer)(event);
    }

    /// Run the loop to completion.
    ///
    /// Returns `Ok` on every orderly stop (all done, max loops, rate
    /// limit, cancellation) and `Err` only for [`LoopError::BreakerOpen`]
    /// or a broken project/state setup.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), LoopError> {
        if let Err(e) = self.store.cleanup() {
            tracing::warn!(error = %e, "temp-file cleanup failed");
        }
        self.emit(LoopEvent::LoopUpdate {
            loop_num: self.display_loop(),
            message: "starting".to_string(),
        });

        loop {
            if cancel.is_cancelled() {
                self.shutdown().await;
                return Ok(());
            }
            if self.should_stop {
                self.emit(LoopEvent::Outcome {
                    loop_num: self.loop_num,
                    success: true,
                    message: "complete".to_string(),
                });
                return Ok(());
            }
            if self.paused.load(Ordering::SeqCst) {
                sleep_cancellable(PAUSE_POLL, cancel).await;
                continue;
            }

            let summary = self.preflight()?;
            self.emit(LoopEvent::Preflight {
                summary: summary.clone(),
            });
            if summary.should_skip {
                let reason = summary.skip_reason.unwrap_or_default();
                if reason == SKIP_BREAKER_OPEN {
                    self.emit(LoopEvent::Outcome {
                        loop_num: self.loop_num,
                        success: false,
                        message: reason,
                    });
                    return Err(LoopError::BreakerOpen);
                }
                self.emit(LoopEvent::Outcome {
                    loop_num: self.loop_num,
                    success: true,
                    message: reason,
                });
                return Ok(());
            }

            match self.iterate(cancel).await {
                Ok(()) => {
                    self.loop_num += 1;
                }
                Err(LoopError::Cancelled) => {
                    self.shutdown().await;
                    return Ok(());
                }
                Err(e) => {
                    // Transient agent failures never kill the supervisor.
                    tracing::error!(error = %e, loop_num = self.display_loop(), "iteration failed");
                    self.emit(LoopEvent::Log {
                        level: LogLevel::Error,
                        message: format!("iteration failed: {e}"),
                    });
                    sleep_cancellable(RETRY_SLEEP, cancel).await;
                    self.loop_num += 1;
                }
            }
        }
    }

    /// The pre-iteration gate. Pure with respect to the rate limiter and
    /// breaker, and never invokes the agent.
    pub fn preflight(&self) -> Result<PreflightSummary, LoopError> {
        let mode = self.plans.mode();
        let plan = match self.plans.load_plan() {
            Ok(loaded) => Some(loaded),
            Err(PlanError::NoPlan(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let (total_tasks, left, plan_file) = match &plan {
            Some((tasks, path)) => (
                tasks.len(),
                remaining(tasks),
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string()),
            ),
            None => (0, Vec::new(), None),
        };

        let first_remaining: Vec<String> =
            left.iter().take(5).map(|t| t.text.clone()).collect();

        // Skip conditions, in order.
        let skip_reason = if plan.is_none() {
            Some(SKIP_NO_PLAN.to_string())
        } else if left.is_empty() {
            Some(SKIP_ALL_DONE.to_string())
        } else if self.loop_num >= self.config.max_loops {
            Some(format!("Max loops reached ({})", self.config.max_loops))
        } else if self.breaker.should_halt() {
            Some(SKIP_BREAKER_OPEN.to_string())
        } else if !self.limiter.can_call() {
            Some(SKIP_RATE_LIMIT.to_string())
        } else {
            None
        };

        Ok(PreflightSummary {
            mode,
            plan_file,
            total_tasks,
            remaining_count: left.len(),
            first_remaining,
            circuit_state: self.breaker.state(),
            rate_limit_ok: self.limiter.can_call(),
            calls_remaining: self.limiter.calls_remaining(),
            should_skip: skip_reason.is_some(),
            skip_reason,
        })
    }

    /// Stop predicate: true when any stop condition holds. The name is
    /// historical; the return value means "should stop now". The main
    /// loop discovers the same conditions through preflight, which also
    /// names the reason.
    pub fn should_continue(&self) -> bool {
        let all_done = match self.plans.load_plan() {
            Ok((tasks, _)) => remaining(&tasks).is_empty(),
            Err(_) => false,
        };
        all_done
            || self.breaker.should_halt()
            || !self.limiter.can_call()
            || self.loop_num >= self.config.max_loops
    }

    async fn iterate(&mut self, cancel: &CancellationToken) -> Result<(), LoopError> {
        if self.config.auto_sync {
            match self.plans.auto_sync() {
                Ok(evidence) => {
                    for entry in evidence
                        .iter()
                        .filter(|e| e.confidence < AUTO_MARK_CONFIDENCE)
                    {
                        self.emit(LoopEvent::Log {
                            level: LogLevel::Info,
                            message: format!(
                                "evidence {:.2} for task: {}",
                                entry.confidence, entry.task_text
                            ),
                        });
                    }
                }
                Err(e) => tracing::warn!(error = %e, "auto-sync failed"),
            }
        }

        let (tasks, plan_path) = self.plans.load_plan()?;
        let left = remaining(&tasks);
        let plan_file = plan_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let injection = context_injection(&InjectionArgs {
            loop_num: self.display_loop(),
            breaker_state: self.breaker.state(),
            plan_file: &plan_file,
            remaining: &left,
            last_summary: &self.last_summary,
        });
        let prompt_text = self.load_prompt_text();
        let full_prompt = if prompt_text.is_empty() {
            injection
        } else {
            format!("{injection}\n{prompt_text}")
        };

        self.emit(LoopEvent::LoopUpdate {
            loop_num: self.display_loop(),
            message: "executing".to_string(),
        });

        match self.runner.run(&full_prompt, self.display_loop(), cancel).await {
            Err(RunnerError::Cancelled) => Err(LoopError::Cancelled),
            Err(err) => {
                // An error message must never leak into the next prompt.
                self.last_summary.clear();
                if let Err(e) = self.breaker.record_error(&err.to_string()) {
                    tracing::warn!(error = %e, "breaker persist failed");
                }
                if let Err(e) = self.limiter.record_call() {
                    tracing::warn!(error = %e, "rate-limiter persist failed");
                }
                Err(err.into())
            }
            Ok(run) => {
                self.limiter.record_call()?;
                self.emit(LoopEvent::LoopUpdate {
                    loop_num: self.display_loop(),
                    message: "execution_complete".to_string(),
                });

                self.last_summary = truncate_summary(&run.content, SUMMARY_MAX_CHARS);

                let prior_signals = self.store.load_exit_signals().unwrap_or_default();
                let analysis = analyze(&run.content, &prior_signals);
                self.emit(LoopEvent::Analysis {
                    loop_num: self.display_loop(),
                    confidence: analysis.confidence,
                    has_errors: analysis.has_errors,
                    exit_signal: analysis.status.exit_signal,
                    status: analysis.status.status.to_string(),
                    tasks_completed: analysis.status.tasks_completed_this_loop,
                    files_modified: analysis.status.files_modified,
                });

                if analysis.status.exit_signal {
                    self.store
                        .append_exit_signal(&format!("loop_{}", self.display_loop()))?;
                    self.should_stop = true;
                }
                if analysis.confidence >= STOP_CONFIDENCE
                    && analysis.status.status == AgentStatus::Complete
                {
                    self.should_stop = true;
                }

                self.breaker
                    .record_result(analysis.status.files_modified, analysis.has_errors)?;
                Ok(())
            }
        }
    }

    /// Free-form prompt text for the detected mode. Missing files warn and
    /// fall back to empty; the context injection still drives the agent.
    fn load_prompt_text(&self) -> String {
        let Some(name) = self.plans.mode().prompt_file() else {
            return String::new();
        };
        let path = self.config.project_dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "prompt file unreadable");
                String::new()
            }
        }
    }

    /// Graceful exit: stop the runner, reset the breaker, clear the
    /// session. Cleanup failures are logged, not propagated.
    async fn shutdown(&mut self) {
        self.should_stop = true;
        self.runner.stop().await;
        if let Err(e) = self.breaker.reset() {
            tracing::warn!(error = %e, "breaker reset failed during shutdown");
        }
        if let Err(e) = self.store.clear_session_id() {
            tracing::warn!(error = %e, "session-id clear failed during shutdown");
        }
        self.emit(LoopEvent::Log {
            level: LogLevel::Info,
            message: "shutdown complete".to_string(),
        });
    }
}

/// Forward a runner event to the observer in its loop-event shape.
fn map_agent_event(event: AgentEvent) -> LoopEvent {
    match event {
        AgentEvent::Message { text } => LoopEvent::CodexOutput { text },
        AgentEvent::Reasoning { text } => LoopEvent::CodexReasoning { text },
        AgentEvent::ToolCall {
            name,
            target,
            status,
        } => LoopEvent::CodexTool {
            name,
            target,
            status,
        },
        AgentEvent::ToolResult { name, target } => LoopEvent::CodexTool {
            name,
            target,
            status: ToolCallStatus::Completed,
        },
        AgentEvent::ContextUsage { usage } => LoopEvent::ContextUsage { usage },
        AgentEvent::Lifecycle {
            subtype,
            attempt,
            message,
        } => {
            let level = match subtype {
                ralph_core::LifecycleKind::Error => LogLevel::Error,
                ralph_core::LifecycleKind::Retry => LogLevel::Warn,
                _ => LogLevel::Info,
            };
            let mut text = format!("agent lifecycle: {subtype:?}");
            if let Some(attempt) = attempt {
                text.push_str(&format!(" (attempt {attempt})"));
            }
            if let Some(message) = message {
                text.push_str(&format!(": {message}"));
            }
            LoopEvent::Log {
                level,
                message: text,
            }
        }
        AgentEvent::Unknown { raw_type, .. } => LoopEvent::Log {
            level: LogLevel::Debug,
            message: format!("unrecognized agent event: {raw_type}"),
        },
    }
}

async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(duration) => {}
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
