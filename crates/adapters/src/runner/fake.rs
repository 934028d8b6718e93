// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake runner for tests
//!
//! Scripted stand-in for the real backends: each queued run emits its
//! events to the observer, applies an optional side effect (plan edits,
//! usually), and resolves to its outcome. Prompts are recorded so tests
//! can assert on the context injection. Clones share state, so a test can
//! keep a handle after handing the runner to the controller.

use super::{AgentRunner, RunOutcome, RunnerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use ralph_core::{AgentEvent, EventSink};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type SideEffect = Box<dyn FnOnce() + Send + 'static>;

/// One scripted exchange.
pub struct FakeRun {
    content: String,
    events: Vec<AgentEvent>,
    error: Option<String>,
    side_effect: Option<SideEffect>,
}

impl FakeRun {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            events: Vec::new(),
            error: None,
            side_effect: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            events: Vec::new(),
            error: Some(message.into()),
            side_effect: None,
        }
    }

    /// Events streamed to the observer before the run resolves.
    pub fn with_events(mut self, events: Vec<AgentEvent>) -> Self {
        self.events = events;
        self
    }

    /// Side effect applied mid-run (e.g. the agent editing the plan).
    pub fn with_side_effect(mut self, effect: impl FnOnce() + Send + 'static) -> Self {
        self.side_effect = Some(Box::new(effect));
        self
    }
}

#[derive(Default)]
struct FakeInner {
    script: Mutex<VecDeque<FakeRun>>,
    prompts: Mutex<Vec<String>>,
    observer: Mutex<Option<EventSink>>,
    stopped: AtomicBool,
}

/// Scripted runner for engine and spec tests.
#[derive(Clone, Default)]
pub struct FakeRunner {
    inner: Arc<FakeInner>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, run: FakeRun) {
        self.inner.script.lock().push_back(run);
    }

    pub fn queue_success(&self, content: impl Into<String>) {
        self.queue(FakeRun::success(content));
    }

    pub fn queue_failure(&self, message: impl Into<String>) {
        self.queue(FakeRun::failure(message));
    }

    /// Number of times `run` was invoked.
    pub fn call_count(&self) -> usize {
        self.inner.prompts.lock().len()
    }

    /// Prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.inner.prompts.lock().clone()
    }

    pub fn was_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentRunner for FakeRunner {
    async fn run(
        &self,
        prompt: &str,
        _loop_num: u64,
        _cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunnerError> {
        self.inner.prompts.lock().push(prompt.to_string());

        let Some(run) = self.inner.script.lock().pop_front() else {
            return Err(RunnerError::ExecFailed(
                "fake runner script exhausted".to_string(),
            ));
        };

        let observer = self.inner.observer.lock().clone();
        if let Some(sink) = observer {
            for event in run.events {
                sink(event);
            }
        }

        if let Some(effect) = run.side_effect {
            effect();
        }

        match run.error {
            Some(message) => Err(RunnerError::ExecFailed(message)),
            None => Ok(RunOutcome {
                content: run.content,
                session_id: Some("fake-session".to_string()),
            }),
        }
    }

    fn set_observer(&self, sink: EventSink) {
        *self.inner.observer.lock() = Some(sink);
    }

    async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
