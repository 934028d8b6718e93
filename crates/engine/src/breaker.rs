// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker
//!
//! Two independent signals feed the breaker: iteration results (how many
//! files changed) and error messages. No progress and repeated identical
//! errors each walk the breaker toward open; any progress clears the
//! no-progress complaint. At most one transition happens per call.

use crate::LoopError;
use ralph_core::{BreakerSnapshot, CircuitState, Clock};
use ralph_storage::StateStore;

pub struct CircuitBreaker<C: Clock> {
    store: StateStore,
    clock: C,
    snapshot: BreakerSnapshot,
}

impl<C: Clock> CircuitBreaker<C> {
    /// Load the persisted snapshot, adopting the configured thresholds.
    pub fn load(
        store: StateStore,
        clock: C,
        no_progress_threshold: u32,
        same_error_threshold: u32,
    ) -> Result<Self, LoopError> {
        let fresh = BreakerSnapshot::new(no_progress_threshold, same_error_threshold, clock.now_utc());
        let mut snapshot = store.load_breaker(fresh)?;
        snapshot.no_progress_threshold = no_progress_threshold;
        snapshot.same_error_threshold = same_error_threshold;
        Ok(Self {
            store,
            clock,
            snapshot,
        })
    }

    pub fn state(&self) -> CircuitState {
        self.snapshot.state
    }

    /// True only in the open state.
    pub fn should_halt(&self) -> bool {
        self.snapshot.state == CircuitState::Open
    }

    pub fn no_progress_count(&self) -> u32 {
        self.snapshot.no_progress_count
    }

    pub fn error_history(&self) -> &[String] {
        &self.snapshot.error_history
    }

    /// Record one iteration's outcome. Progress (any changed file) clears
    /// the no-progress counter. `has_errors` alone never advances the
    /// error counter; callers report errors through [`Self::record_error`].
    pub fn record_result(&mut self, files_changed: i64, has_errors: bool) -> Result<(), LoopError> {
        if files_changed > 0 {
            self.snapshot.no_progress_count = 0;
        } else {
            self.snapshot.no_progress_count += 1;
        }
        if has_errors {
            tracing::debug!("iteration reported errors without a breaker error record");
        }
        self.touch_and_evaluate()
    }

    /// Record an error message verbatim.
    pub fn record_error(&mut self, message: &str) -> Result<(), LoopError> {
        self.snapshot.error_history.push(message.to_string());
        let cap = 2 * self.snapshot.same_error_threshold as usize;
        let len = self.snapshot.error_history.len();
        if len > cap {
            self.snapshot.error_history.drain(..len - cap);
        }
        self.touch_and_evaluate()
    }

    /// Operator reset: back to closed, both counters cleared.
    pub fn reset(&mut self) -> Result<(), LoopError> {
        self.snapshot.state = CircuitState::Closed;
        self.snapshot.no_progress_count = 0;
        self.snapshot.error_history.clear();
        self.snapshot.last_check = self.clock.now_utc();
        self.persist()
    }

    /// Length of the run of identical messages at the tail of the history.
    fn same_error_run(&self) -> u32 {
        let Some(last) = self.snapshot.error_history.last() else {
            return 0;
        };
        self.snapshot
            .error_history
            .iter()
            .rev()
            .take_while(|m| *m == last)
            .count() as u32
    }

    fn touch_and_evaluate(&mut self) -> Result<(), LoopError> {
        self.snapshot.last_check = self.clock.now_utc();

        let no_progress = self.snapshot.no_progress_count;
        let same_error = self.same_error_run();
        let np_threshold = self.snapshot.no_progress_threshold;
        let se_threshold = self.snapshot.same_error_threshold;

        // One transition per call.
        match self.snapshot.state {
            CircuitState::Closed => {
                if no_progress >= np_threshold || same_error >= se_threshold {
                    tracing::warn!(no_progress, same_error, "circuit breaker half-open");
                    self.snapshot.state = CircuitState::HalfOpen;
                }
            }
            CircuitState::HalfOpen => {
                if no_progress >= 2 * np_threshold || same_error >= 2 * se_threshold {
                    tracing::error!(no_progress, same_error, "circuit breaker OPEN");
                    self.snapshot.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }

        self.persist()
    }

    fn persist(&self) -> Result<(), LoopError> {
        self.store.save_breaker(&self.snapshot)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
