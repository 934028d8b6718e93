// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window rate limiter
//!
//! Caps agent invocations per window and persists across restarts via
//! `.call_count` / `.last_reset`. Every invocation attempt is recorded,
//! successful or not, so a runaway error loop cannot exceed the budget.
//! The window reset is lazy: it happens on the next recorded call, never
//! as a side effect of a read.

use crate::LoopError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ralph_core::Clock;
use ralph_storage::StateStore;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Countdown notification cadence during [`RateLimiter::wait_for_reset`].
const COUNTDOWN_TICK: Duration = Duration::from_secs(60);

pub struct RateLimiter<C: Clock> {
    store: StateStore,
    clock: C,
    max_calls: u32,
    window_hours: i64,
    current: u32,
    window_start: DateTime<Utc>,
}

impl<C: Clock> RateLimiter<C> {
    /// Load persisted counters; a missing window start begins a fresh
    /// window now without touching disk.
    pub fn load(
        store: StateStore,
        clock: C,
        max_calls: u32,
        window_hours: i64,
    ) -> Result<Self, LoopError> {
        let current = store.load_call_count()?;
        let window_start = store
            .load_last_reset()?
            .unwrap_or_else(|| clock.now_utc());
        Ok(Self {
            store,
            clock,
            max_calls,
            window_hours,
            current: current.min(max_calls),
            window_start,
        })
    }

    /// Whether another call fits in the budget. Side-effect-free.
    pub fn can_call(&self) -> bool {
        self.current < self.max_calls
    }

    pub fn calls_remaining(&self) -> u32 {
        self.max_calls.saturating_sub(self.current)
    }

    /// Record an invocation attempt, resetting the window first if it has
    /// elapsed. Persists both counters.
    pub fn record_call(&mut self) -> Result<(), LoopError> {
        let now = self.clock.now_utc();
        if self.window_elapsed(now) {
            tracing::debug!(window_hours = self.window_hours, "rate-limit window reset");
            self.current = 0;
            self.window_start = now;
        }
        self.current = (self.current + 1).min(self.max_calls);
        self.store.save_call_count(self.current)?;
        self.store.save_last_reset(self.window_start)?;
        Ok(())
    }

    /// Time until the window resets. A non-positive window never resets;
    /// the cap is then a lifetime budget and the result saturates.
    pub fn time_until_reset(&self) -> Duration {
        if self.window_hours <= 0 {
            return Duration::MAX;
        }
        let reset_at = self.window_start + ChronoDuration::hours(self.window_hours);
        let remaining = reset_at - self.clock.now_utc();
        remaining.to_std().unwrap_or(Duration::ZERO)
    }

    /// Block until the window resets or `cancel` fires, whichever is
    /// first. Emits a countdown through `notify` roughly once a minute and
    /// once more on the final stretch.
    pub async fn wait_for_reset(&self, cancel: &CancellationToken, notify: impl Fn(Duration)) {
        loop {
            let remaining = self.time_until_reset();
            if remaining.is_zero() {
                return;
            }
            notify(remaining);

            let tick = remaining.min(COUNTDOWN_TICK);
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(tick) => {}
            }
        }
    }

    fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        if self.window_hours <= 0 {
            return false;
        }
        now - self.window_start >= ChronoDuration::hours(self.window_hours)
    }
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod tests;
