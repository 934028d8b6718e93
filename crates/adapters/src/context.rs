// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-model context accounting
//!
//! The remote backend reports token counts as the session grows. The
//! tracker decides when the session is close enough to its context limit
//! that it should be archived and rotated.

use ralph_core::ContextUsage;

/// Context limit assumed for models not in the table.
pub const DEFAULT_CONTEXT_LIMIT: u64 = 128_000;

/// Fraction of the context limit at which the session is rotated.
pub const DEFAULT_SAVE_THRESHOLD: f64 = 0.80;

/// Known model context limits. Matched by prefix so versioned identifiers
/// (`gpt-5-codex-2026-01`) resolve to their family.
const MODEL_LIMITS: &[(&str, u64)] = &[
    ("gpt-5-codex", 272_000),
    ("gpt-5", 272_000),
    ("gpt-4.1", 1_000_000),
    ("gpt-4o", 128_000),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    ("claude-opus", 200_000),
    ("claude-sonnet", 200_000),
    ("claude-haiku", 200_000),
];

/// Look up the context limit for a model identifier.
pub fn context_limit(model_id: &str) -> u64 {
    MODEL_LIMITS
        .iter()
        .find(|(prefix, _)| model_id.starts_with(prefix))
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_CONTEXT_LIMIT)
}

/// Token accountant for the active session.
#[derive(Debug, Clone)]
pub struct ContextTracker {
    model_id: String,
    limit: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    save_threshold: f64,
    was_compacted: bool,
}

impl ContextTracker {
    pub fn new(model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let limit = context_limit(&model_id);
        Self {
            model_id,
            limit,
            prompt_tokens: 0,
            completion_tokens: 0,
            save_threshold: DEFAULT_SAVE_THRESHOLD,
            was_compacted: false,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.prompt_tokens
    }

    pub fn completion_tokens(&self) -> u64 {
        self.completion_tokens
    }

    /// Record the latest token counts reported by the server. Counts are
    /// session totals, not deltas.
    pub fn update(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
    }

    /// The server compacted the session on its own.
    pub fn mark_compacted(&mut self) {
        self.was_compacted = true;
    }

    pub fn was_compacted(&self) -> bool {
        self.was_compacted
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.total() as f64 / self.limit as f64
    }

    /// True when the session should be archived and rotated.
    pub fn should_rotate(&self) -> bool {
        self.was_compacted || self.percent() >= self.save_threshold
    }

    /// Zero the accounting for a fresh session.
    pub fn reset(&mut self) {
        self.prompt_tokens = 0;
        self.completion_tokens = 0;
        self.was_compacted = false;
    }

    pub fn usage(&self) -> ContextUsage {
        ContextUsage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total(),
            limit: self.limit,
            percent: self.percent(),
            threshold_reached: self.percent() >= self.save_threshold,
            was_compacted: self.was_compacted,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
