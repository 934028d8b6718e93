// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-based event rendering
//!
//! The real dashboard is a separate concern; the CLI prints one line per
//! observer event and stays out of the way of piped output.

use ralph_core::{LogLevel, LoopEvent};

/// Render one loop event to stdout.
pub fn print_event(event: LoopEvent) {
    match event {
        LoopEvent::LoopUpdate { loop_num, message } => {
            println!("[loop {loop_num}] {message}");
        }
        LoopEvent::Log { level, message } => {
            let tag = match level {
                LogLevel::Debug => return, // too chatty for the console
                LogLevel::Info => "info",
                LogLevel::Warn => "warn",
                LogLevel::Error => "error",
            };
            println!("[{tag}] {message}");
        }
        LoopEvent::Preflight { summary } => {
            if let Some(reason) = &summary.skip_reason {
                println!("[preflight] skipping: {reason}");
            } else {
                println!(
                    "[preflight] {}: {} of {} tasks remaining, {} calls left",
                    summary.mode,
                    summary.remaining_count,
                    summary.total_tasks,
                    summary.calls_remaining
                );
            }
        }
        LoopEvent::Outcome {
            loop_num,
            success,
            message,
        } => {
            let verdict = if success { "done" } else { "failed" };
            println!("[outcome] {verdict} after {loop_num} loops: {message}");
        }
        LoopEvent::Analysis {
            loop_num,
            confidence,
            has_errors,
            exit_signal,
            status,
            ..
        } => {
            println!(
                "[analysis {loop_num}] status={status} confidence={confidence:.2} \
                 errors={has_errors} exit={exit_signal}"
            );
        }
        LoopEvent::CodexOutput { text } => {
            print!("{text}");
        }
        LoopEvent::CodexReasoning { text } => {
            let _ = text; // reasoning stays off the console
        }
        LoopEvent::CodexTool {
            name,
            target,
            status,
        } => {
            println!("[tool] {name} {target} ({status:?})");
        }
        LoopEvent::ContextUsage { usage } => {
            println!(
                "[context] {}/{} tokens ({:.0}%)",
                usage.total_tokens,
                usage.limit,
                usage.percent * 100.0
            );
        }
    }
}
