// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI agent runner
//!
//! Spawns the agent binary in non-interactive JSON mode, feeds the prompt
//! on stdin, and parses newline-delimited JSON events off stdout. The
//! sandbox is disabled: the agent must be able to edit the project.

use super::{AgentRunner, CliConfig, RunOutcome, RunnerError};
use crate::normalize::Normalizer;
use async_trait::async_trait;
use parking_lot::Mutex;
use ralph_core::EventSink;
use ralph_storage::StateStore;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio_util::sync::CancellationToken;

/// Stdout line buffer. Single events can carry whole-file payloads.
const LINE_BUFFER_BYTES: usize = 1024 * 1024;

/// Runner for the local CLI agent.
pub struct CliRunner {
    config: CliConfig,
    store: StateStore,
    observer: Mutex<Option<EventSink>>,
}

/// What the stdout reader collected over one run.
#[derive(Debug, Default)]
struct StreamResult {
    content: String,
    /// Fallback content from completed agent-message items, used when no
    /// plain message/text events arrived.
    item_content: String,
    session_id: Option<String>,
    /// Non-JSON stdout lines, kept for diagnostics on failure.
    raw_output: String,
    error: Option<std::io::Error>,
}

impl StreamResult {
    fn canonical_content(&self) -> String {
        if self.content.is_empty() {
            self.item_content.clone()
        } else {
            self.content.clone()
        }
    }
}

impl CliRunner {
    pub fn new(config: CliConfig, store: StateStore) -> Self {
        Self {
            config,
            store,
            observer: Mutex::new(None),
        }
    }

    fn build_command(&self, resume: bool) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("exec")
            .arg("--experimental-json")
            .arg("--sandbox")
            .arg("danger-full-access")
            .arg("--cd")
            .arg(&self.config.project_dir);
        if resume {
            cmd.arg("resume").arg("--last");
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AgentRunner for CliRunner {
    async fn run(
        &self,
        prompt: &str,
        _loop_num: u64,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunnerError> {
        let prior_session = self.store.load_session_id()?;

        let mut child = self
            .build_command(prior_session.is_some())
            .spawn()
            .map_err(RunnerError::Stream)?;

        tracing::debug!(
            binary = %self.config.binary,
            resume = prior_session.is_some(),
            "spawned agent child"
        );

        let stdout = child.stdout.take().ok_or_else(|| {
            RunnerError::Stream(std::io::Error::other("child stdout unavailable"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            RunnerError::Stream(std::io::Error::other("child stderr unavailable"))
        })?;

        // Readers must be draining before the prompt goes in: a large
        // prompt can fill the stdin pipe while the child is already
        // producing output.
        let observer = self.observer.lock().clone();
        let reader = tokio::spawn(read_stdout(stdout, observer));
        let stderr_reader = tokio::spawn(read_stderr(stderr));

        // Prompt goes in on stdin; dropping the handle signals EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(RunnerError::Stream)?;
        }

        let timeout = async {
            match self.config.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };

        let status = tokio::select! {
            status = child.wait() => status.map_err(RunnerError::Stream)?,
            () = cancel.cancelled() => {
                tracing::info!("run cancelled, killing agent child");
                let _ = child.start_kill();
                let _ = child.wait().await;
                reader.abort();
                stderr_reader.abort();
                return Err(RunnerError::Cancelled);
            }
            () = timeout => {
                let secs = self.config.timeout.map(|t| t.as_secs()).unwrap_or(0);
                tracing::warn!(secs, "agent run timed out, killing child");
                let _ = child.start_kill();
                let _ = child.wait().await;
                reader.abort();
                stderr_reader.abort();
                return Err(RunnerError::Timeout(secs));
            }
        };

        let parsed = reader
            .await
            .map_err(|e| RunnerError::Stream(std::io::Error::other(e)))?;
        let stderr_buf = stderr_reader.await.unwrap_or_default();

        if let Some(e) = parsed.error {
            return Err(RunnerError::Stream(e));
        }

        if !status.success() {
            let detail = if stderr_buf.trim().is_empty() {
                parsed.raw_output
            } else {
                stderr_buf
            };
            return Err(RunnerError::ExecFailed(detail));
        }

        if let Some(id) = &parsed.session_id {
            self.store.save_session_id(id)?;
        }

        Ok(RunOutcome {
            content: parsed.canonical_content(),
            session_id: parsed.session_id.or(prior_session),
        })
    }

    fn set_observer(&self, sink: EventSink) {
        *self.observer.lock() = Some(sink);
    }

    async fn stop(&self) {
        // Nothing owned between runs; the child dies with each run.
    }
}

/// Read stdout line by line: JSON lines become normalized events, non-JSON
/// lines accumulate raw for diagnostics.
async fn read_stdout<R>(stdout: R, observer: Option<EventSink>) -> StreamResult
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(LINE_BUFFER_BYTES, stdout);
    let mut normalizer = Normalizer::new();
    let mut result = StreamResult::default();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
                    result.raw_output.push_str(trimmed);
                    result.raw_output.push('\n');
                    continue;
                };
                ingest_event(&value, &mut result, &mut normalizer, observer.as_ref());
            }
            Err(e) => {
                result.error = Some(e);
                break;
            }
        }
    }

    result
}

fn ingest_event(
    value: &Value,
    result: &mut StreamResult,
    normalizer: &mut Normalizer,
    observer: Option<&EventSink>,
) {
    let event_type = value
        .get("type")
        .or_else(|| value.get("event"))
        .and_then(Value::as_str)
        .unwrap_or("");

    // The first thread.started names the session.
    if event_type == "thread.started" && result.session_id.is_none() {
        if let Some(id) = value.get("thread_id").and_then(Value::as_str) {
            result.session_id = Some(id.to_string());
        }
    }

    // Canonical content: concatenated text of message/text events.
    if matches!(event_type, "message" | "text") {
        if let Some(text) = value.get("text").and_then(Value::as_str) {
            result.content.push_str(text);
        }
    }

    // Newer agent builds put the final text in completed agent-message
    // items instead; keep it as a fallback.
    if event_type == "item.completed" {
        if let Some(item) = value.get("item") {
            let is_message = item.get("type").and_then(Value::as_str) == Some("agent_message");
            if is_message {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    result.item_content.push_str(text);
                }
            }
        }
    }

    if let Some(event) = normalizer.normalize(value) {
        if let Some(sink) = observer {
            sink(event);
        }
    }
}

async fn read_stderr(stderr: ChildStderr) -> String {
    let mut buf = String::new();
    let mut reader = BufReader::new(stderr);
    let _ = reader.read_to_string(&mut buf).await;
    buf
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
