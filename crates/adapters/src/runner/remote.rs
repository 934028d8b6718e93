// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote SSE agent runner
//!
//! Talks to an agent server over HTTP: one session per process, prompts
//! fired asynchronously, responses consumed off a long-lived SSE stream
//! scoped to the run. The stream has no client timeout; cancellation and
//! the per-run cap bound it instead.

use super::{AgentRunner, RemoteConfig, RunOutcome, RunnerError};
use crate::context::ContextTracker;
use crate::normalize::Normalizer;
use crate::server::{self, ManagedServer};
use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use ralph_core::{AgentEvent, EventSink, LifecycleKind};
use ralph_storage::{archive_session, SessionArchive, StateStore};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Consecutive retry frames tolerated before the run is abandoned.
const RETRY_CAP: u32 = 20;

/// Settle time between opening the SSE reader and firing the prompt.
const READER_SETTLE: Duration = Duration::from_millis(100);

/// Runner for the remote agent server.
pub struct RemoteRunner {
    config: RemoteConfig,
    store: StateStore,
    /// Client for synchronous calls, bounded by the configured timeout.
    http: reqwest::Client,
    /// Client for the SSE stream; deliberately unbounded.
    sse: reqwest::Client,
    session: Mutex<Option<String>>,
    tracker: Mutex<ContextTracker>,
    observer: Mutex<Option<EventSink>>,
    managed: tokio::sync::Mutex<Option<ManagedServer>>,
}

/// Everything the stream reader hands back for one exchange.
#[derive(Debug, Default)]
struct Exchange {
    content: String,
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    compacted: bool,
}

impl RemoteRunner {
    pub fn new(config: RemoteConfig, store: StateStore) -> Self {
        let mut http = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build().unwrap_or_default();
        let sse = reqwest::Client::new();
        let tracker = ContextTracker::new(config.model_id.clone());

        Self {
            config,
            store,
            http,
            sse,
            session: Mutex::new(None),
            tracker: Mutex::new(tracker),
            observer: Mutex::new(None),
            managed: tokio::sync::Mutex::new(None),
        }
    }

    fn base_url(&self) -> String {
        match &self.config.server_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.config.port),
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(user) => req.basic_auth(user, self.config.password.as_deref()),
            None => req,
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(sink) = self.observer.lock().clone() {
            sink(event);
        }
    }

    /// Launch the managed server when no URL is configured.
    async fn ensure_server(&self) -> Result<(), RunnerError> {
        if self.config.server_url.is_some() {
            return Ok(());
        }
        let mut managed = self.managed.lock().await;
        if managed.is_none() {
            let server = server::launch(
                &self.config.server_command,
                self.store.root(),
                self.config.port,
            )
            .await?;
            *managed = Some(server);
        }
        Ok(())
    }

    /// The session for this process: cached, persisted, or freshly created.
    async fn ensure_session(&self) -> Result<String, RunnerError> {
        if let Some(id) = self.session.lock().clone() {
            return Ok(id);
        }
        if let Some(id) = self.store.load_session_id()? {
            tracing::debug!(session_id = %id, "reusing persisted session");
            *self.session.lock() = Some(id.clone());
            return Ok(id);
        }
        self.create_session().await
    }

    async fn create_session(&self) -> Result<String, RunnerError> {
        let url = format!("{}/session", self.base_url());
        let resp = self
            .with_auth(self.http.post(&url))
            .json(&json!({"model_id": self.config.model_id}))
            .send()
            .await
            .map_err(|e| RunnerError::ExecFailed(format!("session create failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(RunnerError::ExecFailed(format!(
                "session create returned {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| RunnerError::ExecFailed(format!("session create decode failed: {e}")))?;
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RunnerError::Session("session create response missing id".to_string()))?
            .to_string();

        self.store.save_session_id(&id)?;
        *self.session.lock() = Some(id.clone());
        tracing::info!(session_id = %id, "created remote session");
        Ok(id)
    }

    /// Archive the current session and start a fresh one.
    async fn rotate_session(&self, loop_num: u64, reason: &str) -> Result<(), RunnerError> {
        let record = {
            let tracker = self.tracker.lock();
            SessionArchive {
                model_id: tracker.model_id().to_string(),
                prompt_tokens: tracker.prompt_tokens(),
                completion_tokens: tracker.completion_tokens(),
                loop_num,
                timestamp: chrono::Utc::now(),
                reason: reason.to_string(),
            }
        };
        if let Err(e) = archive_session(self.store.root(), &record) {
            tracing::warn!(error = %e, "session archive failed");
        }

        *self.session.lock() = None;
        self.store.clear_session_id()?;
        self.create_session().await?;
        self.tracker.lock().reset();

        self.emit(AgentEvent::Lifecycle {
            subtype: LifecycleKind::Compacted,
            attempt: None,
            message: Some(format!("session rotated: {reason}")),
        });
        Ok(())
    }

    /// Synchronous exchange over `POST /session/<id>/message`, for servers
    /// without an event bus. The configured timeout bounds the call.
    async fn run_sync(
        &self,
        prompt: &str,
        loop_num: u64,
        session_id: &str,
    ) -> Result<RunOutcome, RunnerError> {
        let url = format!("{}/session/{session_id}/message", self.base_url());
        let resp = self
            .with_auth(self.http.post(&url))
            .json(&json!({"parts": [{"type": "text", "text": prompt}]}))
            .send()
            .await
            .map_err(|e| RunnerError::ExecFailed(format!("message failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(RunnerError::ExecFailed(format!(
                "message returned {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| RunnerError::ExecFailed(format!("message decode failed: {e}")))?;

        let content: String = body
            .get("parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if !content.is_empty() {
            self.emit(AgentEvent::Message {
                text: content.clone(),
            });
        }

        let tokens = body
            .get("info")
            .and_then(|i| i.get("tokens"))
            .cloned();
        if let Some(tokens) = tokens {
            let prompt_tokens = tokens.get("prompt").and_then(Value::as_u64);
            let completion_tokens = tokens.get("completion").and_then(Value::as_u64);
            if let (Some(p), Some(c)) = (prompt_tokens, completion_tokens) {
                self.tracker.lock().update(p, c);
            }
        }
        let should_rotate = self.tracker.lock().should_rotate();
        if should_rotate {
            self.rotate_session(loop_num, "threshold").await?;
        }

        let session_after = self.session.lock().clone();
        Ok(RunOutcome {
            content,
            session_id: session_after,
        })
    }

    async fn abort_session(&self, session_id: &str) {
        let url = format!("{}/session/{session_id}/abort", self.base_url());
        if let Err(e) = self.with_auth(self.http.post(&url)).send().await {
            tracing::debug!(error = %e, "session abort failed (best-effort)");
        }
    }
}

#[async_trait]
impl AgentRunner for RemoteRunner {
    async fn run(
        &self,
        prompt: &str,
        loop_num: u64,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunnerError> {
        self.ensure_server().await?;
        let session_id = self.ensure_session().await?;
        let base = self.base_url();

        // Open the event stream before prompting so nothing is missed.
        let resp = self
            .with_auth(self.sse.get(format!("{base}/event")))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| RunnerError::ExecFailed(format!("event stream failed: {e}")))?;
        // Older servers have no event bus; exchange synchronously instead.
        if resp.status() == reqwest::StatusCode::NOT_FOUND
            || resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED
        {
            tracing::debug!("no event stream on this server, using synchronous messages");
            return self.run_sync(prompt, loop_num, &session_id).await;
        }
        if !resp.status().is_success() {
            return Err(RunnerError::ExecFailed(format!(
                "event stream returned {}",
                resp.status()
            )));
        }

        let reader_cancel = cancel.child_token();
        let (tx, rx) = oneshot::channel();
        let observer = self.observer.lock().clone();
        let reader = tokio::spawn(consume_stream(
            resp,
            observer,
            reader_cancel.clone(),
            tx,
        ));

        // Give the reader a beat to be mid-poll before the prompt lands.
        tokio::time::sleep(READER_SETTLE).await;

        let prompt_url = format!("{base}/session/{session_id}/prompt_async");
        let fire = self
            .with_auth(self.http.post(&prompt_url))
            .json(&json!({"parts": [{"type": "text", "text": prompt}]}))
            .send()
            .await
            .map_err(|e| RunnerError::ExecFailed(format!("prompt dispatch failed: {e}")))?;
        if !fire.status().is_success() {
            reader_cancel.cancel();
            let _ = reader.await;
            // A 404 means the persisted session is gone on the server;
            // forget it so the next attempt creates a fresh one.
            if fire.status() == reqwest::StatusCode::NOT_FOUND {
                *self.session.lock() = None;
                self.store.clear_session_id()?;
            }
            return Err(RunnerError::ExecFailed(format!(
                "prompt dispatch returned {}",
                fire.status()
            )));
        }

        let timeout = async {
            match self.config.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };

        let exchange = tokio::select! {
            outcome = rx => outcome
                .map_err(|_| RunnerError::Session("event reader dropped".to_string()))?,
            () = cancel.cancelled() => {
                reader_cancel.cancel();
                let _ = reader.await;
                self.abort_session(&session_id).await;
                return Err(RunnerError::Cancelled);
            }
            () = timeout => {
                reader_cancel.cancel();
                let _ = reader.await;
                self.abort_session(&session_id).await;
                let secs = self.config.timeout.map(|t| t.as_secs()).unwrap_or(0);
                return Err(RunnerError::Timeout(secs));
            }
        };
        let exchange = exchange?;

        {
            let mut tracker = self.tracker.lock();
            if let (Some(prompt_tokens), Some(completion_tokens)) =
                (exchange.prompt_tokens, exchange.completion_tokens)
            {
                tracker.update(prompt_tokens, completion_tokens);
            }
            if exchange.compacted {
                tracker.mark_compacted();
            }
            self.emit(AgentEvent::ContextUsage {
                usage: tracker.usage(),
            });
        }

        let should_rotate = self.tracker.lock().should_rotate();
        if should_rotate {
            let reason = if exchange.compacted {
                "server_compacted"
            } else {
                "threshold"
            };
            self.rotate_session(loop_num, reason).await?;
        }

        let session_after = self.session.lock().clone();
        Ok(RunOutcome {
            content: exchange.content,
            session_id: session_after,
        })
    }

    fn set_observer(&self, sink: EventSink) {
        *self.observer.lock() = Some(sink);
    }

    async fn stop(&self) {
        let session_id = self.session.lock().clone();
        if let Some(id) = session_id {
            self.abort_session(&id).await;
        }
        if let Some(server) = self.managed.lock().await.take() {
            server.shutdown().await;
        }
    }
}

/// Drain SSE frames until the session goes idle or fails.
///
/// Closes the response body (by dropping the stream) when cancelled, which
/// unblocks the network read.
async fn consume_stream(
    resp: reqwest::Response,
    observer: Option<EventSink>,
    cancel: CancellationToken,
    tx: oneshot::Sender<Result<Exchange, RunnerError>>,
) {
    let mut stream = resp.bytes_stream();
    let mut normalizer = Normalizer::new();
    let mut book = Bookkeeping::default();
    let mut line_buf = String::new();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("event reader cancelled");
                return;
            }
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                line_buf.push_str(&String::from_utf8_lossy(&bytes));
            }
            Some(Err(e)) => {
                let _ = tx.send(Err(RunnerError::ExecFailed(format!("SSE read failed: {e}"))));
                return;
            }
            None => {
                let _ = tx.send(Err(RunnerError::Session(
                    "event stream ended before the session went idle".to_string(),
                )));
                return;
            }
        }

        while let Some(pos) = line_buf.find('\n') {
            let raw = line_buf[..pos].trim_end_matches('\r').to_string();
            line_buf.drain(..=pos);

            let Some(data) = raw.strip_prefix("data:").map(str::trim) else {
                continue;
            };
            if data.is_empty() || data == "[DONE]" {
                continue;
            }
            let Ok(frame) = serde_json::from_str::<Value>(data) else {
                tracing::debug!(frame = data, "undecodable SSE frame");
                continue;
            };

            if let Some(event) = normalizer.normalize(&frame) {
                if let Some(sink) = &observer {
                    sink(event);
                }
            }

            match book.ingest(&frame) {
                FrameAction::Continue => {}
                FrameAction::Done => {
                    let _ = tx.send(Ok(book.into_exchange()));
                    return;
                }
                FrameAction::Fail(error) => {
                    let _ = tx.send(Err(error));
                    return;
                }
            }
        }
    }
}

/// What a frame means for the exchange in progress.
#[derive(Debug)]
enum FrameAction {
    Continue,
    Done,
    Fail(RunnerError),
}

/// Per-exchange bookkeeping over the SSE frames.
#[derive(Debug, Default)]
struct Bookkeeping {
    assistant_message_id: Option<String>,
    /// Part text keyed by part id, in insertion order. The server re-emits
    /// whole parts, so each update replaces the text for its id.
    parts: Vec<(String, String)>,
    retry_attempts: u32,
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    compacted: bool,
}

impl Bookkeeping {
    fn ingest(&mut self, frame: &Value) -> FrameAction {
        let frame_type = frame.get("type").and_then(Value::as_str).unwrap_or("");
        let props = frame.get("properties").unwrap_or(frame);

        match frame_type {
            "message.updated" => {
                let info = props.get("info").unwrap_or(props);
                if info.get("role").and_then(Value::as_str) == Some("assistant") {
                    if let Some(id) = info.get("id").and_then(Value::as_str) {
                        self.assistant_message_id = Some(id.to_string());
                    }
                }
                FrameAction::Continue
            }
            "message.part.updated" => {
                if let Some(part) = props.get("part") {
                    self.update_part(part);
                }
                FrameAction::Continue
            }
            "session.status" => self.ingest_status(props.get("status").unwrap_or(props)),
            "session.compacted" => {
                self.compacted = true;
                FrameAction::Continue
            }
            "session.updated" => {
                self.update_tokens(props);
                FrameAction::Continue
            }
            _ => FrameAction::Continue,
        }
    }

    fn update_part(&mut self, part: &Value) {
        let message_id = part
            .get("messageID")
            .or_else(|| part.get("message_id"))
            .and_then(Value::as_str);
        // Only parts of the assistant message in flight count as content.
        if message_id.is_some() && message_id != self.assistant_message_id.as_deref() {
            return;
        }
        let Some(id) = part.get("id").and_then(Value::as_str) else {
            return;
        };
        let Some(text) = part.get("text").and_then(Value::as_str) else {
            return;
        };
        match self.parts.iter_mut().find(|(pid, _)| pid == id) {
            Some((_, existing)) => *existing = text.to_string(),
            None => self.parts.push((id.to_string(), text.to_string())),
        }
    }

    fn ingest_status(&mut self, status: &Value) -> FrameAction {
        match status.get("type").and_then(Value::as_str).unwrap_or("") {
            "idle" => FrameAction::Done,
            "retry" => {
                self.retry_attempts = status
                    .get("attempt")
                    .and_then(Value::as_u64)
                    .map(|a| a as u32)
                    .unwrap_or(self.retry_attempts + 1);
                if self.retry_attempts > RETRY_CAP {
                    FrameAction::Fail(RunnerError::RateLimited)
                } else {
                    FrameAction::Continue
                }
            }
            "error" => {
                let message = status
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("session error")
                    .to_string();
                FrameAction::Fail(RunnerError::Session(message))
            }
            _ => FrameAction::Continue,
        }
    }

    fn update_tokens(&mut self, props: &Value) {
        let tokens = props
            .get("info")
            .and_then(|i| i.get("tokens"))
            .or_else(|| props.get("tokens"));
        if let Some(tokens) = tokens {
            if let Some(prompt) = tokens.get("prompt").and_then(Value::as_u64) {
                self.prompt_tokens = Some(prompt);
            }
            if let Some(completion) = tokens.get("completion").and_then(Value::as_u64) {
                self.completion_tokens = Some(completion);
            }
        }
    }

    fn into_exchange(self) -> Exchange {
        let content: String = self
            .parts
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("");
        Exchange {
            content,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            compacted: self.compacted,
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
