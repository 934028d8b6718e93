// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event normalization
//!
//! Translates raw event maps from either backend into [`AgentEvent`]s. The
//! CLI backend emits codex-style JSON lines (`item.completed`,
//! `thread.started`); the remote backend emits SSE frames with a
//! `properties` envelope. Neither shape leaks past this module.
//!
//! The remote backend re-emits the same message or reasoning part with
//! appended text on every tick, so the normalizer tracks the last emitted
//! string per kind and forwards only the new suffix.

use ralph_core::{AgentEvent, ContextUsage, LifecycleKind, ToolCallStatus};
use serde_json::Value;

/// Keys probed, in order, for a file-path target.
const FILE_PATH_KEYS: &[&str] = &["file_path", "filePath", "path", "filename", "file"];

/// Containers probed, in order, for file-path keys.
const ARGUMENT_KEYS: &[&str] = &["arguments", "input", "parameters"];

/// Stateful normalizer, one per agent invocation.
#[derive(Debug, Default)]
pub struct Normalizer {
    last_reasoning: String,
    last_message: String,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize one raw event. Returns `None` for frames that carry
    /// nothing worth forwarding (empty deltas, pure bookkeeping).
    pub fn normalize(&mut self, raw: &Value) -> Option<AgentEvent> {
        let raw_type = raw_type(raw);

        match raw_type {
            "item.completed" => self.normalize_item(raw.get("item")?),
            "content_block_delta" => {
                let text = get_str(raw.get("delta")?, "text")?;
                if text.is_empty() {
                    return None;
                }
                Some(AgentEvent::Message {
                    text: text.to_string(),
                })
            }
            "message" => {
                let text = content_text(raw)?;
                self.emit_message(&text)
            }
            "assistant" => {
                let inner = raw.get("message").unwrap_or(raw);
                let text = content_text(inner)?;
                self.emit_message(&text)
            }
            "tool_use" => Some(AgentEvent::ToolCall {
                name: get_str(raw, "name").unwrap_or("tool").to_string(),
                target: extract_target(raw),
                status: match get_str(raw, "status") {
                    Some("completed") => ToolCallStatus::Completed,
                    _ => ToolCallStatus::Started,
                },
            }),
            "tool_result" => Some(AgentEvent::ToolResult {
                name: get_str(raw, "name").unwrap_or("tool").to_string(),
                target: extract_target(raw),
            }),
            "context.usage" => Some(AgentEvent::ContextUsage {
                usage: context_usage(raw),
            }),
            "session.status" => {
                let status = raw.get("properties").and_then(|p| p.get("status"))?;
                let subtype = lifecycle_kind(get_str(status, "type")?)?;
                Some(AgentEvent::Lifecycle {
                    subtype,
                    attempt: get_u64(status, "attempt").map(|a| a as u32),
                    message: get_str(status, "message").map(str::to_string),
                })
            }
            _ => self.normalize_other(raw_type, raw),
        }
    }

    fn normalize_item(&mut self, item: &Value) -> Option<AgentEvent> {
        match get_str(item, "type")? {
            "reasoning" => {
                let text = get_str(item, "text")?;
                self.emit_reasoning(text)
            }
            "agent_message" | "message" => {
                let text = get_str(item, "text")?;
                self.emit_message(text)
            }
            "tool_call" | "function_call" => Some(AgentEvent::ToolCall {
                name: get_str(item, "name").unwrap_or("tool").to_string(),
                target: extract_target(item),
                status: ToolCallStatus::Completed,
            }),
            _ => None,
        }
    }

    /// Anything without a dedicated rule: forward extractable text as a
    /// message, else key a lifecycle event on the raw type string.
    fn normalize_other(&mut self, raw_type: &str, raw: &Value) -> Option<AgentEvent> {
        if let Some(text) = extract_text(raw) {
            if !text.is_empty() {
                return self.emit_message(&text);
            }
        }
        if raw_type.is_empty() {
            return None;
        }
        match lifecycle_kind(raw_type) {
            Some(subtype) => Some(AgentEvent::Lifecycle {
                subtype,
                attempt: raw
                    .get("attempt")
                    .or_else(|| raw.get("properties").and_then(|p| p.get("attempt")))
                    .and_then(Value::as_u64)
                    .map(|a| a as u32),
                message: extract_text(raw).filter(|t| !t.is_empty()),
            }),
            None => Some(AgentEvent::Unknown {
                raw_type: raw_type.to_string(),
                text: None,
            }),
        }
    }

    /// Forward only the suffix when the text cumulatively extends the last
    /// emitted message; drop exact re-emissions.
    fn emit_message(&mut self, text: &str) -> Option<AgentEvent> {
        let fresh = suffix_since(&self.last_message, text)?;
        self.last_message = text.to_string();
        Some(AgentEvent::Message { text: fresh })
    }

    fn emit_reasoning(&mut self, text: &str) -> Option<AgentEvent> {
        let fresh = suffix_since(&self.last_reasoning, text)?;
        self.last_reasoning = text.to_string();
        Some(AgentEvent::Reasoning { text: fresh })
    }
}

/// The new portion of a cumulatively re-emitted string.
///
/// `None` when the text is an exact duplicate of the last emission.
fn suffix_since(last: &str, text: &str) -> Option<String> {
    if text == last {
        return None;
    }
    if !last.is_empty() && text.starts_with(last) {
        return Some(text[last.len()..].to_string());
    }
    Some(text.to_string())
}

fn raw_type(raw: &Value) -> &str {
    get_str(raw, "type")
        .or_else(|| get_str(raw, "event"))
        .unwrap_or("")
}

fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn get_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

/// Text from a `content` field: either a string, or a list of objects
/// whose `text` fields are joined in order.
fn content_text(value: &Value) -> Option<String> {
    match value.get("content")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| get_str(p, "text"))
                .collect::<Vec<_>>()
                .join("");
            Some(joined)
        }
        _ => None,
    }
}

/// Best-effort text extraction for frames with no dedicated rule.
fn extract_text(raw: &Value) -> Option<String> {
    if let Some(text) = get_str(raw, "text") {
        return Some(text.to_string());
    }
    if let Some(text) = content_text(raw) {
        return Some(text);
    }
    if let Some(Value::String(message)) = raw.get("message") {
        return Some(message.clone());
    }
    if let Some(delta) = raw.get("delta") {
        if let Some(text) = get_str(delta, "text") {
            return Some(text.to_string());
        }
    }
    if let Some(part) = raw.get("part") {
        if let Some(text) = get_str(part, "text") {
            return Some(text.to_string());
        }
    }
    // SSE frames wrap their payload in a properties envelope.
    if let Some(properties) = raw.get("properties") {
        return extract_text(properties);
    }
    None
}

/// What a tool call is aimed at: an explicit target, a file path buried in
/// its arguments, or the command line truncated for display.
fn extract_target(value: &Value) -> String {
    if let Some(target) = get_str(value, "target") {
        return target.to_string();
    }
    for container_key in ARGUMENT_KEYS {
        if let Some(container) = value.get(container_key) {
            for path_key in FILE_PATH_KEYS {
                if let Some(path) = get_str(container, path_key) {
                    return path.to_string();
                }
            }
        }
    }
    let command = get_str(value, "command").or_else(|| {
        ARGUMENT_KEYS
            .iter()
            .filter_map(|k| value.get(k))
            .find_map(|c| get_str(c, "command"))
    });
    if let Some(command) = command {
        return truncate_chars(command, 50);
    }
    String::new()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

/// Map a raw type string onto a lifecycle subtype.
fn lifecycle_kind(raw_type: &str) -> Option<LifecycleKind> {
    let lowered = raw_type.to_lowercase();
    let has = |needle: &str| lowered.contains(needle);
    if has("compact") {
        Some(LifecycleKind::Compacted)
    } else if has("retry") {
        Some(LifecycleKind::Retry)
    } else if has("error") {
        Some(LifecycleKind::Error)
    } else if has("idle") {
        Some(LifecycleKind::Idle)
    } else if has("busy") {
        Some(LifecycleKind::Busy)
    } else if has("start") {
        Some(LifecycleKind::Started)
    } else if has("stop") || has("complete") || has("finish") {
        Some(LifecycleKind::Stopped)
    } else {
        None
    }
}

fn context_usage(raw: &Value) -> ContextUsage {
    let body = raw.get("properties").unwrap_or(raw);
    let prompt_tokens = get_u64(body, "prompt_tokens")
        .or_else(|| get_u64(body, "promptTokens"))
        .unwrap_or(0);
    let completion_tokens = get_u64(body, "completion_tokens")
        .or_else(|| get_u64(body, "completionTokens"))
        .unwrap_or(0);
    let total_tokens = get_u64(body, "total_tokens")
        .or_else(|| get_u64(body, "totalTokens"))
        .unwrap_or(prompt_tokens + completion_tokens);
    let limit = get_u64(body, "limit").unwrap_or(crate::DEFAULT_CONTEXT_LIMIT);
    let percent = body
        .get("percent")
        .and_then(Value::as_f64)
        .unwrap_or(if limit > 0 {
            total_tokens as f64 / limit as f64
        } else {
            0.0
        });
    ContextUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
        limit,
        percent,
        threshold_reached: body
            .get("threshold_reached")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        was_compacted: body
            .get("was_compacted")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
