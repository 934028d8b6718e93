// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checklist task model
//!
//! Plan files are Markdown checklists. A task is any line matching one of
//! four dialects: `- [ ]`, `* [ ]`, `<digits>. [ ]`, or a bare `[ ]`.
//! Uppercase `X` is equivalent to lowercase `x`. Lines that match none of
//! the dialects are left alone; they are simply not tasks.

use serde::{Deserialize, Serialize};

/// A single checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    pub checked: bool,
}

/// The bullet dialect a task line was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `- [ ]`
    Dash,
    /// `* [ ]`
    Star,
    /// `1. [ ]`
    Numbered,
    /// `[ ]` with no bullet
    Bare,
}

/// A parsed task line, carrying enough of the original bytes to rewrite
/// the line without disturbing indentation or bullet style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    pub dialect: Dialect,
    pub checked: bool,
    /// Trimmed task body (everything after the checkbox).
    pub text: String,
    /// The original line, without trailing newline.
    pub raw: String,
    /// Byte offset of the `[` of the checkbox within `raw`.
    box_start: usize,
}

impl TaskLine {
    pub fn task(&self) -> Task {
        Task {
            text: self.text.clone(),
            checked: self.checked,
        }
    }

    /// Render this line with the checkbox flipped to `[x]`.
    ///
    /// Every byte outside the three checkbox bytes is preserved.
    pub fn checked_line(&self) -> String {
        let mut line = String::with_capacity(self.raw.len());
        line.push_str(&self.raw[..self.box_start]);
        line.push_str("[x]");
        line.push_str(&self.raw[self.box_start + 3..]);
        line
    }
}

/// Match a checkbox (`[ ]`, `[x]`, `[X]`) at the start of `rest`.
///
/// Returns whether the box is checked.
fn parse_checkbox(rest: &str) -> Option<bool> {
    let mut chars = rest.chars();
    if chars.next() != Some('[') {
        return None;
    }
    let mark = chars.next()?;
    if chars.next() != Some(']') {
        return None;
    }
    match mark {
        ' ' => Some(false),
        'x' | 'X' => Some(true),
        _ => None,
    }
}

/// Classify a single line as a task, if it matches one of the dialects.
pub fn parse_task_line(line: &str) -> Option<TaskLine> {
    let trimmed_start = line.trim_start();
    let indent_len = line.len() - trimmed_start.len();

    let (dialect, box_offset) = if let Some(rest) = trimmed_start.strip_prefix("- ") {
        parse_checkbox(rest)?;
        (Dialect::Dash, 2)
    } else if let Some(rest) = trimmed_start.strip_prefix("* ") {
        parse_checkbox(rest)?;
        (Dialect::Star, 2)
    } else if let Some(offset) = numbered_prefix(trimmed_start) {
        parse_checkbox(&trimmed_start[offset..])?;
        (Dialect::Numbered, offset)
    } else if parse_checkbox(trimmed_start).is_some() {
        (Dialect::Bare, 0)
    } else {
        return None;
    };

    let box_start = indent_len + box_offset;
    // Safe: parse_checkbox succeeded at this offset above.
    let checked = parse_checkbox(&line[box_start..])?;
    let text = line[box_start + 3..].trim().to_string();

    Some(TaskLine {
        dialect,
        checked,
        text,
        raw: line.to_string(),
        box_start,
    })
}

/// Match `<digits>. ` at the start of the line, returning the byte offset
/// just past the trailing space.
fn numbered_prefix(s: &str) -> Option<usize> {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &s[digits..];
    if rest.starts_with(". ") {
        Some(digits + 2)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
