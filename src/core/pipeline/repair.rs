//! Best-effort recovery of JSON emitted by a language model.
//!
//! Each strategy is a pure function of the text; [`parse_with_repair`] tries
//! them in order and stops at the first that yields a value accepted by the
//! caller's predicate.

use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    Direct,
    Heuristic,
    Balance,
    Truncation,
}

impl RepairStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairStrategy::Direct => "direct",
            RepairStrategy::Heuristic => "heuristic",
            RepairStrategy::Balance => "balance",
            RepairStrategy::Truncation => "truncation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("no repair strategy produced usable JSON ({})", attempts.iter().map(|(s, e)| format!("{}: {}", s.as_str(), e)).collect::<Vec<_>>().join("; "))]
pub struct RepairError {
    pub attempts: Vec<(RepairStrategy, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    pub strategy: RepairStrategy,
}

/// Cut points tried by the truncation scan, counted from the end.
const MAX_TRUNCATION_CANDIDATES: usize = 4000;

static UNQUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)\s*:"#).unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#",(\s*[\}\]])"#).unwrap());
static ADJACENT_OBJECTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\}(\s*)\{"#).unwrap());

/// Drops markdown fences and any prose around the outermost JSON value.
pub fn strip_markdown(text: &str) -> &str {
    let mut trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        trimmed = match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        };
    }
    let Some(open) = trimmed.find(['{', '[']) else {
        return trimmed;
    };
    match outermost_end(&trimmed[open..]) {
        Some(len) => &trimmed[open..open + len],
        // Truncated output: keep everything after the opener.
        None => &trimmed[open..],
    }
}

/// Byte length of the value that opens `text`, or `None` when it never
/// closes. Brackets inside string literals are ignored.
fn outermost_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            match (escaped, ch) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

pub fn direct(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

/// Regex-level patching of the usual model mistakes, then a lenient JSON5
/// parse of the untouched text as a last resort.
pub fn heuristic(text: &str) -> Result<Value, String> {
    let patched = heuristic_patch(text);
    match serde_json::from_str(&patched) {
        Ok(v) => Ok(v),
        Err(e) => json5::from_str::<Value>(text).map_err(|_| e.to_string()),
    }
}

/// Rewrites single-quoted strings to double quotes and fixes unquoted keys,
/// trailing commas and missing separators. String contents are never touched.
pub fn heuristic_patch(text: &str) -> String {
    patch_outside_strings(text, |segment, between_strings| {
        if between_strings {
            return format!(",{segment}");
        }
        let s = UNQUOTED_KEY.replace_all(segment, "$1\"$2\":");
        let s = TRAILING_COMMA.replace_all(&s, "$1");
        let s = ADJACENT_OBJECTS.replace_all(&s, "},$1{");
        s.into_owned()
    })
}

/// Walks the text, copying string literals verbatim (re-quoted with `"`) and
/// passing every run of structural text to `patch`. The flag tells `patch`
/// the run is blank and sits between two strings.
fn patch_outside_strings(text: &str, patch: impl Fn(&str, bool) -> String) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut segment = String::new();
    let mut seen_string = false;
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        let opens = ch == '"' || (ch == '\'' && opens_value(&segment, seen_string));
        if !opens {
            segment.push(ch);
            continue;
        }
        let between = seen_string && segment.trim().is_empty();
        out.push_str(&patch(&segment, between));
        segment.clear();
        out.push('"');
        copy_string(&mut chars, ch, &mut out);
        seen_string = true;
    }
    out.push_str(&patch(&segment, false));
    out
}

fn opens_value(segment: &str, seen_string: bool) -> bool {
    match segment.trim_end().chars().last() {
        Some(c) => matches!(c, '{' | '[' | ',' | ':'),
        None => !seen_string,
    }
}

/// Copies one string body up to and including its closing quote. An
/// unterminated string runs to the end of the input.
fn copy_string(chars: &mut Chars<'_>, quote: char, out: &mut String) {
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\'') if quote == '\'' => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '"' if quote == '\'' => out.push_str("\\\""),
            c if c == quote => {
                out.push('"');
                return;
            }
            c => out.push(c),
        }
    }
}

/// Appends whatever closers are missing, innermost first.
pub fn balance(text: &str) -> Result<Value, String> {
    let balanced = close_open_structures(&heuristic_patch(text));
    serde_json::from_str(&balanced).map_err(|e| e.to_string())
}

pub fn close_open_structures(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            match (escaped, ch) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while out.ends_with(',') || out.ends_with(':') {
        out.pop();
        out = out.trim_end().to_string();
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Longest prefix that, once balanced, parses and satisfies `accept`.
pub fn truncation(text: &str, accept: &dyn Fn(&Value) -> bool) -> Result<Value, String> {
    let patched = heuristic_patch(text);
    let cut_points = patched
        .char_indices()
        .rev()
        .filter(|(_, c)| matches!(c, '}' | ']' | ','))
        .take(MAX_TRUNCATION_CANDIDATES);
    for (idx, ch) in cut_points {
        let end = if ch == ',' { idx } else { idx + ch.len_utf8() };
        let candidate = close_open_structures(&patched[..end]);
        if let Ok(v) = serde_json::from_str::<Value>(&candidate)
            && accept(&v)
        {
            return Ok(v);
        }
    }
    Err("no balanced prefix parsed".to_string())
}

/// Runs the ladder: direct → heuristic → balance → truncation.
pub fn parse_with_repair(
    raw: &str,
    accept: &dyn Fn(&Value) -> bool,
) -> Result<Repaired, RepairError> {
    let text = strip_markdown(raw);
    let mut attempts = Vec::new();

    let simple: [(RepairStrategy, fn(&str) -> Result<Value, String>); 3] = [
        (RepairStrategy::Direct, direct),
        (RepairStrategy::Heuristic, heuristic),
        (RepairStrategy::Balance, balance),
    ];
    for (strategy, run) in simple {
        match run(text) {
            Ok(value) if accept(&value) => return Ok(Repaired { value, strategy }),
            Ok(_) => attempts.push((strategy, "parsed but rejected".to_string())),
            Err(e) => attempts.push((strategy, e)),
        }
    }

    match truncation(text, accept) {
        Ok(value) => Ok(Repaired {
            value,
            strategy: RepairStrategy::Truncation,
        }),
        Err(e) => {
            attempts.push((RepairStrategy::Truncation, e));
            Err(RepairError { attempts })
        }
    }
}

pub fn has_slides_array(value: &Value) -> bool {
    value.get("slides").is_some_and(Value::is_array)
}
