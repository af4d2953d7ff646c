//! Turns free-form model output into a validated [`ActionPlan`].
//!
//! The parser is total: every input yields a plan, never an error. Malformed
//! actions inside an otherwise usable payload are dropped one by one; the plan
//! only fails when nothing executable is left.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{
    Action, ActionKind, ActionPlan, DEFAULT_SCROLL_AMOUNT, DEFAULT_WAIT_TIMEOUT_MS,
    ScrollDirection,
};

pub const UNPARSEABLE: &str = "unparseable response";

/// Why a single candidate action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejection {
    #[error("action is not an object")]
    NotAnObject,
    #[error("action has no type")]
    MissingType,
    #[error("unknown action type '{0}'")]
    UnknownType(String),
    #[error("{action} action requires a non-empty '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    #[error("invalid {field} for {action} action: {reason}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Parse raw model text into an action plan.
pub fn parse_action_plan(raw: &str) -> ActionPlan {
    let Some(payload) = extract_payload(raw) else {
        debug!("no structured payload in model response");
        return ActionPlan::failed(UNPARSEABLE);
    };

    let candidates = match payload {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            if obj.get("success").and_then(Value::as_bool) == Some(false) {
                let error = obj
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("model reported failure");
                return ActionPlan::failed(error);
            }
            if let Some(actions) = obj.remove("actions") {
                match actions {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    other => vec![other],
                }
            } else if obj.get("action").is_some_and(Value::is_object) {
                obj.remove("action").into_iter().collect()
            } else if obj.contains_key("type") || obj.contains_key("action") {
                vec![Value::Object(obj)]
            } else {
                return ActionPlan::failed(UNPARSEABLE);
            }
        }
        _ => return ActionPlan::failed(UNPARSEABLE),
    };

    let total = candidates.len();
    let mut actions = Vec::with_capacity(total);
    let mut rejections = Vec::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        match validate_action(candidate) {
            Ok(action) => actions.push(action),
            Err(reason) => {
                warn!(index = idx, %reason, "dropping invalid action");
                rejections.push(reason.to_string());
            }
        }
    }

    if total > 0 && actions.is_empty() {
        return ActionPlan::failed(format!("no valid actions: {}", rejections.join("; ")));
    }

    ActionPlan::ready(actions)
}

/// Validate one candidate action against the closed action schema.
pub fn validate_action(value: &Value) -> Result<Action, ActionRejection> {
    let obj = value.as_object().ok_or(ActionRejection::NotAnObject)?;
    let raw_type = obj
        .get("type")
        .or_else(|| obj.get("action"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ActionRejection::MissingType)?;

    let kind = match raw_type.to_ascii_lowercase().as_str() {
        "click" => ActionKind::Click {
            selector: required(obj, "click", "selector")?,
        },
        "type" | "fill" => ActionKind::Type {
            selector: required(obj, "type", "selector")?,
            text: required(obj, "type", "text")?,
        },
        "navigate" | "goto" => ActionKind::Navigate {
            url: checked_url(required(obj, "navigate", "url")?)?,
        },
        "wait" | "wait_for" => ActionKind::Wait {
            selector: required(obj, "wait", "selector")?,
            timeout_ms: wait_timeout(obj)?,
        },
        "scroll" => ActionKind::Scroll {
            direction: scroll_direction(obj)?,
            amount: scroll_amount(obj)?,
        },
        "select" => ActionKind::Select {
            selector: required(obj, "select", "selector")?,
            value: required(obj, "select", "value")?,
        },
        _ => return Err(ActionRejection::UnknownType(raw_type.to_string())),
    };

    let completes_task = obj
        .get("completes_task")
        .or_else(|| obj.get("completesTask"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Action {
        kind,
        completes_task,
    })
}

fn required(
    obj: &Map<String, Value>,
    action: &'static str,
    field: &'static str,
) -> Result<String, ActionRejection> {
    obj.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or(ActionRejection::MissingField { action, field })
}

fn checked_url(raw: String) -> Result<String, ActionRejection> {
    let invalid = |reason: String| ActionRejection::InvalidField {
        action: "navigate",
        field: "url",
        reason,
    };
    let trimmed = raw.trim();
    if trimmed == "about:blank" {
        return Ok(trimmed.to_string());
    }
    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(invalid(format!("scheme '{other}' is not allowed"))),
    }
}

fn wait_timeout(obj: &Map<String, Value>) -> Result<u64, ActionRejection> {
    let raw = ["timeout_ms", "timeoutMs", "timeout"]
        .iter()
        .find_map(|key| obj.get(*key));
    match raw {
        None | Some(Value::Null) => Ok(DEFAULT_WAIT_TIMEOUT_MS),
        Some(v) => v
            .as_u64()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| ActionRejection::InvalidField {
                action: "wait",
                field: "timeout",
                reason: format!("expected a positive integer, got {v}"),
            }),
    }
}

fn scroll_direction(obj: &Map<String, Value>) -> Result<ScrollDirection, ActionRejection> {
    match obj.get("direction").and_then(Value::as_str).map(str::trim) {
        None | Some("") => Ok(ScrollDirection::Down),
        Some(d) if d.eq_ignore_ascii_case("down") => Ok(ScrollDirection::Down),
        Some(d) if d.eq_ignore_ascii_case("up") => Ok(ScrollDirection::Up),
        Some(other) => Err(ActionRejection::InvalidField {
            action: "scroll",
            field: "direction",
            reason: format!("'{other}' is not up or down"),
        }),
    }
}

fn scroll_amount(obj: &Map<String, Value>) -> Result<u32, ActionRejection> {
    match obj.get("amount") {
        None | Some(Value::Null) => Ok(DEFAULT_SCROLL_AMOUNT),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| ActionRejection::InvalidField {
                action: "scroll",
                field: "amount",
                reason: format!("expected a positive integer, got {v}"),
            }),
    }
}

/// Locate the JSON payload inside model text: whole text, fenced block, then
/// the first balanced object or array.
pub fn extract_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    for block in fenced_blocks(trimmed) {
        if let Some(value) = first_balanced(block) {
            return Some(value);
        }
    }

    first_balanced(trimmed)
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(FENCE) {
        let after = &rest[start + FENCE.len()..];
        let body = after.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_');
        match body.find(FENCE) {
            Some(end) => {
                blocks.push(&body[..end]);
                rest = &body[end + FENCE.len()..];
            }
            None => break,
        }
    }
    blocks
}

/// Scan for the first `{`/`[` whose balanced span parses as JSON. Brackets
/// inside string literals are ignored.
fn first_balanced(text: &str) -> Option<Value> {
    for (start, open) in text.char_indices().filter(|(_, c)| *c == '{' || *c == '[') {
        let Some(end) = balanced_end(&text[start..], open) else {
            continue;
        };
        if let Ok(value) = serde_json::from_str::<Value>(&text[start..start + end]) {
            return Some(value);
        }
    }
    None
}

fn balanced_end(text: &str, open: char) -> Option<usize> {
    let close = if open == '{' { '}' } else { ']' };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
