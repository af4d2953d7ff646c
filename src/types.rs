use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_STEPS: u32 = 10;
pub const SNAPSHOT_TEXT_MAX_CHARS: usize = 5000;
pub const SNAPSHOT_MAX_ELEMENTS: usize = 50;
pub const ELEMENT_TEXT_MAX_CHARS: usize = 100;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SCROLL_AMOUNT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }
}

/// A single browser primitive the model asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    Click { selector: String },
    Type { selector: String, text: String },
    Navigate { url: String },
    Wait { selector: String, timeout_ms: u64 },
    Scroll { direction: ScrollDirection, amount: u32 },
    Select { selector: String, value: String },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click { .. } => "click",
            ActionKind::Type { .. } => "type",
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Wait { .. } => "wait",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Select { .. } => "select",
        }
    }
}

/// A validated action. Only the parser builds these from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default)]
    pub completes_task: bool,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            completes_task: false,
        }
    }

    pub fn completing(mut self) -> Self {
        self.completes_task = true;
        self
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ActionKind::Click { selector } => write!(f, "click {selector}"),
            ActionKind::Type { selector, text } => write!(f, "type {text:?} into {selector}"),
            ActionKind::Navigate { url } => write!(f, "navigate to {url}"),
            ActionKind::Wait {
                selector,
                timeout_ms,
            } => write!(f, "wait for {selector} ({timeout_ms}ms)"),
            ActionKind::Scroll { direction, amount } => {
                write!(f, "scroll {} by {amount}px", direction.as_str())
            }
            ActionKind::Select { selector, value } => write!(f, "select {value:?} in {selector}"),
        }?;
        if self.completes_task {
            write!(f, " [completes task]")?;
        }
        Ok(())
    }
}

/// Parsed model response. A failed plan never carries actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    success: bool,
    actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ActionPlan {
    pub fn ready(actions: Vec<Action>) -> Self {
        Self {
            success: true,
            actions,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown planning failure".to_string();
        }
        Self {
            success: false,
            actions: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn first_action(&self) -> Option<&Action> {
        self.actions.first()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_complete: Option<bool>,
}

impl ExecutionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            task_complete: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            task_complete: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub tag: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub visible_text: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub href: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRef {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub fields: Vec<FieldRef>,
    pub selector: String,
}

/// What the agent sees of the page at the start of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub text: String,
    pub elements: Vec<ElementRef>,
    pub forms: Vec<FormRef>,
    /// Set when structured extraction partially failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionLogEntry {
    Executed {
        step: u32,
        action: Action,
        outcome: ExecutionOutcome,
    },
    Errored {
        step: u32,
        error: String,
    },
}

impl ExecutionLogEntry {
    pub fn step(&self) -> u32 {
        match self {
            ExecutionLogEntry::Executed { step, .. } | ExecutionLogEntry::Errored { step, .. } => {
                *step
            }
        }
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
