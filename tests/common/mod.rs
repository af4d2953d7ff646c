#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use ai_browser_agent::orchestrator::CancelHandle;
use ai_browser_agent::{
    Action, ActionExecutor, AgentError, DriverError, ExecutionOutcome, ModelProvider, PageDriver,
};
use async_trait::async_trait;
use serde_json::{Value, json};

/// In-memory page. Records every primitive as a short string.
pub struct MockDriver {
    pub calls: Mutex<Vec<String>>,
    pub title: Mutex<String>,
    pub url: Mutex<String>,
    pub text: Mutex<String>,
    pub elements: Mutex<Value>,
    pub forms: Mutex<Value>,
    /// Selector or URL → error returned by the primitive touching it.
    pub fail_on: Mutex<HashMap<String, DriverError>>,
    pub closed: AtomicBool,
    pub broken_extraction: AtomicBool,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            title: Mutex::new("Example Domain".into()),
            url: Mutex::new("https://example.com/".into()),
            text: Mutex::new("Example Domain\nMore information...".into()),
            elements: Mutex::new(json!([
                {"tag": "a", "subtype": "", "visible_text": "More information...",
                 "placeholder": "", "href": "https://www.iana.org/domains/example",
                 "selector": "[data-agent-id=\"0\"]"}
            ])),
            forms: Mutex::new(json!([])),
            fail_on: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            broken_extraction: AtomicBool::new(false),
        }
    }
}

impl MockDriver {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, target: &str, error: DriverError) {
        self.fail_on.lock().unwrap().insert(target.to_string(), error);
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String, target: &str) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(call);
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed("tab is gone".into()));
        }
        match self.fail_on.lock().unwrap().get(target) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        self.record(format!("goto {url} {}", timeout.as_millis()), url)?;
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        self.record(format!("click {selector} {}", timeout.as_millis()), selector)
    }

    async fn fill(&self, selector: &str, text: &str, timeout: Duration) -> Result<(), DriverError> {
        self.record(
            format!("fill {selector} {text} {}", timeout.as_millis()),
            selector,
        )
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        self.record(format!("wait {selector} {}", timeout.as_millis()), selector)
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.record(
            format!("select {selector} {value} {}", timeout.as_millis()),
            selector,
        )
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed("tab is gone".into()));
        }
        if script.contains("scrollBy") {
            self.calls.lock().unwrap().push(script.trim().to_string());
            return Ok(Value::Null);
        }
        let structured = script.contains("data-agent-form") || script.contains("data-agent-id");
        if structured && self.broken_extraction.load(Ordering::SeqCst) {
            return Err(DriverError::failed("Cannot read properties of null"));
        }
        if script.contains("data-agent-form") {
            return Ok(Value::String(self.forms.lock().unwrap().to_string()));
        }
        if script.contains("data-agent-id") {
            return Ok(Value::String(self.elements.lock().unwrap().to_string()));
        }
        if script.contains("innerText") {
            return Ok(Value::String(self.text.lock().unwrap().clone()));
        }
        Ok(Value::Null)
    }

    async fn title(&self) -> Result<String, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed("tab is gone".into()));
        }
        Ok(self.title.lock().unwrap().clone())
    }

    async fn url(&self) -> Result<String, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed("tab is gone".into()));
        }
        Ok(self.url.lock().unwrap().clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(b"\x89PNG".to_vec())
    }
}

/// Model that replays queued answers, then repeats `fallback` (if any).
#[derive(Default)]
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn always(answer: &str) -> Self {
        Self {
            fallback: Some(answer.to_string()),
            ..Default::default()
        }
    }

    pub fn sequence(answers: &[&str]) -> Self {
        Self {
            queue: Mutex::new(answers.iter().map(|a| Ok(a.to_string())).collect()),
            ..Default::default()
        }
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.queue.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.queue.lock().unwrap().pop_front() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(message)) => Err(AgentError::provider(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AgentError::provider("no scripted answer left")),
        }
    }
}

/// Succeeds every time and reports the task complete on call `complete_at`.
pub struct CompletingExecutor {
    pub calls: AtomicU32,
    pub complete_at: u32,
}

#[async_trait]
impl ActionExecutor for CompletingExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutionOutcome, DriverError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut outcome = ExecutionOutcome::ok(format!("did {action}"));
        if n == self.complete_at {
            outcome.task_complete = Some(true);
        }
        Ok(outcome)
    }
}

/// Succeeds every time and raises the cancel flag on call `cancel_at`.
pub struct CancellingExecutor {
    pub calls: AtomicU32,
    pub cancel_at: u32,
    pub handle: CancelHandle,
}

#[async_trait]
impl ActionExecutor for CancellingExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutionOutcome, DriverError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.cancel_at {
            self.handle.cancel();
        }
        Ok(ExecutionOutcome::ok(format!("did {action}")))
    }
}

pub const CLICK_NEXT: &str = r##"{"actions":[{"type":"click","selector":"#next"}]}"##;
pub const NOTHING_LEFT: &str = r#"{"actions": []}"#;
