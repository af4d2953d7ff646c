//! The observe → plan → act loop.
//!
//! Each step takes a fresh snapshot, asks the model for a plan and executes
//! only the plan's first action, since the page may have changed by the time
//! a second one would run. Any planning or execution failure ends the run;
//! recovery is a separate call the caller makes with [`TaskSummary::failure`],
//! or a single attempt through [`TaskOrchestrator::run_with_recovery`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::brain::ModelProvider;
use crate::dom::capture_snapshot;
use crate::driver::PageDriver;
use crate::executor::{ActionExecutor, DriverExecutor};
use crate::history::{ConversationHistory, HistoryRecord};
use crate::planner::Planner;
use crate::recovery::RecoveryPlanner;
use crate::types::{Action, ActionPlan, DEFAULT_MAX_STEPS, ExecutionLogEntry, PageSnapshot};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_steps: u32,
    /// Pause between steps so page transitions can settle.
    pub step_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            step_delay: Duration::from_millis(crate::config::DEFAULT_STEP_DELAY_MS),
        }
    }
}

impl OrchestratorConfig {
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

/// Cooperative stop signal, observed between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Completed,
    Exhausted,
    Aborted,
}

/// Where a run broke off after an action failed, kept for recovery.
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub step: u32,
    pub snapshot: PageSnapshot,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub state: TaskState,
    pub completed: bool,
    pub steps: u32,
    pub message: String,
    pub log: Vec<ExecutionLogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

/// Loop control: either keep going or stop in a terminal state.
enum Flow {
    Continue,
    Completed,
    Aborted {
        error: String,
        failure: Option<StepFailure>,
    },
}

pub struct TaskOrchestrator {
    driver: Arc<dyn PageDriver>,
    executor: Arc<dyn ActionExecutor>,
    planner: Planner,
    recovery: RecoveryPlanner,
    history: ConversationHistory,
    config: OrchestratorConfig,
    cancel: CancelHandle,
}

impl TaskOrchestrator {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        provider: Arc<dyn ModelProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        let executor = Arc::new(DriverExecutor::new(Arc::clone(&driver)));
        let planner = Planner::new(provider);
        Self {
            driver,
            executor,
            recovery: RecoveryPlanner::new(planner.clone()),
            planner,
            history: ConversationHistory::new(),
            config,
            cancel: CancelHandle::default(),
        }
    }

    /// Replace the executor, e.g. with one that reports task completion.
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn executor(&self) -> Arc<dyn ActionExecutor> {
        Arc::clone(&self.executor)
    }

    /// Ask for an alternative plan after a failure. Leaves the loop state alone.
    pub async fn recover(&self, failure: &StepFailure, original_task: &str) -> ActionPlan {
        self.recovery
            .recover(&failure.snapshot, &failure.error, original_task)
            .await
    }

    /// Drive the page towards `task` with the configured step budget.
    pub async fn run(&mut self, task: &str) -> TaskSummary {
        let max_steps = self.config.max_steps;
        self.run_with_budget(task, max_steps).await
    }

    pub async fn run_with_budget(&mut self, task: &str, max_steps: u32) -> TaskSummary {
        info!("Starting task execution: {task}");
        let summary = self.drive(task, 0, max_steps, Vec::new()).await;
        self.record(task, &summary);
        summary
    }

    /// Like [`run`](Self::run), but a failed action gets one recovery
    /// attempt: the recovery plan's first action runs as the next step and,
    /// if it neither fails nor finishes the task, the loop resumes with the
    /// budget that is left. A failed recovery is never recovered again.
    pub async fn run_with_recovery(&mut self, task: &str) -> TaskSummary {
        info!("Starting task execution with recovery: {task}");
        let max_steps = self.config.max_steps;
        let first = self.drive(task, 0, max_steps, Vec::new()).await;
        let summary = match first.failure.clone() {
            Some(failure) if first.steps < max_steps => {
                self.resume_after(task, failure, first, max_steps).await
            }
            _ => first,
        };
        self.record(task, &summary);
        summary
    }

    async fn resume_after(
        &mut self,
        task: &str,
        failure: StepFailure,
        first: TaskSummary,
        max_steps: u32,
    ) -> TaskSummary {
        let plan = self.recover(&failure, task).await;
        let Some(action) = plan.first_action().cloned() else {
            warn!(
                "no recovery action: {}",
                plan.error().unwrap_or("empty recovery plan")
            );
            return first;
        };

        let step = first.steps + 1;
        let mut log = first.log;
        info!(%action, "Executing recovery action as step {step}/{max_steps}");
        match self.act(step, action, failure.snapshot, &mut log).await {
            Flow::Continue => {
                self.pause(step, max_steps).await;
                self.drive(task, step, max_steps, log).await
            }
            terminal => conclude(step, max_steps, Some(terminal), log),
        }
    }

    /// The step loop, continuing after `step` already-taken steps.
    async fn drive(
        &mut self,
        task: &str,
        mut step: u32,
        max_steps: u32,
        mut log: Vec<ExecutionLogEntry>,
    ) -> TaskSummary {
        let outcome = loop {
            if step >= max_steps {
                break None;
            }
            if self.cancel.is_cancelled() {
                warn!(step, "task cancelled");
                self.cancel.reset();
                break Some(Flow::Aborted {
                    error: "cancelled".to_string(),
                    failure: None,
                });
            }

            step += 1;
            info!("Executing step {step}/{max_steps}");
            match self.step(task, step, &mut log).await {
                Flow::Continue => {}
                terminal => break Some(terminal),
            }
            self.pause(step, max_steps).await;
        };

        conclude(step, max_steps, outcome, log)
    }

    async fn pause(&self, step: u32, max_steps: u32) {
        if step < max_steps && !self.config.step_delay.is_zero() {
            tokio::time::sleep(self.config.step_delay).await;
        }
    }

    fn record(&mut self, task: &str, summary: &TaskSummary) {
        self.history.push(HistoryRecord::TaskExecution {
            task: task.to_string(),
            steps: summary.steps,
            completed: summary.completed,
            log: summary.log.clone(),
            timestamp: Utc::now(),
        });
        info!(state = ?summary.state, steps = summary.steps, "{}", summary.message);
    }

    async fn step(&mut self, task: &str, step: u32, log: &mut Vec<ExecutionLogEntry>) -> Flow {
        let snapshot = match capture_snapshot(self.driver.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error in step {step}: {e}");
                log.push(ExecutionLogEntry::Errored {
                    step,
                    error: e.to_string(),
                });
                return Flow::Aborted {
                    error: e.to_string(),
                    failure: None,
                };
            }
        };

        let plan = match self.planner.plan(&snapshot, task).await {
            Ok(plan) => {
                self.history.push(HistoryRecord::PageAnalysis {
                    task: task.to_string(),
                    url: snapshot.url.clone(),
                    plan: plan.clone(),
                    timestamp: Utc::now(),
                });
                plan
            }
            Err(e) => ActionPlan::failed(e.to_string()),
        };

        if !plan.is_success() {
            return Flow::Aborted {
                error: plan.error().unwrap_or("planning failed").to_string(),
                failure: None,
            };
        }

        let Some(action) = plan.first_action().cloned() else {
            info!("model returned no further actions");
            return Flow::Completed;
        };

        self.act(step, action, snapshot, log).await
    }

    /// Run one action and log it. `snapshot` is the page the action was
    /// planned against, kept in the failure for recovery.
    async fn act(
        &self,
        step: u32,
        action: Action,
        snapshot: PageSnapshot,
        log: &mut Vec<ExecutionLogEntry>,
    ) -> Flow {
        match self.executor.execute(&action).await {
            Err(e) => {
                error!("Error in step {step}: {e}");
                log.push(ExecutionLogEntry::Errored {
                    step,
                    error: e.to_string(),
                });
                Flow::Aborted {
                    error: e.to_string(),
                    failure: Some(StepFailure {
                        step,
                        snapshot,
                        error: e.to_string(),
                    }),
                }
            }
            Ok(outcome) => {
                let succeeded = outcome.success;
                let finished = action.completes_task || outcome.task_complete == Some(true);
                let message = outcome.message.clone();
                log.push(ExecutionLogEntry::Executed {
                    step,
                    action,
                    outcome,
                });
                if !succeeded {
                    Flow::Aborted {
                        error: message.clone(),
                        failure: Some(StepFailure {
                            step,
                            snapshot,
                            error: message,
                        }),
                    }
                } else if finished {
                    Flow::Completed
                } else {
                    Flow::Continue
                }
            }
        }
    }
}

fn conclude(
    step: u32,
    max_steps: u32,
    outcome: Option<Flow>,
    log: Vec<ExecutionLogEntry>,
) -> TaskSummary {
    let (state, message, failure) = match outcome {
        Some(Flow::Completed) => (
            TaskState::Completed,
            format!("Task completed successfully in {step} steps"),
            None,
        ),
        Some(Flow::Aborted { error, failure }) => (
            TaskState::Aborted,
            format!("Task failed at step {step}: {error}"),
            failure,
        ),
        Some(Flow::Continue) | None => (
            TaskState::Exhausted,
            format!("Task reached maximum steps ({max_steps}) without completion"),
            None,
        ),
    };

    TaskSummary {
        completed: state == TaskState::Completed,
        state,
        steps: step,
        message,
        log,
        failure,
    }
}
