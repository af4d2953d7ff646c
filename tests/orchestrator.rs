mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ai_browser_agent::types::ExecutionLogEntry;
use ai_browser_agent::{DriverError, OrchestratorConfig, TaskOrchestrator, TaskState};
use common::{
    CLICK_NEXT, CancellingExecutor, CompletingExecutor, MockDriver, NOTHING_LEFT, ScriptedProvider,
};

fn quick(max_steps: u32) -> OrchestratorConfig {
    OrchestratorConfig::default()
        .max_steps(max_steps)
        .step_delay(Duration::ZERO)
}

fn setup(
    provider: ScriptedProvider,
    max_steps: u32,
) -> (Arc<MockDriver>, Arc<ScriptedProvider>, TaskOrchestrator) {
    let driver = Arc::new(MockDriver::default());
    let provider = Arc::new(provider);
    let orchestrator = TaskOrchestrator::new(driver.clone(), provider.clone(), quick(max_steps));
    (driver, provider, orchestrator)
}

#[tokio::test]
async fn zero_budget_runs_nothing() {
    let (driver, provider, mut orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 0);

    let summary = orchestrator.run("open the docs").await;

    assert_eq!(summary.state, TaskState::Exhausted);
    assert!(!summary.completed);
    assert_eq!(summary.steps, 0);
    assert!(summary.log.is_empty());
    assert!(provider.prompts().is_empty());
    assert!(driver.calls().is_empty());
    assert_eq!(
        summary.message,
        "Task reached maximum steps (0) without completion"
    );
}

#[tokio::test]
async fn empty_plan_completes_on_first_step() {
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(NOTHING_LEFT), 10);

    let summary = orchestrator.run("already there").await;

    assert_eq!(summary.state, TaskState::Completed);
    assert!(summary.completed);
    assert_eq!(summary.steps, 1);
    assert!(summary.log.is_empty());
    assert!(driver.calls().is_empty());
    assert_eq!(summary.message, "Task completed successfully in 1 steps");
}

#[tokio::test]
async fn endless_successes_exhaust_the_budget() {
    let (driver, provider, mut orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 4);

    let summary = orchestrator.run("page through results").await;

    assert_eq!(summary.state, TaskState::Exhausted);
    assert_eq!(summary.steps, 4);
    assert_eq!(summary.log.len(), 4);
    assert_eq!(provider.prompts().len(), 4);
    assert_eq!(driver.calls(), vec!["click #next 10000"; 4]);
    let steps: Vec<u32> = summary.log.iter().map(ExecutionLogEntry::step).collect();
    assert_eq!(steps, vec![1, 2, 3, 4]);
    assert!(summary.message.contains("maximum steps (4)"));
}

#[tokio::test]
async fn reported_completion_stops_at_that_step() {
    let (_driver, _provider, orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 10);
    let executor = Arc::new(CompletingExecutor {
        calls: AtomicU32::new(0),
        complete_at: 3,
    });
    let mut orchestrator = orchestrator.with_executor(executor.clone());

    let summary = orchestrator.run("reach the last page").await;

    assert_eq!(summary.state, TaskState::Completed);
    assert_eq!(summary.steps, 3);
    assert_eq!(summary.log.len(), 3);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn completion_flag_on_action_finishes_the_task() {
    let answer = r##"{"actions":[{"type":"click","selector":"#buy","completes_task":true}]}"##;
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(answer), 10);

    let summary = orchestrator.run("buy it").await;

    assert_eq!(summary.state, TaskState::Completed);
    assert_eq!(summary.steps, 1);
    assert_eq!(driver.calls(), vec!["click #buy 10000"]);
}

#[tokio::test]
async fn only_the_first_action_of_a_plan_runs() {
    let answer = r##"{"actions":[
        {"type":"click","selector":"#a"},
        {"type":"click","selector":"#b"}
    ]}"##;
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(answer), 1);

    let summary = orchestrator.run("click things").await;

    assert_eq!(summary.state, TaskState::Exhausted);
    assert_eq!(driver.calls(), vec!["click #a 10000"]);
}

#[tokio::test]
async fn invalid_actions_are_dropped_before_execution() {
    let answer = r##"{"actions":[
        {"type":"hover","selector":"#menu"},
        {"type":"click","selector":"#ok"}
    ]}"##;
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(answer), 1);

    orchestrator.run("open the menu").await;

    assert_eq!(driver.calls(), vec!["click #ok 10000"]);
}

#[tokio::test]
async fn unparseable_answer_aborts_without_log_entry() {
    let (driver, _provider, mut orchestrator) =
        setup(ScriptedProvider::always("I would click the button."), 10);

    let summary = orchestrator.run("click it").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert_eq!(summary.steps, 1);
    assert!(summary.log.is_empty());
    assert!(summary.failure.is_none());
    assert!(summary.message.starts_with("Task failed at step 1:"));
    assert!(summary.message.contains("unparseable response"));
    assert!(driver.calls().is_empty());

    let history = orchestrator.history().summary();
    assert_eq!(history.pages_analyzed, 1);
    assert_eq!(history.tasks_executed, 1);
}

#[tokio::test]
async fn provider_error_aborts_without_page_analysis() {
    let provider = ScriptedProvider::default().then_fail("quota exceeded");
    let (_driver, _provider, mut orchestrator) = setup(provider, 10);

    let summary = orchestrator.run("anything").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert!(summary.message.contains("quota exceeded"));
    let history = orchestrator.history().summary();
    assert_eq!(history.pages_analyzed, 0);
    assert_eq!(history.tasks_executed, 1);
}

#[tokio::test]
async fn unreadable_page_aborts_before_planning() {
    let (driver, provider, mut orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 10);
    driver.close();

    let summary = orchestrator.run("anything").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert_eq!(summary.steps, 1);
    assert!(provider.prompts().is_empty());
    assert!(matches!(
        summary.log.as_slice(),
        [ExecutionLogEntry::Errored { step: 1, .. }]
    ));
}

#[tokio::test]
async fn failed_action_aborts_and_keeps_failure_context() {
    let answer = r##"{"actions":[{"type":"click","selector":"#missing"}]}"##;
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(answer), 10);
    driver.fail("#missing", DriverError::failed("no node matches #missing"));

    let summary = orchestrator.run("press the button").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert_eq!(summary.steps, 1);
    let [ExecutionLogEntry::Executed { outcome, .. }] = summary.log.as_slice() else {
        panic!("expected one executed entry, got {:?}", summary.log);
    };
    assert!(!outcome.success);
    assert!(outcome.message.contains("no node matches #missing"));

    let failure = summary.failure.expect("failure context");
    assert_eq!(failure.step, 1);
    assert_eq!(failure.snapshot.url, "https://example.com/");
    assert!(failure.error.contains("no node matches #missing"));
}

#[tokio::test]
async fn closed_page_during_action_is_logged_as_error() {
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 10);
    driver.fail("#next", DriverError::Closed("target closed".into()));

    let summary = orchestrator.run("next").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert!(matches!(
        summary.log.as_slice(),
        [ExecutionLogEntry::Errored { step: 1, .. }]
    ));
    assert!(summary.failure.is_some());
}

#[tokio::test]
async fn cancellation_is_observed_between_steps() {
    let (_driver, _provider, orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 10);
    let executor = Arc::new(CancellingExecutor {
        calls: AtomicU32::new(0),
        cancel_at: 2,
        handle: orchestrator.cancel_handle(),
    });
    let mut orchestrator = orchestrator.with_executor(executor.clone());

    let summary = orchestrator.run("keep going").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert_eq!(summary.steps, 2);
    assert_eq!(summary.log.len(), 2);
    assert!(summary.message.contains("cancelled"));

    // The flag is consumed; the next run starts clean.
    let summary = orchestrator.run_with_budget("keep going", 1).await;
    assert_eq!(summary.state, TaskState::Exhausted);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancelled_before_start_runs_no_step() {
    let (driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 10);
    orchestrator.cancel_handle().cancel();

    let summary = orchestrator.run("never mind").await;

    assert_eq!(summary.state, TaskState::Aborted);
    assert_eq!(summary.steps, 0);
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn history_accumulates_across_runs() {
    let (_driver, _provider, mut orchestrator) = setup(ScriptedProvider::always(CLICK_NEXT), 3);

    orchestrator.run("first").await;
    orchestrator.run_with_budget("second", 2).await;

    let history = orchestrator.history().summary();
    assert_eq!(history.total_interactions, 7);
    assert_eq!(history.tasks_executed, 2);
    assert_eq!(history.pages_analyzed, 5);
    assert_eq!(history.recent.len(), 5);

    orchestrator.clear_history();
    assert!(orchestrator.history().is_empty());
}
