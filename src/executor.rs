use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::driver::{DriverError, PageDriver};
use crate::plan::{ActionRejection, validate_action};
use crate::types::{Action, ActionKind, ExecutionOutcome, ScrollDirection};

pub const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one validated action against the page.
///
/// Ordinary driver failures (timeouts, missing selectors, navigation errors)
/// come back as a failed [`ExecutionOutcome`]. `Err` is reserved for a page
/// that can no longer be driven at all.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &Action) -> Result<ExecutionOutcome, DriverError>;
}

pub struct DriverExecutor {
    driver: Arc<dyn PageDriver>,
}

impl DriverExecutor {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self { driver }
    }

    /// Execute an action straight from JSON. Types outside the action
    /// schema are refused before the driver is touched.
    pub async fn execute_raw(&self, value: &Value) -> Result<ExecutionOutcome, DriverError> {
        match validate_action(value) {
            Ok(action) => self.execute(&action).await,
            Err(ActionRejection::UnknownType(kind)) => Ok(ExecutionOutcome::failed(format!(
                "Unknown action type: {kind}"
            ))),
            Err(ActionRejection::MissingType) => {
                Ok(ExecutionOutcome::failed("Unknown action type"))
            }
            Err(reason) => Ok(ExecutionOutcome::failed(format!("Invalid action: {reason}"))),
        }
    }

    async fn run_primitive(&self, action: &Action) -> Result<String, DriverError> {
        let driver = self.driver.as_ref();
        match &action.kind {
            ActionKind::Click { selector } => {
                bounded(ELEMENT_TIMEOUT, driver.click(selector, ELEMENT_TIMEOUT)).await?;
                Ok(format!("Clicked {selector}"))
            }
            ActionKind::Type { selector, text } => {
                bounded(ELEMENT_TIMEOUT, driver.fill(selector, text, ELEMENT_TIMEOUT)).await?;
                Ok(format!("Typed in {selector}"))
            }
            ActionKind::Navigate { url } => {
                bounded(NAVIGATION_TIMEOUT, driver.goto(url, NAVIGATION_TIMEOUT)).await?;
                Ok(format!("Navigated to {url}"))
            }
            ActionKind::Wait {
                selector,
                timeout_ms,
            } => {
                let limit = Duration::from_millis(*timeout_ms).min(ELEMENT_TIMEOUT);
                bounded(limit, driver.wait_for_selector(selector, limit)).await?;
                Ok(format!("Waited for {selector}"))
            }
            ActionKind::Scroll { direction, amount } => {
                let dy = match direction {
                    ScrollDirection::Down => i64::from(*amount),
                    ScrollDirection::Up => -i64::from(*amount),
                };
                bounded(
                    ELEMENT_TIMEOUT,
                    driver.evaluate(&format!("window.scrollBy(0, {dy})")),
                )
                .await?;
                Ok(format!("Scrolled {}", direction.as_str()))
            }
            ActionKind::Select { selector, value } => {
                bounded(
                    ELEMENT_TIMEOUT,
                    driver.select_option(selector, value, ELEMENT_TIMEOUT),
                )
                .await?;
                Ok(format!("Selected {value} in {selector}"))
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for DriverExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutionOutcome, DriverError> {
        info!(%action, "executing");
        match self.run_primitive(action).await {
            Ok(message) => Ok(ExecutionOutcome::ok(message)),
            Err(e) if e.is_closed() => {
                error!(%action, "page unavailable: {e}");
                Err(e)
            }
            Err(e) => {
                error!(%action, "action failed: {e}");
                Ok(ExecutionOutcome::failed(format!("Action failed: {e}")))
            }
        }
    }
}

/// Hard ceiling on a driver call, on top of the timeout handed to the driver.
async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, DriverError>>,
) -> Result<T, DriverError> {
    let grace = Duration::from_secs(2);
    match tokio::time::timeout(limit + grace, fut).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout(limit)),
    }
}
