use tracing::{info, warn};

use crate::planner::Planner;
use crate::prompts::error_recovery_prompt;
use crate::types::{ActionPlan, PageSnapshot};

/// Proposes an alternative plan after a failed step.
///
/// One request, one answer: no retries, and a failed recovery is never
/// itself recovered. The caller decides what to do with the plan.
#[derive(Clone)]
pub struct RecoveryPlanner {
    planner: Planner,
}

impl RecoveryPlanner {
    pub fn new(planner: Planner) -> Self {
        Self { planner }
    }

    pub async fn recover(
        &self,
        snapshot: &PageSnapshot,
        error: &str,
        original_task: &str,
    ) -> ActionPlan {
        info!(url = %snapshot.url, "planning recovery from: {error}");
        let prompt = error_recovery_prompt(snapshot, error, original_task);
        match self.planner.request(&prompt).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("recovery planning failed: {e}");
                ActionPlan::failed(e.to_string())
            }
        }
    }
}
