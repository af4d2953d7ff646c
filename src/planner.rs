use std::sync::Arc;

use tracing::{debug, error};

use crate::brain::ModelProvider;
use crate::error::AgentError;
use crate::plan::parse_action_plan;
use crate::prompts::task_analysis_prompt;
use crate::types::{ActionPlan, PageSnapshot};

/// Sends prompts to the model and runs every answer through the same parser.
#[derive(Clone)]
pub struct Planner {
    provider: Arc<dyn ModelProvider>,
}

impl Planner {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// Ask for the next action towards `task`. `Err` only when the provider
    /// call itself failed; bad answers come back as a failed plan.
    pub async fn plan(&self, snapshot: &PageSnapshot, task: &str) -> Result<ActionPlan, AgentError> {
        self.request(&task_analysis_prompt(snapshot, task)).await
    }

    pub(crate) async fn request(&self, prompt: &str) -> Result<ActionPlan, AgentError> {
        let raw = self.provider.generate(prompt).await.map_err(|e| {
            error!("planning request failed: {e}");
            e
        })?;
        debug!("raw plan: {raw}");
        Ok(parse_action_plan(&raw))
    }
}
