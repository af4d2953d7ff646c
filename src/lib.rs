//! Goal-directed browser automation: observe the page, ask a language model
//! for the next action, validate it, execute it, repeat.

pub mod brain;
pub mod config;
pub mod credentials;
pub mod dom;
pub mod driver;
pub mod error;
pub mod executor;
pub mod hands;
pub mod history;
pub mod login;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod prompts;
pub mod recovery;
pub mod types;

pub use brain::{GeminiClient, ModelProvider};
pub use config::Settings;
pub use driver::{DriverError, PageDriver};
pub use error::AgentError;
pub use executor::{ActionExecutor, DriverExecutor};
pub use orchestrator::{OrchestratorConfig, TaskOrchestrator, TaskState, TaskSummary};
pub use plan::parse_action_plan;
pub use types::{Action, ActionKind, ActionPlan, ExecutionOutcome, PageSnapshot};
