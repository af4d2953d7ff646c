use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::types::{ActionPlan, ExecutionLogEntry};

/// How many records [`ConversationHistory::summary`] hands back.
pub const RECENT_RECORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryRecord {
    PageAnalysis {
        task: String,
        url: String,
        plan: ActionPlan,
        timestamp: DateTime<Utc>,
    },
    TaskExecution {
        task: String,
        steps: u32,
        completed: bool,
        log: Vec<ExecutionLogEntry>,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total_interactions: usize,
    pub tasks_executed: usize,
    pub pages_analyzed: usize,
    pub recent: Vec<HistoryRecord>,
}

/// Append-only record of planning calls and finished runs. Nothing is
/// discarded until [`clear`](Self::clear); only reads are bounded.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    records: Vec<HistoryRecord>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> HistorySummary {
        let tasks_executed = self
            .records
            .iter()
            .filter(|r| matches!(r, HistoryRecord::TaskExecution { .. }))
            .count();
        let start = self.records.len().saturating_sub(RECENT_RECORDS);
        HistorySummary {
            total_interactions: self.records.len(),
            tasks_executed,
            pages_analyzed: self.records.len() - tasks_executed,
            recent: self.records[start..].to_vec(),
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        info!("conversation history cleared");
    }
}
