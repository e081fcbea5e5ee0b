//! The record an orchestrator hands over once a task is done.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A completed task, as reported by whoever ran it.
///
/// `template_id` and `strategy_id` name the choices the agent made for this
/// task; learners only get credit when the id is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub agent_id: String,
    pub task_type: String,
    /// Strategy category. Falls back to `task_type` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Critic evaluation in `[0, 1]`.
    pub critic_score: f64,
    /// Role-specific performance metrics, each in `[0, 1]`.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<String>,
    /// RFC 3339 completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl TaskOutcome {
    #[must_use]
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(&self.task_type)
    }
}
