//! Reads a task request from stdin and prints the template and strategy a
//! fresh agent would pick for it.
//!
//! Input is a JSON object `{"role": ..., "task_type": ..., "category": ...}`
//! or a bare task type; empty input asks a backend agent about API work.

use std::io::{self, Read};

use fitdev_core::{Decision, LearningConfig};
use fitdev_learners::AgentLearner;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Deserialize)]
struct TaskRequest {
    #[serde(default = "default_role")]
    role: String,
    task_type: String,
    #[serde(default)]
    category: Option<String>,
}

fn default_role() -> String {
    "backend".to_string()
}

#[derive(Serialize)]
struct DecisionRecord {
    ts: String,
    role: String,
    task_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<Decision>,
    strategy: Decision,
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let request = if input.trim().is_empty() {
        TaskRequest {
            role: default_role(),
            task_type: "api_development".into(),
            category: None,
        }
    } else {
        match serde_json::from_str::<TaskRequest>(&input) {
            Ok(request) => request,
            Err(_) => TaskRequest {
                role: default_role(),
                task_type: input.trim().trim_matches('"').to_string(),
                category: None,
            },
        }
    };

    let config = LearningConfig::from_env()?;
    let agent = AgentLearner::new("decide", request.role.as_str(), &config);
    let category = request.category.as_deref().unwrap_or(&request.task_type);

    let record = DecisionRecord {
        ts: iso8601_now(),
        role: request.role.clone(),
        task_type: request.task_type.clone(),
        template: agent.select_template(&request.task_type).ok(),
        strategy: agent.choose_strategy(category)?,
    };

    serde_json::to_writer_pretty(io::stdout(), &record)?;
    println!();

    Ok(())
}
