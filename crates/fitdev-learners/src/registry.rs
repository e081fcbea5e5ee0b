//! Organization-wide table of agent learners.
//!
//! Each agent sits behind its own [`Mutex`]: tasks for different agents never
//! contend, concurrent tasks for one agent are serialized. Registering and
//! removing agents needs `&mut self`.

use crate::agent::{AgentLearner, TaskFeedback};
use crate::error::{LearnError, Result};
use fitdev_core::{log, Decision, Learner, LearningConfig, TaskOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;

/// On-disk form of one agent.
#[derive(Debug, Serialize, Deserialize)]
struct SavedAgent {
    agent_id: String,
    role: String,
    #[serde(with = "time::serde::rfc3339")]
    saved_at: OffsetDateTime,
    state: Value,
}

#[derive(Debug, Default)]
pub struct LearningRegistry {
    config: LearningConfig,
    agents: HashMap<String, Mutex<AgentLearner>>,
}

impl LearningRegistry {
    #[must_use]
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            agents: HashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Add an agent with fresh learners for `role`. An existing agent is kept
    /// and `false` returned.
    pub fn register(&mut self, agent_id: &str, role: &str) -> bool {
        if self.agents.contains_key(agent_id) {
            return false;
        }
        let learner = AgentLearner::new(agent_id, role, &self.config);
        self.agents.insert(agent_id.to_string(), Mutex::new(learner));
        true
    }

    pub fn remove(&mut self, agent_id: &str) -> Option<AgentLearner> {
        self.agents
            .remove(agent_id)
            .map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Registered agent ids, sorted.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run `f` with exclusive access to one agent's learners.
    pub fn with_agent<T>(&self, agent_id: &str, f: impl FnOnce(&mut AgentLearner) -> T) -> Result<T> {
        let slot = self
            .agents
            .get(agent_id)
            .ok_or_else(|| LearnError::UnknownAgent(agent_id.to_string()))?;
        let mut learner = slot
            .lock()
            .map_err(|_| LearnError::Internal("agent lock poisoned"))?;
        Ok(f(&mut learner))
    }

    pub fn select_template(&self, agent_id: &str, task_type: &str) -> Result<Decision> {
        self.with_agent(agent_id, |a| a.select_template(task_type))?
    }

    pub fn choose_strategy(&self, agent_id: &str, category: &str) -> Result<Decision> {
        self.with_agent(agent_id, |a| a.choose_strategy(category))?
    }

    pub fn update_parameters(
        &self,
        agent_id: &str,
        task_type: &str,
        reward: f64,
    ) -> Result<BTreeMap<String, f64>> {
        self.with_agent(agent_id, |a| a.update_parameters(task_type, reward))
    }

    /// Single-parameter update with an explicit learning rate; returns the new value.
    pub fn update_parameter(
        &self,
        agent_id: &str,
        parameter: &str,
        reward: f64,
        learning_rate: f64,
    ) -> Result<f64> {
        self.with_agent(agent_id, |a| {
            a.parameters_mut().update(parameter, reward, learning_rate)
        })
    }

    /// Route a finished task to the agent named in it.
    pub fn complete_task(&self, outcome: &TaskOutcome) -> Result<TaskFeedback> {
        self.with_agent(&outcome.agent_id, |a| a.complete_task(outcome))?
    }

    /// Write one `<agent>.json` per agent into `dir`. Returns the number written.
    pub fn save(&self, dir: &Path) -> Result<usize> {
        std::fs::create_dir_all(dir)?;
        let saved_at = OffsetDateTime::now_utc();
        for agent_id in self.agent_ids() {
            let saved = self.with_agent(&agent_id, |a| SavedAgent {
                agent_id: a.agent_id().to_string(),
                role: a.role().to_string(),
                saved_at,
                state: a.snapshot(),
            })?;
            let path = dir.join(state_file_name(&agent_id));
            let file = File::create(&path)?;
            serde_json::to_writer_pretty(file, &saved)?;
            log::debug(format_args!("saved agent {agent_id} to {}", path.display()));
        }
        Ok(self.agents.len())
    }

    /// Restore every `*.json` in `dir`, registering agents that are not known
    /// yet. A missing directory restores nothing. Returns the number loaded.
    pub fn load(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let saved: SavedAgent = serde_json::from_reader(File::open(&path)?)?;
            self.register(&saved.agent_id, &saved.role);
            let agent_id = saved.agent_id;
            let state = saved.state;
            self.with_agent(&agent_id, |a| a.load(state))??;
            log::debug(format_args!(
                "loaded agent {agent_id} saved at {} from {}",
                saved.saved_at,
                path.display()
            ));
            loaded += 1;
        }
        Ok(loaded)
    }

    /// [`save`](Self::save) into the configured `state_dir`; nothing when unset.
    pub fn flush(&self) -> Result<usize> {
        match self.config.state_dir.clone() {
            Some(dir) => self.save(&dir),
            None => Ok(0),
        }
    }

    /// [`load`](Self::load) from the configured `state_dir`; nothing when unset.
    pub fn restore(&mut self) -> Result<usize> {
        match self.config.state_dir.clone() {
            Some(dir) => self.load(&dir),
            None => Ok(0),
        }
    }
}

/// File name for an agent id. `[a-z0-9-]` is kept; every other byte becomes
/// `_XX` (upper-case hex), so distinct ids never share a file, even on
/// case-insensitive filesystems. The empty id maps to `_.json`.
fn state_file_name(agent_id: &str) -> String {
    if agent_id.is_empty() {
        return "_.json".to_string();
    }
    let mut stem = String::with_capacity(agent_id.len());
    for byte in agent_id.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    format!("{stem}.json")
}
