//! ε-greedy choice among prompt templates.
//!
//! With probability `epsilon` a template tagged for the task type is picked
//! uniformly; otherwise the one with the best running mean reward wins, ties
//! going to the template observed least often.

use crate::error::{LearnError, Result};
use crate::{greedy_index, usable_reward, RunningMean};
use fitdev_core::{log, unit_clamp, Decision, Learner, Reason, TemplateSpec};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_TEMPLATE_EPSILON: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    pub id: String,
    pub task_type: String,
    pub text: String,
    #[serde(default)]
    pub reward: RunningMean,
}

impl From<TemplateSpec> for PromptTemplate {
    fn from(spec: TemplateSpec) -> Self {
        Self {
            id: spec.id,
            task_type: spec.task_type,
            text: spec.text,
            reward: RunningMean::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSelector {
    epsilon: f64,
    templates: Vec<PromptTemplate>,
}

impl TemplateSelector {
    #[must_use]
    pub fn new(catalog: Vec<TemplateSpec>, epsilon: f64) -> Self {
        let mut selector = Self {
            epsilon: clamp_epsilon(epsilon),
            templates: Vec::with_capacity(catalog.len()),
        };
        for spec in catalog {
            selector.add_template(spec);
        }
        selector
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Register a template; returns `false` if the id is taken.
    pub fn add_template(&mut self, spec: TemplateSpec) -> bool {
        if self.template(&spec.id).is_some() {
            return false;
        }
        self.templates.push(spec.into());
        true
    }

    #[must_use]
    pub fn template(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn templates(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.iter()
    }

    pub fn select(&self, task_type: &str) -> Result<Decision> {
        self.select_with(task_type, &mut thread_rng())
    }

    pub fn select_with<R: Rng + ?Sized>(&self, task_type: &str, rng: &mut R) -> Result<Decision> {
        let candidates: Vec<&PromptTemplate> = self
            .templates
            .iter()
            .filter(|t| t.task_type == task_type)
            .collect();
        if candidates.is_empty() {
            return Err(LearnError::UnknownTaskType(task_type.to_string()));
        }

        let explore = rng.gen::<f64>() < self.epsilon;
        let (chosen, why) = if explore {
            let chosen = candidates
                .choose(rng)
                .ok_or(LearnError::Internal("empty template candidates"))?;
            (*chosen, Reason::Explore)
        } else {
            let idx = greedy_index(candidates.iter().map(|t| t.reward.greedy_key()))
                .ok_or(LearnError::Internal("empty template candidates"))?;
            (candidates[idx], Reason::Exploit)
        };

        log::debug(format_args!(
            "template {} for {task_type} ({why:?})",
            chosen.id
        ));
        Ok(Decision {
            id: chosen.id.clone(),
            kind: task_type.to_string(),
            why,
            score: chosen.reward.mean(),
        })
    }

    /// Fold `reward` into the template's running mean. Non-finite rewards are
    /// dropped and negatives count as zero.
    pub fn record(&mut self, template_id: &str, reward: f64) -> Result<()> {
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| LearnError::UnknownTemplate(template_id.to_string()))?;
        if let Some(reward) = usable_reward(reward, template_id) {
            template.reward.push(reward);
        }
        Ok(())
    }

    /// Fill `{name}` placeholders from `vars`.
    ///
    /// When a placeholder has no value the prompt degrades to
    /// `Complete this <task_type> task: <task_description>`.
    pub fn render(&self, template_id: &str, vars: &BTreeMap<String, String>) -> Result<String> {
        let template = self
            .template(template_id)
            .ok_or_else(|| LearnError::UnknownTemplate(template_id.to_string()))?;
        match fill(&template.text, vars) {
            Ok(prompt) => Ok(prompt),
            Err(missing) => {
                log::warn(format_args!(
                    "template {template_id} needs '{missing}'; using fallback prompt"
                ));
                Ok(format!(
                    "Complete this {} task: {}",
                    template.task_type,
                    vars.get("task_description").map_or("", String::as_str)
                ))
            }
        }
    }
}

fn clamp_epsilon(epsilon: f64) -> f64 {
    let clamped = unit_clamp(epsilon, DEFAULT_TEMPLATE_EPSILON);
    if clamped != epsilon {
        log::warn(format_args!("template epsilon {epsilon} outside [0, 1]; using {clamped}"));
    }
    clamped
}

/// Substitute `{name}` placeholders; `Err` carries the first missing name.
fn fill(text: &str, vars: &BTreeMap<String, String>) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                let value = vars.get(name).ok_or_else(|| name.to_string())?;
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

impl Learner for TemplateSelector {
    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Merge a snapshot: known ids take the stored reward statistics, ids the
    /// catalog does not know are restored as runtime additions.
    fn load(&mut self, snapshot: Value) -> std::result::Result<(), serde_json::Error> {
        let restored: TemplateSelector = serde_json::from_value(snapshot)?;
        self.epsilon = clamp_epsilon(restored.epsilon);
        for mut stored in restored.templates {
            if !stored.reward.is_finite() {
                stored.reward = RunningMean::default();
            }
            match self.templates.iter_mut().find(|t| t.id == stored.id) {
                Some(existing) => existing.reward = stored.reward,
                None => self.templates.push(stored),
            }
        }
        Ok(())
    }
}
