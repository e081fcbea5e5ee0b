//! Per-agent trait vector.
//!
//! Every parameter lives in `[0, 1]`. The neutral threshold is the agent's
//! historical mean reward, one baseline shared by all parameters and fed once
//! per update cycle. A reward above it pulls a value toward 1.0, anything else
//! toward 0.0, by a fraction `learning_rate` of the remaining distance.

use crate::{usable_reward, RunningMean};
use fitdev_core::catalog::NEUTRAL_PARAMETER;
use fitdev_core::{log, unit_clamp, Learner, RoleProfile};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_LEARNING_RATE: f64 = 0.05;
/// Lower bound for a configured learning rate that is zero or negative.
pub const MIN_LEARNING_RATE: f64 = 1e-3;
/// Oldest history records are dropped beyond this length.
pub const MAX_HISTORY: usize = 1024;

/// Parameter values after one update cycle and the reward that drove it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterRecord {
    pub parameters: BTreeMap<String, f64>,
    pub reward: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterStore {
    learning_rate: f64,
    values: BTreeMap<String, f64>,
    #[serde(default)]
    baseline: RunningMean,
    history: Vec<ParameterRecord>,
}

/// Clamp a learning rate into `(0, 1]`.
#[must_use]
pub fn normalize_learning_rate(rate: f64) -> f64 {
    let normalized = if !rate.is_finite() {
        DEFAULT_LEARNING_RATE
    } else if rate <= 0.0 {
        MIN_LEARNING_RATE
    } else {
        rate.min(1.0)
    };
    if normalized != rate {
        log::warn(format_args!(
            "learning rate {rate} outside (0, 1]; using {normalized}"
        ));
    }
    normalized
}

impl ParameterStore {
    /// Store seeded with role defaults. The initial values are the first history record.
    #[must_use]
    pub fn new(defaults: &BTreeMap<String, f64>, learning_rate: f64) -> Self {
        let values: BTreeMap<String, f64> = defaults
            .iter()
            .map(|(k, v)| (k.clone(), unit_clamp(*v, NEUTRAL_PARAMETER)))
            .collect();
        Self {
            learning_rate: normalize_learning_rate(learning_rate),
            history: vec![ParameterRecord {
                parameters: values.clone(),
                reward: 0.0,
            }],
            values,
            baseline: RunningMean::default(),
        }
    }

    #[must_use]
    pub fn from_profile(profile: &RoleProfile, learning_rate: f64) -> Self {
        Self::new(&profile.parameters, learning_rate)
    }

    /// Current value, 0.5 for a parameter never seen.
    #[must_use]
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(NEUTRAL_PARAMETER)
    }

    /// Manual override, clamped into `[0, 1]`.
    pub fn set(&mut self, name: &str, value: f64) {
        let clamped = unit_clamp(value, NEUTRAL_PARAMETER);
        if clamped != value {
            log::warn(format_args!(
                "parameter {name} set to {value}; clamped to {clamped}"
            ));
        }
        self.values.insert(name.to_string(), clamped);
    }

    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Mean of every reward the agent was updated with, `None` before the first.
    #[must_use]
    pub fn baseline(&self) -> Option<f64> {
        self.baseline.mean()
    }

    #[must_use]
    pub fn history(&self) -> &[ParameterRecord] {
        &self.history
    }

    /// One update cycle for a single parameter: move `name` toward 1.0 if
    /// `reward` beats the agent baseline, toward 0.0 otherwise, then fold
    /// `reward` into the baseline.
    ///
    /// The very first reward only seeds the baseline. A non-finite reward
    /// leaves everything untouched; a negative one counts as zero. Returns the
    /// new value.
    pub fn update(&mut self, name: &str, reward: f64, learning_rate: f64) -> f64 {
        let Some(reward) = usable_reward(reward, name) else {
            return self.get(name);
        };
        let threshold = self.baseline.mean();
        let next = self.step(name, reward, normalize_learning_rate(learning_rate), threshold);
        self.baseline.push(reward);
        next
    }

    fn step(&mut self, name: &str, reward: f64, rate: f64, threshold: Option<f64>) -> f64 {
        let current = self.get(name);
        let next = match threshold {
            None => current,
            Some(mean) if reward > mean => current + rate * (1.0 - current),
            Some(_) => current - rate * current,
        }
        .clamp(0.0, 1.0);
        self.values.insert(name.to_string(), next);
        next
    }

    /// One task-completion step: update every parameter relevant to
    /// `task_type` with the store's own learning rate and append to the history.
    ///
    /// Returns the parameters that were updated with their new values.
    pub fn update_relevant(
        &mut self,
        profile: &RoleProfile,
        task_type: &str,
        reward: f64,
    ) -> BTreeMap<String, f64> {
        let Some(reward) = usable_reward(reward, "parameter update") else {
            return BTreeMap::new();
        };
        let names: Vec<String> = self
            .values
            .keys()
            .filter(|name| profile.is_relevant(name, task_type))
            .cloned()
            .collect();
        let rate = self.learning_rate;
        let threshold = self.baseline.mean();
        let updated = names
            .into_iter()
            .map(|name| {
                let value = self.step(&name, reward, rate, threshold);
                (name, value)
            })
            .collect();
        self.baseline.push(reward);

        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(ParameterRecord {
            parameters: self.values.clone(),
            reward,
        });
        updated
    }

    /// The parameter set that earned the highest reward so far.
    #[must_use]
    pub fn optimal_parameters(&self) -> BTreeMap<String, f64> {
        self.history
            .iter()
            .max_by(|a, b| a.reward.total_cmp(&b.reward))
            .map_or_else(|| self.values.clone(), |r| r.parameters.clone())
    }

    fn sanitize(&mut self) {
        self.learning_rate = normalize_learning_rate(self.learning_rate);
        for value in self.values.values_mut() {
            *value = unit_clamp(*value, NEUTRAL_PARAMETER);
        }
        if !self.baseline.is_finite() {
            self.baseline = RunningMean::default();
        }
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}

impl Learner for ParameterStore {
    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Replaces the whole store; values are re-clamped and a broken baseline reset.
    fn load(&mut self, snapshot: Value) -> Result<(), serde_json::Error> {
        let mut restored: ParameterStore = serde_json::from_value(snapshot)?;
        restored.sanitize();
        *self = restored;
        Ok(())
    }
}
