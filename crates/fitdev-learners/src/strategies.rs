//! Multi-armed bandit over task strategies.
//!
//! Same ε-greedy shape as the template selector, with two differences: ε
//! decays after every observation (`ε ← max(ε_min, ε · decay)`), and a
//! category nobody has observed yet is served uniformly at random so a
//! registered strategy always comes back.

use crate::error::{LearnError, Result};
use crate::{greedy_index, usable_reward, RunningMean};
use fitdev_core::catalog::GENERAL;
use fitdev_core::{
    log, unit_clamp, Decision, ExploitRule, ExplorationSchedule, Learner, Reason, StrategySpec,
};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Strategy {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub reward: RunningMean,
}

impl Strategy {
    /// Mean observed reward, `None` before the first pull.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        self.reward.mean()
    }

    #[must_use]
    pub fn pulls(&self) -> u64 {
        self.reward.count()
    }

    /// Total reward credited so far.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cumulative_reward(&self) -> f64 {
        self.mean().map_or(0.0, |m| m * self.pulls() as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn ucb(&self, total_pulls: u64) -> f64 {
        match self.mean() {
            None => f64::INFINITY,
            Some(mean) => {
                mean + (2.0 * (total_pulls as f64).ln() / self.pulls() as f64).sqrt()
            }
        }
    }
}

impl From<StrategySpec> for Strategy {
    fn from(spec: StrategySpec) -> Self {
        Self {
            id: spec.id,
            category: spec.category,
            description: spec.description,
            steps: spec.steps,
            reward: RunningMean::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyBandit {
    epsilon: f64,
    epsilon_min: f64,
    decay: f64,
    #[serde(default)]
    rule: ExploitRule,
    #[serde(default)]
    observations: u64,
    strategies: Vec<Strategy>,
}

impl StrategyBandit {
    #[must_use]
    pub fn new(catalog: Vec<StrategySpec>, schedule: ExplorationSchedule, rule: ExploitRule) -> Self {
        let (epsilon, epsilon_min, decay) = normalize_schedule(schedule);
        let mut bandit = Self {
            epsilon,
            epsilon_min,
            decay,
            rule,
            observations: 0,
            strategies: Vec::with_capacity(catalog.len()),
        };
        for spec in catalog {
            bandit.add_strategy(spec);
        }
        bandit
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of accepted `observe` calls.
    #[must_use]
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Register a strategy; returns `false` if the id is taken.
    pub fn add_strategy(&mut self, spec: StrategySpec) -> bool {
        if self.strategy(&spec.id).is_some() {
            return false;
        }
        self.strategies.push(spec.into());
        true
    }

    #[must_use]
    pub fn strategy(&self, id: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter()
    }

    /// Strategies serving `category`; a category without its own falls back to `general`.
    fn candidates(&self, category: &str) -> Vec<&Strategy> {
        let own: Vec<&Strategy> = self
            .strategies
            .iter()
            .filter(|s| s.category == category)
            .collect();
        if !own.is_empty() || category == GENERAL {
            return own;
        }
        log::warn(format_args!(
            "no strategies for category {category}; falling back to {GENERAL}"
        ));
        self.strategies
            .iter()
            .filter(|s| s.category == GENERAL)
            .collect()
    }

    pub fn choose(&self, category: &str) -> Result<Decision> {
        self.choose_with(category, &mut thread_rng())
    }

    pub fn choose_with<R: Rng + ?Sized>(&self, category: &str, rng: &mut R) -> Result<Decision> {
        let candidates = self.candidates(category);
        if candidates.is_empty() {
            return Err(LearnError::UnknownCategory(category.to_string()));
        }

        let cold = candidates.iter().all(|s| s.pulls() == 0);
        let explore = rng.gen::<f64>() < self.epsilon;
        let (chosen, why) = if explore || cold {
            let chosen = candidates
                .choose(rng)
                .ok_or(LearnError::Internal("empty strategy candidates"))?;
            (*chosen, if explore { Reason::Explore } else { Reason::Cold })
        } else {
            let idx = match self.rule {
                ExploitRule::Greedy => {
                    greedy_index(candidates.iter().map(|s| s.reward.greedy_key()))
                }
                ExploitRule::Ucb1 => {
                    let total: u64 = candidates.iter().map(|s| s.pulls()).sum();
                    greedy_index(candidates.iter().map(|s| (s.ucb(total), s.pulls())))
                }
            }
            .ok_or(LearnError::Internal("empty strategy candidates"))?;
            (candidates[idx], Reason::Exploit)
        };

        log::debug(format_args!(
            "strategy {} for {category} ({why:?}, epsilon {:.4})",
            chosen.id, self.epsilon
        ));
        Ok(Decision {
            id: chosen.id.clone(),
            kind: category.to_string(),
            why,
            score: chosen.mean(),
        })
    }

    /// Fold `reward` into a strategy's running mean and decay ε.
    ///
    /// A negative reward counts as zero. A non-finite reward is not credited,
    /// but the call still counts as an observation for the ε schedule.
    pub fn observe(&mut self, strategy_id: &str, reward: f64) -> Result<()> {
        let strategy = self
            .strategies
            .iter_mut()
            .find(|s| s.id == strategy_id)
            .ok_or_else(|| LearnError::UnknownStrategy(strategy_id.to_string()))?;
        if let Some(reward) = usable_reward(reward, strategy_id) {
            strategy.reward.push(reward);
        }
        self.observations += 1;
        self.epsilon = self.epsilon_min.max(self.epsilon * self.decay);
        Ok(())
    }

    /// Highest mean among observed strategies of `category`.
    #[must_use]
    pub fn best_strategy(&self, category: &str) -> Option<&Strategy> {
        self.strategies
            .iter()
            .filter(|s| s.category == category)
            .filter_map(|s| s.mean().map(|m| (s, m)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }
}

/// Clamp ε, ε_min and decay into `[0, 1]` with `ε_min ≤ ε`.
fn normalize_schedule(schedule: ExplorationSchedule) -> (f64, f64, f64) {
    let defaults = ExplorationSchedule::default();
    let epsilon = unit_clamp(schedule.epsilon, defaults.epsilon);
    let mut epsilon_min = unit_clamp(schedule.epsilon_min, defaults.epsilon_min);
    if epsilon_min > epsilon {
        epsilon_min = epsilon;
    }
    let decay = unit_clamp(schedule.decay, defaults.decay);

    if epsilon != schedule.epsilon
        || epsilon_min != schedule.epsilon_min
        || decay != schedule.decay
    {
        log::warn(format_args!(
            "exploration schedule {schedule:?} adjusted to epsilon {epsilon}, min {epsilon_min}, decay {decay}"
        ));
    }
    (epsilon, epsilon_min, decay)
}

impl Learner for StrategyBandit {
    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Merge a snapshot: schedule and counters come from the snapshot, known
    /// strategies take the stored statistics, unknown ones are restored as
    /// runtime additions.
    fn load(&mut self, snapshot: Value) -> std::result::Result<(), serde_json::Error> {
        let restored: StrategyBandit = serde_json::from_value(snapshot)?;
        let (epsilon, epsilon_min, decay) = normalize_schedule(ExplorationSchedule {
            epsilon: restored.epsilon,
            epsilon_min: restored.epsilon_min,
            decay: restored.decay,
        });
        self.epsilon = epsilon;
        self.epsilon_min = epsilon_min;
        self.decay = decay;
        self.rule = restored.rule;
        self.observations = restored.observations;

        for mut stored in restored.strategies {
            if !stored.reward.is_finite() {
                stored.reward = RunningMean::default();
            }
            match self.strategies.iter_mut().find(|s| s.id == stored.id) {
                Some(existing) => existing.reward = stored.reward,
                None => self.strategies.push(stored),
            }
        }
        Ok(())
    }
}
