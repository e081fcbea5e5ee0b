#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Per-agent learning for FitDev.
//!
//! Each agent owns a [`ParameterStore`], a [`TemplateSelector`] and a
//! [`StrategyBandit`], bundled in an [`AgentLearner`]. The
//! [`LearningRegistry`] holds one learner per agent behind its own lock and
//! persists them as JSON snapshots.

pub mod agent;
pub mod error;
pub mod parameters;
pub mod registry;
pub mod strategies;
pub mod templates;

use serde::{Deserialize, Serialize};

pub use agent::{AgentLearner, TaskFeedback};
pub use error::{LearnError, Result};
pub use parameters::{ParameterRecord, ParameterStore};
pub use registry::LearningRegistry;
pub use strategies::{Strategy, StrategyBandit};
pub use templates::{PromptTemplate, TemplateSelector};

/// Incremental mean: `mean ← mean + (x − mean) / (count + 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    mean: f64,
    count: u64,
}

impl RunningMean {
    /// `None` until the first value arrives.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self, value: f64) {
        self.mean += (value - self.mean) / (self.count + 1) as f64;
        self.count += 1;
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite()
    }

    /// Sort key for greedy choice; unobserved options rank as mean 0.
    #[must_use]
    pub fn greedy_key(&self) -> (f64, u64) {
        (self.mean().unwrap_or(0.0), self.count)
    }
}

/// Reward a learner may fold in: `None` for a non-finite value, negatives
/// clamped to 0. Both cases are logged.
pub(crate) fn usable_reward(reward: f64, target: &str) -> Option<f64> {
    if !reward.is_finite() {
        fitdev_core::log::warn(format_args!(
            "ignoring non-finite reward {reward} for {target}"
        ));
        return None;
    }
    if reward < 0.0 {
        fitdev_core::log::warn(format_args!(
            "negative reward {reward} for {target} clamped to 0"
        ));
        return Some(0.0);
    }
    Some(reward)
}

/// Index of the best `(score, count)` pair: highest score, then fewest
/// observations, then earliest position.
pub(crate) fn greedy_index(keys: impl IntoIterator<Item = (f64, u64)>) -> Option<usize> {
    let mut best: Option<(usize, f64, u64)> = None;
    for (idx, (score, count)) in keys.into_iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, best_score, best_count)) => {
                score > best_score || (score == best_score && count < best_count)
            }
        };
        if better {
            best = Some((idx, score, count));
        }
    }
    best.map(|(idx, _, _)| idx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_tracks_values() {
        let mut m = RunningMean::default();
        assert_eq!(m.mean(), None);
        for v in [1.0, 2.0, 6.0] {
            m.push(v);
        }
        assert!((m.mean().unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(m.count(), 3);
    }

    #[test]
    fn greedy_index_breaks_ties_by_count_then_position() {
        assert_eq!(greedy_index(Vec::<(f64, u64)>::new()), None);
        assert_eq!(greedy_index([(0.5, 3), (0.9, 7), (0.9, 2)]), Some(2));
        assert_eq!(greedy_index([(0.0, 0), (0.0, 0)]), Some(0));
        assert_eq!(greedy_index([(f64::INFINITY, 0), (5.0, 1)]), Some(0));
    }

    #[test]
    fn running_mean_stays_finite_near_max() {
        let mut m = RunningMean::default();
        m.push(1e308);
        m.push(1e308);
        assert!(m.is_finite());
        assert!((m.mean().unwrap() - 1e308).abs() <= 1e292);
    }

    #[test]
    fn usable_reward_clamps_negatives_and_drops_non_finite() {
        assert_eq!(usable_reward(-3.0, "x"), Some(0.0));
        assert_eq!(usable_reward(2.5, "x"), Some(2.5));
        assert_eq!(usable_reward(f64::NAN, "x"), None);
        assert_eq!(usable_reward(f64::NEG_INFINITY, "x"), None);
    }
}
