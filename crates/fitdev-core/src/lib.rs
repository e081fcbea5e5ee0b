#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Core types shared by the FitDev learners.
//!
//! A completed task arrives as a [`TaskOutcome`](outcome::TaskOutcome), the
//! compensation calculator turns it into a reward, and every learner that
//! implements [`Learner`] can be persisted as a JSON snapshot.

pub mod catalog;
pub mod config;
pub mod log;
pub mod outcome;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use config::{
    CompensationWeights, ConfigError, ExploitRule, ExplorationSchedule, LearningConfig,
    RoleCategory, RoleProfile, StrategySpec, TemplateSpec,
};
pub use outcome::TaskOutcome;

/// Why a selector picked what it picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    /// Uniform pick with probability ε.
    Explore,
    /// Best known option.
    Exploit,
    /// Nothing observed yet, uniform pick.
    Cold,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    /// Template or strategy id.
    pub id: String,
    /// Task type or category the choice was made for.
    pub kind: String,
    pub why: Reason,
    /// Mean reward of the chosen option at decision time, if it was observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Long-lived learner state that can be flushed and restored.
pub trait Learner {
    fn snapshot(&self) -> Value;
    fn load(&mut self, snapshot: Value) -> Result<(), serde_json::Error>;
}

/// Clamp a probability-like value into `[0, 1]`, mapping non-finite input to `fallback`.
#[must_use]
pub fn unit_clamp(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}
