#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Task compensation.
//!
//! Turns a finished task into a scalar reward: a weighted mean of the role's
//! performance metrics and the critic score, scaled by the role's base rate.
//! The reward is what every learner in `fitdev-learners` trains on. Paid
//! rewards can be kept in a [`CompensationLedger`] for later analysis.

use fitdev_core::{log, unit_clamp, CompensationWeights, RoleProfile, TaskOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Fallback timestamp when formatting fails
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Error)]
pub enum CompensationError {
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ledger serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CompensationError>;

/// Pure reward computation for one role.
#[derive(Debug, Clone, Default)]
pub struct CompensationCalculator {
    weights: CompensationWeights,
}

impl CompensationCalculator {
    #[must_use]
    pub fn new(weights: CompensationWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn for_role(profile: &RoleProfile) -> Self {
        Self::new(profile.weights.clone())
    }

    /// `base_rate · (Σ wᵢ·mᵢ + w_c·critic) / (Σ wᵢ + w_c)`.
    ///
    /// Metrics and critic score are clamped into `[0, 1]`, a negative or
    /// non-finite base rate or weight counts as zero. The result is never
    /// negative; it is zero when every weight is zero.
    #[must_use]
    pub fn compute(
        &self,
        base_rate: f64,
        performance_metrics: &BTreeMap<String, f64>,
        critic_score: f64,
    ) -> f64 {
        let base_rate = non_negative("base rate", base_rate);

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (name, value) in performance_metrics {
            let w = non_negative(name, self.weights.metric(name));
            weighted += w * bounded(name, *value);
            total_weight += w;
        }
        let w = non_negative("critic weight", self.weights.critic);
        weighted += w * bounded("critic score", critic_score);
        total_weight += w;

        if total_weight <= 0.0 {
            log::warn(format_args!("all compensation weights are zero; reward is 0"));
            return 0.0;
        }
        base_rate * weighted / total_weight
    }

    /// Reward for a finished task at `base_rate`.
    #[must_use]
    pub fn reward_for(&self, base_rate: f64, outcome: &TaskOutcome) -> f64 {
        self.compute(base_rate, &outcome.metrics, outcome.critic_score)
    }
}

fn bounded(name: &str, value: f64) -> f64 {
    let clamped = unit_clamp(value, 0.0);
    if clamped != value {
        log::warn(format_args!("{name} {value} outside [0, 1]; using {clamped}"));
    }
    clamped
}

fn non_negative(name: &str, value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        log::warn(format_args!("{name} {value} is not a non-negative number; using 0"));
        0.0
    }
}

/// One paid reward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub id: String,
    pub agent_id: String,
    pub role: String,
    pub task_type: String,
    pub base_rate: f64,
    pub critic_score: f64,
    pub reward: f64,
    /// RFC 3339 time the payment was recorded.
    pub ts: String,
}

/// Statistics aggregated from payment records.
#[derive(Debug, Default, Clone)]
pub struct RewardStatistics {
    pub payments: usize,
    pub total_reward: f64,
    pub total_critic_score: f64,
}

impl RewardStatistics {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_reward(&self) -> f64 {
        if self.payments == 0 {
            return 0.0;
        }
        self.total_reward / self.payments as f64
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_critic_score(&self) -> f64 {
        if self.payments == 0 {
            return 0.0;
        }
        self.total_critic_score / self.payments as f64
    }

    fn add(&mut self, record: &PaymentRecord) {
        self.payments += 1;
        if record.reward.is_finite() {
            self.total_reward += record.reward;
        }
        if record.critic_score.is_finite() {
            self.total_critic_score += record.critic_score;
        }
    }
}

/// Append-only payment history.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CompensationLedger {
    payments: Vec<PaymentRecord>,
}

impl CompensationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        outcome: &TaskOutcome,
        role: &str,
        base_rate: f64,
        reward: f64,
    ) -> &PaymentRecord {
        let id = format!("pay-{}", self.payments.len() + 1);
        self.payments.push(PaymentRecord {
            id,
            agent_id: outcome.agent_id.clone(),
            role: role.to_string(),
            task_type: outcome.task_type.clone(),
            base_rate,
            critic_score: outcome.critic_score,
            reward,
            ts: outcome.ts.clone().unwrap_or_else(iso8601_now),
        });
        &self.payments[self.payments.len() - 1]
    }

    #[must_use]
    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub fn agent_history<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a PaymentRecord> {
        self.payments.iter().filter(move |p| p.agent_id == agent_id)
    }

    /// Sum of rewards paid, to one agent or to everyone.
    #[must_use]
    pub fn total_compensation(&self, agent_id: Option<&str>) -> f64 {
        self.payments
            .iter()
            .filter(|p| agent_id.map_or(true, |id| p.agent_id == id))
            .map(|p| p.reward)
            .filter(|r| r.is_finite())
            .sum()
    }

    /// Mean critic score, for one role or overall. Zero with no payments.
    #[must_use]
    pub fn average_critic_score(&self, role: Option<&str>) -> f64 {
        let mut stats = RewardStatistics::default();
        for p in self
            .payments
            .iter()
            .filter(|p| role.map_or(true, |r| p.role == r))
        {
            stats.add(p);
        }
        stats.average_critic_score()
    }

    /// Aggregate payments by a grouping key (agent, role, task type, ...).
    #[must_use]
    pub fn aggregate_by(
        &self,
        key_fn: impl Fn(&PaymentRecord) -> Option<String>,
    ) -> HashMap<String, RewardStatistics> {
        let mut stats: HashMap<String, RewardStatistics> = HashMap::new();
        for payment in &self.payments {
            if let Some(key) = key_fn(payment) {
                stats.entry(key).or_default().add(payment);
            }
        }
        stats
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn outcome(agent: &str, task_type: &str, critic: f64) -> TaskOutcome {
        TaskOutcome {
            task_id: None,
            agent_id: agent.to_string(),
            task_type: task_type.to_string(),
            category: None,
            critic_score: critic,
            metrics: BTreeMap::new(),
            template_id: None,
            strategy_id: None,
            ts: Some("2026-01-04T12:00:00Z".to_string()),
        }
    }

    #[test]
    fn equal_weights_average_metrics_and_critic() {
        let calc = CompensationCalculator::default();
        let reward = calc.compute(10.0, &metrics(&[("quality", 0.9), ("speed", 0.7)]), 0.8);
        assert!((reward - 8.0).abs() < 1e-9);
    }

    #[test]
    fn configured_weights_shift_the_mean() {
        let mut weights = CompensationWeights::default();
        weights.metrics.insert("quality".into(), 3.0);
        weights.critic = 0.0;
        let calc = CompensationCalculator::new(weights);

        // (3·1.0 + 1·0.0) / 4
        let reward = calc.compute(4.0, &metrics(&[("quality", 1.0), ("speed", 0.0)]), 0.9);
        assert!((reward - 3.0).abs() < 1e-9);
    }

    #[test]
    fn critic_only_when_no_metrics() {
        let calc = CompensationCalculator::default();
        let reward = calc.compute(85.0, &BTreeMap::new(), 0.5);
        assert!((reward - 42.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let calc = CompensationCalculator::default();
        let reward = calc.compute(10.0, &metrics(&[("quality", 4.0), ("speed", f64::NAN)]), -1.0);
        // quality → 1.0, speed → 0.0, critic → 0.0
        assert!((reward - 10.0 / 3.0).abs() < 1e-9);

        assert_eq!(calc.compute(-5.0, &BTreeMap::new(), 1.0), 0.0);
        assert_eq!(calc.compute(f64::INFINITY, &BTreeMap::new(), 1.0), 0.0);
    }

    #[test]
    fn zero_weights_yield_zero() {
        let calc = CompensationCalculator::new(CompensationWeights {
            metrics: BTreeMap::new(),
            default_metric_weight: 0.0,
            critic: 0.0,
        });
        let reward = calc.compute(10.0, &metrics(&[("quality", 1.0)]), 1.0);
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn reward_for_uses_outcome_fields() {
        let calc = CompensationCalculator::default();
        let mut o = outcome("be-1", "api_development", 0.6);
        o.metrics.insert("quality".into(), 1.0);
        assert!((calc.reward_for(10.0, &o) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn ledger_totals_and_averages() {
        let mut ledger = CompensationLedger::new();
        ledger.record(&outcome("be-1", "api_development", 0.8), "backend", 85.0, 68.0);
        ledger.record(&outcome("be-1", "service_implementation", 0.4), "backend", 85.0, 34.0);
        let last = ledger
            .record(&outcome("qa-1", "testing", 0.6), "qa", 80.0, 48.0)
            .clone();

        assert_eq!(last.id, "pay-3");
        assert_eq!(ledger.agent_history("be-1").count(), 2);
        assert!((ledger.total_compensation(Some("be-1")) - 102.0).abs() < 1e-9);
        assert!((ledger.total_compensation(None) - 150.0).abs() < 1e-9);
        assert!((ledger.average_critic_score(Some("backend")) - 0.6).abs() < 1e-9);
        assert_eq!(ledger.average_critic_score(Some("ceo")), 0.0);
    }

    #[test]
    fn ledger_aggregates_by_task_type() {
        let mut ledger = CompensationLedger::new();
        ledger.record(&outcome("a", "testing", 1.0), "qa", 80.0, 80.0);
        ledger.record(&outcome("b", "testing", 0.5), "qa", 80.0, 40.0);
        ledger.record(&outcome("c", "styling", 0.5), "frontend", 85.0, 42.5);

        let by_type = ledger.aggregate_by(|p| Some(p.task_type.clone()));
        let testing = by_type.get("testing").expect("testing stats should exist");
        assert_eq!(testing.payments, 2);
        assert!((testing.average_reward() - 60.0).abs() < 1e-9);
        assert!((testing.average_critic_score() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn record_stamps_missing_timestamp() {
        let mut ledger = CompensationLedger::new();
        let mut o = outcome("a", "testing", 1.0);
        o.ts = None;
        let record = ledger.record(&o, "qa", 80.0, 80.0);
        assert!(OffsetDateTime::parse(&record.ts, &Rfc3339).is_ok());
    }

    #[test]
    fn ledger_save_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("fitdev_ledger_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("ledger.json");

        assert!(CompensationLedger::load(&path).unwrap().payments().is_empty());

        let mut ledger = CompensationLedger::new();
        ledger.record(&outcome("a", "testing", 1.0), "qa", 80.0, 80.0);
        ledger.save(&path).unwrap();

        let restored = CompensationLedger::load(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(restored.payments(), ledger.payments());
    }
}
