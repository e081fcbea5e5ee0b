//! Learning configuration.
//!
//! Everything a learner needs that is not learned: role parameter defaults,
//! template and strategy catalogs, exploration constants, base rates and
//! compensation weights. Loaded from JSON; any field left out falls back to
//! the built-in catalog in [`crate::catalog`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path to a JSON config file.
pub const CONFIG_ENV: &str = "FITDEV_CONFIG";
/// Overrides `state_dir`.
pub const STATE_DIR_ENV: &str = "FITDEV_STATE_DIR";
/// Key of the profile used for roles that are not configured.
pub const DEFAULT_ROLE: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoleCategory {
    Executive,
    Development,
    Quality,
    Specialized,
    #[default]
    Other,
}

/// A prompt template as it appears in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSpec {
    pub id: String,
    pub task_type: String,
    pub text: String,
}

/// A named way of going about a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategySpec {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// ε schedule of the strategy bandit: `ε ← max(ε_min, ε · decay)` per observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplorationSchedule {
    pub epsilon: f64,
    pub epsilon_min: f64,
    pub decay: f64,
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self {
            epsilon: 0.2,
            epsilon_min: 0.05,
            decay: 0.995,
        }
    }
}

/// How the strategy bandit exploits once it decides not to explore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExploitRule {
    /// Highest mean reward, ties to the least pulled arm.
    #[default]
    Greedy,
    /// Unpulled arms first, then `mean + sqrt(2 ln N / n)`.
    Ucb1,
}

/// Weights of the compensation combination.
///
/// Metrics without an explicit entry get `default_metric_weight`. With all
/// weights equal the reward is `base_rate` times the plain mean of metrics and
/// critic score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompensationWeights {
    pub metrics: BTreeMap<String, f64>,
    pub default_metric_weight: f64,
    pub critic: f64,
}

impl Default for CompensationWeights {
    fn default() -> Self {
        Self {
            metrics: BTreeMap::new(),
            default_metric_weight: 1.0,
            critic: 1.0,
        }
    }
}

impl CompensationWeights {
    #[must_use]
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics
            .get(name)
            .copied()
            .unwrap_or(self.default_metric_weight)
    }
}

/// Per-role configuration table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoleProfile {
    pub category: RoleCategory,
    pub base_rate: f64,
    /// Parameter name → initial value in `[0, 1]`.
    pub parameters: BTreeMap<String, f64>,
    /// Parameters moved by every task regardless of type.
    pub always_relevant: Vec<String>,
    /// Task type → parameters that task type moves.
    pub relevance: BTreeMap<String, Vec<String>>,
    pub templates: Vec<TemplateSpec>,
    pub strategies: Vec<StrategySpec>,
    pub weights: CompensationWeights,
}

impl Default for RoleProfile {
    fn default() -> Self {
        crate::catalog::common_role(RoleCategory::Other, crate::catalog::DEFAULT_BASE_RATE)
    }
}

impl RoleProfile {
    /// Whether a task of `task_type` should move `parameter`.
    #[must_use]
    pub fn is_relevant(&self, parameter: &str, task_type: &str) -> bool {
        self.always_relevant.iter().any(|p| p == parameter)
            || self
                .relevance
                .get(task_type)
                .is_some_and(|ps| ps.iter().any(|p| p == parameter))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearningConfig {
    /// Step size of the parameter store, clamped into `(0, 1]` on use.
    pub learning_rate: f64,
    /// Exploration probability of the template selector.
    pub template_epsilon: f64,
    pub strategy_exploration: ExplorationSchedule,
    pub exploit: ExploitRule,
    /// Directory for persisted learner state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub roles: BTreeMap<String, RoleProfile>,
    /// Templates available to every role.
    pub templates: Vec<TemplateSpec>,
    /// Strategies available to every role.
    pub strategies: Vec<StrategySpec>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        crate::catalog::builtin()
    }
}

impl LearningConfig {
    /// Load from a JSON file and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults or `$FITDEV_CONFIG`, with `$FITDEV_STATE_DIR` applied on top.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = env::var_os(STATE_DIR_ENV) {
            config.state_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    /// Profile for `role`: exact key, then case-insensitive key, then `default`.
    #[must_use]
    pub fn role(&self, role: &str) -> RoleProfile {
        self.roles
            .get(role)
            .or_else(|| {
                self.roles
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(role))
                    .map(|(_, v)| v)
            })
            .or_else(|| self.roles.get(DEFAULT_ROLE))
            .cloned()
            .unwrap_or_default()
    }

    /// Shared templates followed by the role's own.
    #[must_use]
    pub fn templates_for(&self, profile: &RoleProfile) -> Vec<TemplateSpec> {
        self.templates
            .iter()
            .chain(&profile.templates)
            .cloned()
            .collect()
    }

    /// Shared strategies followed by the role's own.
    #[must_use]
    pub fn strategies_for(&self, profile: &RoleProfile) -> Vec<StrategySpec> {
        self.strategies
            .iter()
            .chain(&profile.strategies)
            .cloned()
            .collect()
    }

    /// Structural checks. Tuning constants are not checked here; learners clamp them.
    pub fn validate(&self) -> Result<()> {
        for (name, profile) in &self.roles {
            for (param, value) in &profile.parameters {
                if !value.is_finite() || !(0.0..=1.0).contains(value) {
                    return Err(ConfigError::Invalid(format!(
                        "role '{name}': parameter '{param}' default {value} outside [0, 1]"
                    )));
                }
            }
            let templates = self.templates_for(profile);
            if let Some(dup) = first_duplicate(templates.iter().map(|t| t.id.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "role '{name}': duplicate template id '{dup}'"
                )));
            }
            let strategies = self.strategies_for(profile);
            if let Some(dup) = first_duplicate(strategies.iter().map(|s| s.id.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "role '{name}': duplicate strategy id '{dup}'"
                )));
            }
        }
        Ok(())
    }
}

fn first_duplicate<'a>(ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}
