//! One agent's learners bundled behind the calls an orchestrator makes per task.

use crate::error::{LearnError, Result};
use crate::parameters::ParameterStore;
use crate::strategies::StrategyBandit;
use crate::templates::TemplateSelector;
use fitdev_compensation::CompensationCalculator;
use fitdev_core::{log, Decision, Learner, LearningConfig, RoleProfile, TaskOutcome};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// What a completed task did to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskFeedback {
    pub reward: f64,
    /// Parameters moved by this task and their new values.
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct AgentLearner {
    agent_id: String,
    role: String,
    profile: RoleProfile,
    parameters: ParameterStore,
    templates: TemplateSelector,
    strategies: StrategyBandit,
    calculator: CompensationCalculator,
}

impl AgentLearner {
    /// Fresh learners for `agent_id`, seeded from the `role` profile of `config`.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, role: impl Into<String>, config: &LearningConfig) -> Self {
        let role = role.into();
        let profile = config.role(&role);
        Self {
            agent_id: agent_id.into(),
            parameters: ParameterStore::from_profile(&profile, config.learning_rate),
            templates: TemplateSelector::new(config.templates_for(&profile), config.template_epsilon),
            strategies: StrategyBandit::new(
                config.strategies_for(&profile),
                config.strategy_exploration,
                config.exploit,
            ),
            calculator: CompensationCalculator::for_role(&profile),
            profile,
            role,
        }
    }

    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn profile(&self) -> &RoleProfile {
        &self.profile
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.parameters
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateSelector {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateSelector {
        &mut self.templates
    }

    #[must_use]
    pub fn strategies(&self) -> &StrategyBandit {
        &self.strategies
    }

    pub fn strategies_mut(&mut self) -> &mut StrategyBandit {
        &mut self.strategies
    }

    #[must_use]
    pub fn get_parameter(&self, name: &str) -> f64 {
        self.parameters.get(name)
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) {
        self.parameters.set(name, value);
    }

    pub fn select_template(&self, task_type: &str) -> Result<Decision> {
        self.templates.select(task_type)
    }

    pub fn select_template_with<R: Rng + ?Sized>(
        &self,
        task_type: &str,
        rng: &mut R,
    ) -> Result<Decision> {
        self.templates.select_with(task_type, rng)
    }

    pub fn choose_strategy(&self, category: &str) -> Result<Decision> {
        self.strategies.choose(category)
    }

    pub fn choose_strategy_with<R: Rng + ?Sized>(
        &self,
        category: &str,
        rng: &mut R,
    ) -> Result<Decision> {
        self.strategies.choose_with(category, rng)
    }

    /// Move the parameters relevant to `task_type` by `reward`.
    pub fn update_parameters(&mut self, task_type: &str, reward: f64) -> BTreeMap<String, f64> {
        self.parameters
            .update_relevant(&self.profile, task_type, reward)
    }

    /// Reward this agent's role pays for `outcome`.
    #[must_use]
    pub fn reward_for(&self, outcome: &TaskOutcome) -> f64 {
        self.calculator.reward_for(self.profile.base_rate, outcome)
    }

    /// Feed a finished task to every learner.
    ///
    /// The template and strategy named in `outcome` must be known; they are
    /// checked before anything is updated, so a failed call leaves the agent
    /// untouched.
    pub fn complete_task(&mut self, outcome: &TaskOutcome) -> Result<TaskFeedback> {
        if let Some(id) = outcome.template_id.as_deref() {
            if self.templates.template(id).is_none() {
                return Err(LearnError::UnknownTemplate(id.to_string()));
            }
        }
        if let Some(id) = outcome.strategy_id.as_deref() {
            if self.strategies.strategy(id).is_none() {
                return Err(LearnError::UnknownStrategy(id.to_string()));
            }
        }
        if outcome.agent_id != self.agent_id {
            log::warn(format_args!(
                "outcome for agent {} fed to learner of {}",
                outcome.agent_id, self.agent_id
            ));
        }

        let reward = self.reward_for(outcome);
        if let Some(id) = outcome.template_id.as_deref() {
            self.templates.record(id, reward)?;
        }
        if let Some(id) = outcome.strategy_id.as_deref() {
            self.strategies.observe(id, reward)?;
        }
        let parameters = self.update_parameters(&outcome.task_type, reward);

        log::debug(format_args!(
            "agent {} completed {} task: reward {reward:.3}, {} parameters moved",
            self.agent_id,
            outcome.task_type,
            parameters.len()
        ));
        Ok(TaskFeedback { reward, parameters })
    }

    /// Render a template with the agent's role and the task filled in.
    pub fn render_prompt(
        &self,
        template_id: &str,
        task_description: &str,
        extra: &BTreeMap<String, String>,
    ) -> Result<String> {
        let template = self
            .templates
            .template(template_id)
            .ok_or_else(|| LearnError::UnknownTemplate(template_id.to_string()))?;
        let mut vars = extra.clone();
        vars.insert("role".into(), self.role.clone());
        vars.insert("task_type".into(), template.task_type.clone());
        vars.insert("task_description".into(), task_description.to_string());
        self.templates.render(template_id, &vars)
    }
}

#[derive(Deserialize)]
struct AgentState {
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    templates: Option<Value>,
    #[serde(default)]
    strategies: Option<Value>,
}

impl Learner for AgentLearner {
    fn snapshot(&self) -> Value {
        json!({
            "parameters": self.parameters.snapshot(),
            "templates": self.templates.snapshot(),
            "strategies": self.strategies.snapshot(),
        })
    }

    /// Sections missing from the snapshot keep their current state.
    fn load(&mut self, snapshot: Value) -> std::result::Result<(), serde_json::Error> {
        let state: AgentState = serde_json::from_value(snapshot)?;
        if let Some(v) = state.parameters {
            self.parameters.load(v)?;
        }
        if let Some(v) = state.templates {
            self.templates.load(v)?;
        }
        if let Some(v) = state.strategies {
            self.strategies.load(v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fitdev_core::{StrategySpec, TemplateSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn outcome(task_type: &str, template: Option<&str>, strategy: Option<&str>) -> TaskOutcome {
        TaskOutcome {
            task_id: None,
            agent_id: "be-1".into(),
            task_type: task_type.into(),
            category: None,
            critic_score: 0.8,
            metrics: [("quality".to_string(), 0.9), ("speed".to_string(), 0.7)]
                .into_iter()
                .collect(),
            template_id: template.map(str::to_string),
            strategy_id: strategy.map(str::to_string),
            ts: None,
        }
    }

    #[test]
    fn new_agent_uses_role_profile() {
        let agent = AgentLearner::new("be-1", "backend", &LearningConfig::default());
        assert!((agent.get_parameter("security_focus") - 0.5).abs() < 1e-12);
        assert!((agent.profile().base_rate - 85.0).abs() < 1e-12);
        assert!(agent.templates().template("api.rest").is_some());
        assert!(agent.strategies().strategy("schema_first").is_some());
    }

    #[test]
    fn complete_task_credits_every_learner() {
        let mut agent = AgentLearner::new("be-1", "backend", &LearningConfig::default());
        let feedback = agent
            .complete_task(&outcome("api_development", Some("api.rest"), Some("schema_first")))
            .unwrap();

        // 85 · mean(0.9, 0.7, 0.8)
        assert!((feedback.reward - 68.0).abs() < 1e-9);
        let t = agent.templates().template("api.rest").unwrap();
        assert_eq!(t.reward.count(), 1);
        assert_eq!(agent.strategies().strategy("schema_first").unwrap().pulls(), 1);
        assert!(feedback.parameters.contains_key("security_focus"));
        assert!(!feedback.parameters.contains_key("creativity"));
        assert_eq!(agent.parameters().history().len(), 2);
    }

    #[test]
    fn unknown_ids_leave_agent_untouched() {
        let mut agent = AgentLearner::new("be-1", "backend", &LearningConfig::default());
        let err = agent
            .complete_task(&outcome("api_development", Some("api.rest"), Some("yolo")))
            .unwrap_err();
        assert!(matches!(err, LearnError::UnknownStrategy(_)));
        assert_eq!(agent.templates().template("api.rest").unwrap().reward.count(), 0);
        assert_eq!(agent.parameters().history().len(), 1);
    }

    #[test]
    fn better_rewards_raise_relevant_parameters() {
        let mut agent = AgentLearner::new("be-1", "backend", &LearningConfig::default());
        let mut task = outcome("api_development", None, None);
        task.critic_score = 0.2;
        agent.complete_task(&task).unwrap();
        task.critic_score = 1.0;
        agent.complete_task(&task).unwrap();
        assert!(agent.get_parameter("security_focus") > 0.5);
        assert!((agent.get_parameter("creativity") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn frontend_cold_start_picks_its_own_strategies() {
        let agent = AgentLearner::new("fe-1", "frontend", &LearningConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let d = agent
                .choose_strategy_with("component_implementation", &mut rng)
                .unwrap();
            assert!(["design_first", "component_driven", "test_driven"].contains(&d.id.as_str()));
        }
    }

    #[test]
    fn render_prompt_fills_role_and_description() {
        let agent = AgentLearner::new("fe-1", "frontend", &LearningConfig::default());
        let prompt = agent
            .render_prompt("general.role", "build a login form", &BTreeMap::new())
            .unwrap();
        assert_eq!(prompt, "As a frontend, your task is to: build a login form");

        let fallback = agent
            .render_prompt("component.explained", "build a login form", &BTreeMap::new())
            .unwrap();
        assert_eq!(
            fallback,
            "Complete this component_implementation task: build a login form"
        );
    }

    #[test]
    fn snapshot_restores_all_learners() {
        let config = LearningConfig::default();
        let mut agent = AgentLearner::new("be-1", "backend", &config);
        for _ in 0..3 {
            agent
                .complete_task(&outcome("api_development", Some("api.rest"), Some("schema_first")))
                .unwrap();
        }
        agent.set_parameter("thoroughness", 0.9);

        let mut fresh = AgentLearner::new("be-1", "backend", &config);
        fresh.load(agent.snapshot()).unwrap();
        for (name, value) in agent.parameters().values() {
            assert!((fresh.get_parameter(name) - value).abs() < 1e-9, "{name}");
        }
        assert_eq!(fresh.templates().template("api.rest").unwrap().reward.count(), 3);
        assert!((fresh.strategies().epsilon() - agent.strategies().epsilon()).abs() < 1e-12);

        fresh.load(json!({})).unwrap();
        assert!((fresh.get_parameter("thoroughness") - 0.9).abs() < 1e-12);
    }

    #[test]
    fn runtime_additions_are_selectable_and_persist() {
        let config = LearningConfig::default();
        let mut agent = AgentLearner::new("be-1", "backend", &config);
        assert!(agent.templates_mut().add_template(TemplateSpec {
            id: "api.graphql".into(),
            task_type: "graphql_schema".into(),
            text: "Design a GraphQL schema for {task_description}".into(),
        }));
        assert!(agent.strategies_mut().add_strategy(StrategySpec {
            id: "contract_first".into(),
            category: "graphql_schema".into(),
            description: "Agree on the schema before resolvers".into(),
            steps: Vec::new(),
        }));

        let template = agent.select_template("graphql_schema").unwrap();
        assert_eq!(template.id, "api.graphql");
        let strategy = agent.choose_strategy("graphql_schema").unwrap();
        assert_eq!(strategy.id, "contract_first");

        let mut fresh = AgentLearner::new("be-1", "backend", &config);
        fresh.load(agent.snapshot()).unwrap();
        assert!(fresh.templates().template("api.graphql").is_some());
        assert!(fresh.strategies().strategy("contract_first").is_some());
    }
}
