//! Built-in roles, prompt templates and strategies.

use crate::config::{
    CompensationWeights, ExploitRule, ExplorationSchedule, LearningConfig, RoleCategory,
    RoleProfile, StrategySpec, TemplateSpec, DEFAULT_ROLE,
};
use std::collections::BTreeMap;

pub const DEFAULT_BASE_RATE: f64 = 50.0;
/// Value of a parameter nobody configured.
pub const NEUTRAL_PARAMETER: f64 = 0.5;

/// Category whose strategies serve any task type without its own.
pub const GENERAL: &str = "general";

const COMMON_PARAMETERS: [&str; 3] = ["thoroughness", "creativity", "risk_taking"];

fn base_rate(category: RoleCategory) -> f64 {
    match category {
        RoleCategory::Executive => 100.0,
        RoleCategory::Development => 85.0,
        RoleCategory::Quality => 80.0,
        RoleCategory::Specialized => 90.0,
        RoleCategory::Other => DEFAULT_BASE_RATE,
    }
}

/// Role with the common parameters only.
#[must_use]
pub fn common_role(category: RoleCategory, base_rate: f64) -> RoleProfile {
    RoleProfile {
        category,
        base_rate,
        parameters: COMMON_PARAMETERS
            .iter()
            .map(|p| ((*p).to_string(), NEUTRAL_PARAMETER))
            .collect(),
        always_relevant: vec!["thoroughness".into(), "risk_taking".into()],
        relevance: BTreeMap::new(),
        templates: Vec::new(),
        strategies: Vec::new(),
        weights: CompensationWeights::default(),
    }
}

fn role_with(
    category: RoleCategory,
    extra: &[&str],
    relevance: Vec<(&str, Vec<&str>)>,
    templates: Vec<TemplateSpec>,
    strategies: Vec<StrategySpec>,
) -> RoleProfile {
    let mut profile = common_role(category, base_rate(category));
    for p in extra {
        profile
            .parameters
            .insert((*p).to_string(), NEUTRAL_PARAMETER);
    }
    profile.relevance = relevance
        .into_iter()
        .map(|(task, ps)| {
            (
                task.to_string(),
                ps.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();
    profile.templates = templates;
    profile.strategies = strategies;
    profile
}

fn template(id: &str, task_type: &str, text: &str) -> TemplateSpec {
    TemplateSpec {
        id: id.into(),
        task_type: task_type.into(),
        text: text.into(),
    }
}

fn strategy(id: &str, category: &str, description: &str, steps: &[&str]) -> StrategySpec {
    StrategySpec {
        id: id.into(),
        category: category.into(),
        description: description.into(),
        steps: steps.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn frontend() -> RoleProfile {
    role_with(
        RoleCategory::Development,
        &["design_focus", "accessibility_focus"],
        vec![
            (
                "component_implementation",
                vec!["thoroughness", "creativity", "design_focus", "accessibility_focus"],
            ),
            ("styling", vec!["creativity", "design_focus", "accessibility_focus"]),
            (
                "frontend_integration",
                vec!["thoroughness", "creativity", "accessibility_focus"],
            ),
        ],
        vec![
            template(
                "component.explained",
                "component_implementation",
                "Create a {framework} component for: {task_description}. Include code and explanations.",
            ),
            template(
                "component.responsive",
                "component_implementation",
                "Implement a responsive {framework} UI component that: {task_description}. Focus on best practices and clean code.",
            ),
            template(
                "component.accessible",
                "component_implementation",
                "Design a user-friendly {framework} interface that: {task_description}. Consider accessibility and performance.",
            ),
        ],
        vec![
            strategy(
                "design_first",
                "component_implementation",
                "Focus on design and UX before implementation",
                &["design", "prototype", "implement", "test", "refine"],
            ),
            strategy(
                "component_driven",
                "component_implementation",
                "Break down into smaller components and implement incrementally",
                &["decompose", "implement_components", "integrate", "test"],
            ),
            strategy(
                "test_driven",
                "component_implementation",
                "Write tests first, then implement to pass tests",
                &["write_tests", "implement", "refactor", "document"],
            ),
        ],
    )
}

fn backend() -> RoleProfile {
    role_with(
        RoleCategory::Development,
        &["performance_focus", "security_focus", "code_reusability"],
        vec![
            (
                "api_development",
                vec!["thoroughness", "performance_focus", "security_focus", "code_reusability"],
            ),
            (
                "database_implementation",
                vec!["performance_focus", "thoroughness", "security_focus"],
            ),
            (
                "service_implementation",
                vec!["code_reusability", "thoroughness", "security_focus"],
            ),
        ],
        vec![
            template(
                "api.rest",
                "api_development",
                "Develop a RESTful API endpoint that: {task_description}. Include security considerations.",
            ),
            template(
                "api.scalable",
                "api_development",
                "Create a backend service for: {task_description}. Focus on performance and scalability.",
            ),
            template(
                "api.validated",
                "api_development",
                "Implement server-side logic for: {task_description}. Ensure proper error handling and validation.",
            ),
            template(
                "api.typed",
                "api_development",
                "Design and implement a {api_type} API for: {task_description}. Focus on best practices, security, and thorough documentation.",
            ),
            template(
                "db.normalized",
                "database_implementation",
                "Design a {db_type} database schema for: {task_description}. Ensure proper normalization and indexing.",
            ),
            template(
                "db.optimized",
                "database_implementation",
                "Develop an optimized database structure for: {task_description}. Focus on query performance and data integrity.",
            ),
            template(
                "db.scalable",
                "database_implementation",
                "Create a scalable database design for: {task_description}. Include considerations for future growth and data relationships.",
            ),
            template(
                "service.layered",
                "service_implementation",
                "Implement a service layer component for: {task_description}. Ensure proper separation of concerns.",
            ),
            template(
                "service.typed",
                "service_implementation",
                "Develop a {service_type} architecture for: {task_description}. Focus on maintainability and testability.",
            ),
            template(
                "service.robust",
                "service_implementation",
                "Create a robust service implementation for: {task_description}. Include error handling, logging, and dependency management.",
            ),
        ],
        vec![
            strategy(
                "schema_first",
                "api_development",
                "Define data schema and API contracts before implementation",
                &["define_schema", "create_endpoints", "implement_logic", "add_validation", "test"],
            ),
            strategy(
                "security_focused",
                "api_development",
                "Prioritize security measures throughout the development",
                &["threat_model", "implement_with_security", "validate_security", "performance_test"],
            ),
            strategy(
                "iterative_api",
                "api_development",
                "Implement basic endpoints first, then enhance incrementally",
                &["basic_endpoints", "add_features", "optimize", "document"],
            ),
            strategy(
                "normalized_design",
                "database_implementation",
                "Follow strict normalization principles for data integrity",
                &["entity_analysis", "normalization", "relationship_mapping", "indexing", "validation"],
            ),
            strategy(
                "performance_optimized",
                "database_implementation",
                "Focus on query performance with appropriate denormalization",
                &["query_analysis", "schema_design", "denormalization", "indexing_strategy", "benchmark"],
            ),
            strategy(
                "domain_driven",
                "database_implementation",
                "Design database based on domain model and aggregate boundaries",
                &["domain_modeling", "aggregate_design", "schema_implementation", "access_patterns", "test"],
            ),
            strategy(
                "interface_first",
                "service_implementation",
                "Define clear interfaces before implementation details",
                &["interface_design", "contract_definition", "implementation", "dependency_injection", "test"],
            ),
            strategy(
                "domain_service",
                "service_implementation",
                "Implement using domain service patterns with rich domain model",
                &["domain_modeling", "service_design", "implementation", "integration", "validation"],
            ),
            strategy(
                "layered_architecture",
                "service_implementation",
                "Implement with clear separation of concerns in layers",
                &["layer_definition", "interface_design", "implementation", "cross_layer_testing", "documentation"],
            ),
        ],
    )
}

fn qa() -> RoleProfile {
    role_with(
        RoleCategory::Quality,
        &["test_coverage", "edge_case_focus"],
        vec![("testing", vec!["thoroughness", "test_coverage", "edge_case_focus"])],
        Vec::new(),
        Vec::new(),
    )
}

/// The default organization: executive, development, quality and specialized roles.
#[must_use]
pub fn builtin() -> LearningConfig {
    let mut roles = BTreeMap::new();
    roles.insert(
        DEFAULT_ROLE.to_string(),
        common_role(RoleCategory::Other, DEFAULT_BASE_RATE),
    );
    for (name, category) in [
        ("ceo", RoleCategory::Executive),
        ("cto", RoleCategory::Executive),
        ("product_owner", RoleCategory::Executive),
        ("fullstack", RoleCategory::Development),
        ("devops", RoleCategory::Development),
        ("security_specialist", RoleCategory::Quality),
        ("technical_writer", RoleCategory::Quality),
        ("knowledge_management", RoleCategory::Specialized),
        ("trend_scout", RoleCategory::Specialized),
        ("ux_simulator", RoleCategory::Specialized),
        ("api_specialist", RoleCategory::Specialized),
        ("tech_debt_manager", RoleCategory::Specialized),
    ] {
        roles.insert(name.to_string(), common_role(category, base_rate(category)));
    }
    roles.insert("frontend".into(), frontend());
    roles.insert("backend".into(), backend());
    roles.insert("qa".into(), qa());

    LearningConfig {
        learning_rate: 0.05,
        template_epsilon: 0.2,
        strategy_exploration: ExplorationSchedule::default(),
        exploit: ExploitRule::Greedy,
        state_dir: None,
        roles,
        templates: vec![
            template(
                "general.direct",
                GENERAL,
                "Complete the following task: {task_description}",
            ),
            template(
                "general.role",
                GENERAL,
                "As a {role}, your task is to: {task_description}",
            ),
            template(
                "general.detailed",
                GENERAL,
                "You are a {role} working on: {task_description}. Provide a detailed solution.",
            ),
        ],
        strategies: vec![
            strategy(
                "thorough_analysis",
                GENERAL,
                "Spend extra time analyzing the requirements before implementation",
                &["analyze", "plan", "implement", "test", "document"],
            ),
            strategy(
                "rapid_implementation",
                GENERAL,
                "Focus on quickly implementing a working solution",
                &["quick_plan", "implement", "basic_test"],
            ),
            strategy(
                "research_first",
                GENERAL,
                "Research similar solutions before implementation",
                &["research", "analyze", "implement", "test"],
            ),
        ],
    }
}
