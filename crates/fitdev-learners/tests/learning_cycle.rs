//! Full task cycles through the public API, plus the `simulate` example.

use assert_cmd::Command;
use fitdev_core::{ExploitRule, ExplorationSchedule, LearningConfig, Reason, TaskOutcome};
use fitdev_learners::{LearnError, LearningRegistry};
use predicates::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

fn outcome(agent_id: &str, task_type: &str, strategy: &str, critic_score: f64) -> TaskOutcome {
    TaskOutcome {
        task_id: None,
        agent_id: agent_id.into(),
        task_type: task_type.into(),
        category: None,
        critic_score,
        metrics: BTreeMap::new(),
        template_id: None,
        strategy_id: Some(strategy.into()),
        ts: None,
    }
}

#[test]
fn bandit_converges_on_best_strategy() {
    let config = LearningConfig {
        strategy_exploration: ExplorationSchedule {
            epsilon: 0.3,
            epsilon_min: 0.05,
            decay: 0.95,
        },
        exploit: ExploitRule::Greedy,
        ..LearningConfig::default()
    };
    let mut registry = LearningRegistry::new(config);
    registry.register("be-1", "backend");

    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..600 {
        let decision = registry
            .with_agent("be-1", |a| a.choose_strategy_with("api_development", &mut rng))
            .unwrap()
            .unwrap();
        let score = if decision.id == "security_focused" { 0.9 } else { 0.3 };
        registry
            .complete_task(&outcome("be-1", "api_development", &decision.id, score))
            .unwrap();
    }

    let (epsilon, best) = registry
        .with_agent("be-1", |a| {
            let s = a.strategies();
            (
                s.epsilon(),
                s.best_strategy("api_development").map(|s| s.id.clone()),
            )
        })
        .unwrap();
    assert!((epsilon - 0.05).abs() < 1e-12);
    assert_eq!(best.as_deref(), Some("security_focused"));

    let d = registry
        .with_agent("be-1", |a| {
            a.choose_strategy_with("api_development", &mut StdRng::seed_from_u64(1))
        })
        .unwrap()
        .unwrap();
    if d.why == Reason::Exploit {
        assert_eq!(d.id, "security_focused");
    }
}

#[test]
fn missing_template_catalog_surfaces_error() {
    let mut registry = LearningRegistry::new(LearningConfig::default());
    registry.register("qa-1", "qa");
    let err = registry.select_template("qa-1", "testing").unwrap_err();
    assert!(matches!(err, LearnError::UnknownTaskType(_)));

    let strategy = registry.choose_strategy("qa-1", "testing").unwrap();
    assert!(["thorough_analysis", "rapid_implementation", "research_first"]
        .contains(&strategy.id.as_str()));
}

#[test]
fn saved_state_survives_restart() {
    let dir = std::env::temp_dir().join(format!("fitdev_cycle_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let config = LearningConfig {
        state_dir: Some(dir.clone()),
        ..LearningConfig::default()
    };

    let mut first = LearningRegistry::new(config.clone());
    first.register("fe-1", "frontend");
    for score in [0.4, 0.8, 0.9] {
        first
            .complete_task(&outcome("fe-1", "styling", "design_first", score))
            .unwrap();
    }
    let before = first
        .with_agent("fe-1", |a| a.get_parameter("design_focus"))
        .unwrap();
    assert!(before > 0.5);
    assert_eq!(first.flush().unwrap(), 1);

    let mut second = LearningRegistry::new(config);
    assert_eq!(second.restore().unwrap(), 1);
    let (after, pulls) = second
        .with_agent("fe-1", |a| {
            (
                a.get_parameter("design_focus"),
                a.strategies().strategy("design_first").map(|s| s.pulls()),
            )
        })
        .unwrap();
    assert!((after - before).abs() < 1e-9);
    assert_eq!(pulls, Some(3));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn simulate_example_reports_every_agent() {
    let mut cmd = Command::new("cargo");
    cmd.args([
        "run",
        "--package",
        "fitdev-learners",
        "--example",
        "simulate",
        "--",
        "50",
    ]);
    cmd.env_remove("FITDEV_CONFIG").env_remove("FITDEV_STATE_DIR");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("fe-1\tfrontend\tbest="))
        .stdout(predicate::str::contains("be-1\tbackend\tbest="))
        .stdout(predicate::str::contains("qa-1\tqa\tbest="))
        .stdout(predicate::str::contains("saved").not());
}

#[test]
fn decide_example_prints_a_cold_decision() {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "--package", "fitdev-learners", "--example", "decide"]);
    cmd.env_remove("FITDEV_CONFIG");
    cmd.write_stdin(r#"{"role":"frontend","task_type":"component_implementation"}"#);

    let output = cmd.assert().success().get_output().stdout.clone();
    let record: serde_json::Value = serde_json::from_slice(&output)
        .unwrap_or_else(|e| panic!("decide printed invalid JSON: {e}"));
    assert_eq!(record["role"], "frontend");
    assert_eq!(record["template"]["kind"], "component_implementation");
    let strategy = record["strategy"]["id"].as_str().unwrap_or_default();
    assert!(["design_first", "component_driven", "test_driven"].contains(&strategy));
    assert!(record["strategy"].get("score").is_none());
}
