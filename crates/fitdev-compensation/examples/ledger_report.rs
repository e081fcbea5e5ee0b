//! Pays a batch of simulated task outcomes and prints per-role statistics.
//!
//! Run with: cargo run -p fitdev-compensation --example ledger_report

use fitdev_compensation::{CompensationCalculator, CompensationLedger};
use fitdev_core::{LearningConfig, TaskOutcome};
use std::collections::BTreeMap;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let config = LearningConfig::from_env()?;
    let mut ledger = CompensationLedger::new();

    let outcomes = vec![
        create_outcome("fe-1", "component_implementation", 0.9, &[("quality", 0.8)]),
        create_outcome("fe-1", "styling", 0.6, &[("quality", 0.7), ("speed", 0.9)]),
        create_outcome("be-1", "api_development", 0.7, &[("quality", 0.9)]),
        create_outcome("be-1", "database_implementation", 0.4, &[]),
        create_outcome("qa-1", "testing", 0.8, &[("coverage", 0.6)]),
    ];

    for outcome in &outcomes {
        let role = role_of(&outcome.agent_id);
        let profile = config.role(role);
        let reward = CompensationCalculator::for_role(&profile).reward_for(profile.base_rate, outcome);
        let paid = ledger.record(outcome, role, profile.base_rate, reward);
        println!("{}\t{}\t{:.2}", paid.agent_id, paid.task_type, paid.reward);
    }

    println!();
    let by_role = ledger.aggregate_by(|p| Some(p.role.clone()));
    let mut roles: Vec<_> = by_role.iter().collect();
    roles.sort_by(|a, b| a.0.cmp(b.0));
    for (role, stats) in roles {
        println!(
            "{role}: {} payments, avg reward {:.2}, avg critic {:.2}",
            stats.payments,
            stats.average_reward(),
            stats.average_critic_score()
        );
    }
    println!("total paid: {:.2}", ledger.total_compensation(None));

    Ok(())
}

fn role_of(agent_id: &str) -> &'static str {
    match agent_id.split('-').next() {
        Some("fe") => "frontend",
        Some("be") => "backend",
        Some("qa") => "qa",
        _ => "default",
    }
}

fn create_outcome(agent: &str, task_type: &str, critic: f64, metrics: &[(&str, f64)]) -> TaskOutcome {
    TaskOutcome {
        task_id: None,
        agent_id: agent.to_string(),
        task_type: task_type.to_string(),
        category: None,
        critic_score: critic,
        metrics: metrics
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect::<BTreeMap<_, _>>(),
        template_id: None,
        strategy_id: None,
        ts: None,
    }
}
