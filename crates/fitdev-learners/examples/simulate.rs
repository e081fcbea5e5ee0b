//! Runs simulated task cycles through a small organization and prints what
//! each agent learned.
//!
//! Run with: cargo run -p fitdev-learners --example simulate -- [rounds]
//!
//! Strategies have a hidden quality the simulated critic scores against, so
//! the bandit should settle on the best one per category. Set
//! `FITDEV_STATE_DIR` to keep the learned state between runs.

use fitdev_core::{LearningConfig, TaskOutcome};
use fitdev_learners::LearningRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::error::Error;

const AGENTS: [(&str, &str, &str); 3] = [
    ("fe-1", "frontend", "component_implementation"),
    ("be-1", "backend", "api_development"),
    ("qa-1", "qa", "testing"),
];

fn hidden_quality(strategy: &str) -> f64 {
    match strategy {
        "component_driven" | "schema_first" | "thorough_analysis" => 0.85,
        "design_first" | "security_focused" | "research_first" => 0.6,
        _ => 0.4,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let rounds: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 200,
    };

    let config = LearningConfig::from_env()?;
    let mut registry = LearningRegistry::new(config);
    let restored = registry.restore()?;
    if restored > 0 {
        println!("restored {restored} agents");
    }
    for (agent_id, role, _) in AGENTS {
        registry.register(agent_id, role);
    }

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..rounds {
        for (agent_id, _, task_type) in AGENTS {
            let (template, strategy) = registry.with_agent(agent_id, |a| {
                let template = a.select_template_with(task_type, &mut rng).ok();
                let strategy = a.choose_strategy_with(task_type, &mut rng);
                (template, strategy)
            })?;
            let strategy = strategy?;

            let noise: f64 = rng.gen_range(-0.1..0.1);
            let outcome = TaskOutcome {
                task_id: None,
                agent_id: agent_id.to_string(),
                task_type: task_type.to_string(),
                category: None,
                critic_score: (hidden_quality(&strategy.id) + noise).clamp(0.0, 1.0),
                metrics: BTreeMap::new(),
                template_id: template.map(|d| d.id),
                strategy_id: Some(strategy.id),
                ts: None,
            };
            registry.complete_task(&outcome)?;
        }
    }

    for (agent_id, _, task_type) in AGENTS {
        registry.with_agent(agent_id, |a| {
            let strategies = a.strategies();
            let best = strategies
                .best_strategy(task_type)
                .or_else(|| strategies.best_strategy("general"))
                .map_or("<none>", |s| s.id.as_str());
            println!(
                "{agent_id}\t{}\tbest={best}\tepsilon={:.3}",
                a.role(),
                strategies.epsilon()
            );
            for (name, value) in a.parameters().values() {
                println!("  {name} = {value:.3}");
            }
        })?;
    }

    let flushed = registry.flush()?;
    if flushed > 0 {
        println!("saved {flushed} agents");
    }
    Ok(())
}
