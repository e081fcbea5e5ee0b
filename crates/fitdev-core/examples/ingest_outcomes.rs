use fitdev_core::{unit_clamp, TaskOutcome};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args().nth(1);
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let outcome: TaskOutcome = serde_json::from_str(&line)?;
        println!(
            "{:.2}\t{}\t{}\t{}",
            unit_clamp(outcome.critic_score, 0.0),
            outcome.agent_id,
            outcome.category(),
            outcome.strategy_id.as_deref().unwrap_or("<none>")
        );
    }

    Ok(())
}
