//! Runs the `ingest_outcomes` example against JSONL outcome records.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn write_temp_jsonl() -> std::path::PathBuf {
    let tmp =
        std::env::temp_dir().join(format!("fitdev_ingest_test_{}.jsonl", std::process::id()));
    fs::write(
        &tmp,
        r#"{"agent_id":"backend-1","task_type":"api_development","critic_score":0.8,"strategy_id":"schema_first"}
{"agent_id":"qa-1","task_type":"bug_verification","category":"testing","critic_score":1.4}"#,
    )
    .unwrap_or_else(|e| panic!("failed to write temp JSONL: {e}"));
    tmp
}

#[test]
fn example_prints_one_line_per_outcome() {
    let path = write_temp_jsonl();
    let mut cmd = Command::new("cargo");
    cmd.args([
        "run",
        "--package",
        "fitdev-core",
        "--example",
        "ingest_outcomes",
        "--",
        path.to_str()
            .unwrap_or_else(|| panic!("temp path is not UTF-8: {path:?}")),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("schema_first").and(predicate::str::contains("<none>")))
        .stdout(predicate::str::contains("testing"));
}

#[test]
fn example_accepts_stdin_and_clamps_scores() {
    let input = r#"{"agent_id":"a","task_type":"styling","critic_score":-3.0}
{"agent_id":"b","task_type":"styling","critic_score":7.5}"#;

    let mut cmd = Command::new("cargo");
    cmd.args(["run", "--package", "fitdev-core", "--example", "ingest_outcomes"]);
    cmd.write_stdin(input);

    let output = cmd.assert().success().get_output().stdout.clone();
    let out_str = String::from_utf8_lossy(&output);
    for line in out_str.lines() {
        let score_str = line.split('\t').next().unwrap_or_default();
        let score: f64 = score_str
            .parse()
            .unwrap_or_else(|e| panic!("score '{score_str}' is not a float: {e}"));
        assert!((0.0..=1.0).contains(&score), "score outside 0..1: {score}");
    }
}
