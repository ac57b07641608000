// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end runs of the `recall` binary against a throwaway store.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Workspace {
    _dir: tempfile::TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("recall.db");
        let config = dir.path().join("recall.toml");
        std::fs::write(
            &config,
            format!(
                "[engine]\nlog_level = \"warn\"\n\n[storage]\ndatabase_path = \"{}\"\n",
                db.display()
            ),
        )
        .unwrap();
        Self { _dir: dir, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        recall(&self.config, args)
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let mut full = args.to_vec();
        full.push("--json");
        let output = self.run(&full);
        assert!(
            output.status.success(),
            "recall {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn recall(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_recall"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn ingest_then_search_finds_the_text() {
    let ws = Workspace::new();

    let report = ws.json(&[
        "ingest",
        "Alice and Bob are rebuilding the Atlas billing service.",
        "--source",
        "notes",
    ]);
    assert_eq!(report["chunk_ids"].as_array().unwrap().len(), 1);
    assert!(report["extraction"].is_null());

    ws.json(&["ingest", "The weather was sunny all weekend.", "--source", "diary"]);

    let hits = ws.json(&["search", "Atlas billing"]);
    let hits = hits.as_array().unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0]["entry"]["source"], "notes");

    let scoped = ws.json(&["search", "weather", "--source", "notes"]);
    assert!(
        scoped
            .as_array()
            .unwrap()
            .iter()
            .all(|hit| hit["entry"]["source"] == "notes")
    );
}

#[test]
fn stats_reports_an_empty_store() {
    let ws = Workspace::new();
    let stats = ws.json(&["stats"]);
    assert_eq!(stats["graph"]["entity_count"], 0);
    assert_eq!(stats["index"]["entries"], 0);
}

#[test]
fn decay_on_an_empty_graph_is_a_no_op() {
    let ws = Workspace::new();
    let report = ws.json(&["decay"]);
    assert_eq!(report["decayed"], 0);
    assert_eq!(report["removed"], 0);
}

#[test]
fn describing_unknown_entities_fails() {
    let ws = Workspace::new();
    let output = ws.run(&["describe", "Alice", "Bob"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "stderr: {stderr}");
}

#[test]
fn invalid_config_exits_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("recall.toml");
    std::fs::write(&config, "[storage]\ndatabase_pth = \"x.db\"\n").unwrap();

    let output = recall(&config, &["stats"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("database_pth"), "stderr: {stderr}");
}
