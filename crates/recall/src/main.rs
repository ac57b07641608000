// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recall - a local knowledge-graph memory engine.
//!
//! Maintenance CLI over a single memory store: ingest text, search it,
//! inspect the graph and run relationship decay.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recall_config::RecallConfig;
use tracing_subscriber::EnvFilter;

/// Recall - a local knowledge-graph memory engine.
#[derive(Parser, Debug)]
#[command(name = "recall", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show graph and index statistics.
    Stats,
    /// Index a piece of text (and extract entities when a model is configured).
    Ingest {
        /// Text to ingest. Read from `--file` when omitted.
        text: Option<String>,
        /// Read the text from a file.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Source label recorded on every chunk.
        #[arg(long, default_value = "cli")]
        source: String,
    },
    /// Hybrid search over the indexed text.
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        /// Only search chunks from this source.
        #[arg(long)]
        source: Option<String>,
    },
    /// Decay relationship weights by elapsed time.
    Decay,
    /// Detect entity clusters.
    Clusters {
        #[arg(long, default_value_t = 3)]
        min_size: usize,
    },
    /// Describe how two entities relate (names or ids).
    Describe { first: String, second: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            recall_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.engine.log_level);

    let Some(command) = cli.command else {
        println!("recall: use --help for available commands");
        return;
    };

    let output = commands::Output::new(cli.json, cli.plain);
    if let Err(e) = commands::run(command, config, output).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<RecallConfig, Vec<recall_config::ConfigError>> {
    match path {
        Some(path) => recall_config::load_and_validate_path(path),
        None => recall_config::load_and_validate(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("recall={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["recall", "search", "atlas", "--limit", "3", "--json"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Some(Commands::Search { query, limit, source }) => {
                assert_eq!(query, "atlas");
                assert_eq!(limit, Some(3));
                assert!(source.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ingest_rejects_text_and_file_together() {
        let result = Cli::try_parse_from(["recall", "ingest", "hello", "--file", "notes.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn clusters_default_min_size() {
        let cli = Cli::try_parse_from(["recall", "clusters"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Clusters { min_size: 3 })));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.toml");
        std::fs::write(&path, "[engine]\nname = \"notes\"\n").unwrap();
        let config = load_config(Some(&path)).expect("config should load");
        assert_eq!(config.engine.name, "notes");
    }

    #[test]
    fn unknown_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.toml");
        std::fs::write(&path, "[engine]\nnmae = \"notes\"\n").unwrap();
        let errors = load_config(Some(&path)).unwrap_err();
        assert!(!errors.is_empty());
    }
}
