// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.
//!
//! Each command opens the store named in the configuration, does one thing
//! and prints either a human summary or JSON on stdout.

use std::io::IsTerminal;

use colored::Colorize;
use recall_config::RecallConfig;
use recall_core::RecallError;
use recall_memory::{Entity, MemoryEngine, SearchOptions};
use serde::Serialize;
use serde_json::json;

use crate::Commands;

/// Longest content preview printed per search hit.
const PREVIEW_CHARS: usize = 120;

/// How results are rendered.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
    color: bool,
}

impl Output {
    pub fn new(json: bool, plain: bool) -> Self {
        Self {
            json,
            color: !plain && std::io::stdout().is_terminal(),
        }
    }

    fn emit_json<T: Serialize>(&self, value: &T) -> Result<(), RecallError> {
        let rendered = serde_json::to_string_pretty(value)
            .map_err(|e| RecallError::Internal(format!("failed to encode output: {e}")))?;
        println!("{rendered}");
        Ok(())
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn value(&self, text: String) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text
        }
    }
}

pub async fn run(command: Commands, config: RecallConfig, out: Output) -> Result<(), RecallError> {
    let engine = MemoryEngine::open(config, None, None).await?;
    match command {
        Commands::Stats => run_stats(&engine, out).await,
        Commands::Ingest { text, file, source } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| {
                    RecallError::Internal(format!("cannot read {}: {e}", path.display()))
                })?,
                (None, None) => {
                    return Err(RecallError::Internal(
                        "nothing to ingest: pass TEXT or --file".to_string(),
                    ));
                }
            };
            run_ingest(&engine, &text, &source, out).await
        }
        Commands::Search {
            query,
            limit,
            source,
        } => run_search(&engine, &query, limit, source, out).await,
        Commands::Decay => run_decay(&engine, out).await,
        Commands::Clusters { min_size } => run_clusters(&engine, min_size, out).await,
        Commands::Describe { first, second } => run_describe(&engine, &first, &second, out).await,
    }
}

async fn run_stats(engine: &MemoryEngine, out: Output) -> Result<(), RecallError> {
    let graph = engine.graph().stats().await?;
    let index = engine.index().stats().await?;

    if out.json {
        return out.emit_json(&json!({ "graph": graph, "index": index }));
    }

    println!("{}", out.heading("graph"));
    println!("  entities:        {}", out.value(graph.entity_count.to_string()));
    println!("  relationships:   {}", out.value(graph.relationship_count.to_string()));
    println!("  aliases:         {}", graph.alias_count);
    println!("  tags:            {}", graph.tag_count);
    println!("  avg connections: {:.2}", graph.avg_connections);
    for (entity_type, count) in &graph.entity_types {
        println!("    {entity_type}: {count}");
    }
    if !graph.top_connected.is_empty() {
        println!("  most connected:");
        for entity in &graph.top_connected {
            println!("    {} ({})", entity.name, entity.connections);
        }
    }

    println!("{}", out.heading("index"));
    println!("  chunks:   {}", out.value(index.entries.to_string()));
    println!("  sources:  {}", index.sources);
    println!("  embedded: {}", index.embedded);
    if index.entries > 0 {
        println!(
            "  chunk size: min {} / avg {:.0} / max {} chars",
            index.min_chunk_chars, index.avg_chunk_chars, index.max_chunk_chars
        );
    }
    Ok(())
}

async fn run_ingest(
    engine: &MemoryEngine,
    text: &str,
    source: &str,
    out: Output,
) -> Result<(), RecallError> {
    let report = engine.ingest(text, source).await?;
    engine.wait_for_embeddings().await;

    if out.json {
        return out.emit_json(&report);
    }

    println!(
        "indexed {} chunk(s) from {}",
        out.value(report.chunk_ids.len().to_string()),
        source
    );
    match &report.extraction {
        Some(summary) => println!(
            "entities: {} created, {} updated; relationships: {} created, {} strengthened",
            summary.entities_created,
            summary.entities_updated,
            summary.relationships_created,
            summary.relationships_strengthened
        ),
        None => println!("entity extraction disabled (no completion model configured)"),
    }
    Ok(())
}

async fn run_search(
    engine: &MemoryEngine,
    query: &str,
    limit: Option<usize>,
    source: Option<String>,
    out: Output,
) -> Result<(), RecallError> {
    let mut options = SearchOptions::default();
    if let Some(limit) = limit {
        options = options.with_limit(limit);
    }
    if let Some(source) = source {
        options = options.with_source(source);
    }
    let results = engine.search(query, options).await?;

    if out.json {
        return out.emit_json(&results);
    }
    if results.is_empty() {
        println!("no results for \"{query}\"");
        return Ok(());
    }

    for (rank, hit) in results.iter().enumerate() {
        println!(
            "{}. {} [{}]",
            rank + 1,
            out.value(format!("{:.3}", hit.score)),
            hit.entry.source
        );
        println!("   {}", preview(&hit.entry.content));
    }
    Ok(())
}

async fn run_decay(engine: &MemoryEngine, out: Output) -> Result<(), RecallError> {
    let report = engine.decay().await?;
    if out.json {
        return out.emit_json(&report);
    }
    println!(
        "decayed {} relationship(s), removed {}",
        out.value(report.decayed.to_string()),
        report.removed
    );
    Ok(())
}

async fn run_clusters(engine: &MemoryEngine, min_size: usize, out: Output) -> Result<(), RecallError> {
    let clusters = engine.mapper().detect_clusters(min_size).await?;
    if out.json {
        return out.emit_json(&clusters);
    }
    if clusters.is_empty() {
        println!("no clusters with at least {min_size} members");
        return Ok(());
    }

    for (i, cluster) in clusters.iter().enumerate() {
        let names: Vec<&str> = cluster.members.iter().map(|e| e.name.as_str()).collect();
        println!(
            "{} around {} (density {:.2})",
            out.heading(&format!("cluster {}", i + 1)),
            out.value(cluster.central.name.clone()),
            cluster.density
        );
        println!("   {}", names.join(", "));
    }
    Ok(())
}

async fn run_describe(
    engine: &MemoryEngine,
    first: &str,
    second: &str,
    out: Output,
) -> Result<(), RecallError> {
    let a = resolve_entity(engine, first).await?;
    let b = resolve_entity(engine, second).await?;
    let description = engine.mapper().describe_relationship(&a.id, &b.id).await?;

    if out.json {
        return out.emit_json(&json!({
            "source": a.id,
            "target": b.id,
            "description": description,
        }));
    }
    println!("{description}");
    Ok(())
}

/// Look an entity up by name (or alias), then by id.
async fn resolve_entity(engine: &MemoryEngine, key: &str) -> Result<Entity, RecallError> {
    if let Some(entity) = engine.graph().find_entity_by_name(key).await? {
        return Ok(entity);
    }
    engine
        .graph()
        .get_entity(key)
        .await?
        .ok_or_else(|| RecallError::entity_not_found(key))
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}
