// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./recall.toml` > `~/.config/recall/recall.toml` > `/etc/recall/recall.toml`
//! with environment variable overrides via `RECALL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RecallConfig;

/// Section prefixes recognized in `RECALL_*` variable names, longest first.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("index_weights_", "index.weights."),
    ("engine_", "engine."),
    ("storage_", "storage."),
    ("graph_", "graph."),
    ("extraction_", "extraction."),
    ("index_", "index."),
    ("decay_", "decay."),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/recall/recall.toml`
/// 3. `~/.config/recall/recall.toml`
/// 4. `./recall.toml`
/// 5. `RECALL_*` environment variables
pub fn load_config() -> Result<RecallConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RecallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RecallConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RecallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RecallConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RecallConfig::default()))
        .merge(Toml::file("/etc/recall/recall.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("recall/recall.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("recall.toml"))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env key to a dotted config path.
///
/// Uses explicit section prefixes instead of `Env::split("_")` because
/// field names contain underscores: `RECALL_STORAGE_DATABASE_PATH` must map to
/// `storage.database_path`, not `storage.database.path`.
pub fn map_env_key(key: &str) -> String {
    for (prefix, dotted) in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{dotted}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("RECALL_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("extraction_min_confidence"), "extraction.min_confidence");
        assert_eq!(map_env_key("index_chunk_tokens"), "index.chunk_tokens");
        assert_eq!(map_env_key("index_weights_vector"), "index.weights.vector");
        assert_eq!(map_env_key("decay_remove_below"), "decay.remove_below");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("whatever"), "whatever");
    }
}
