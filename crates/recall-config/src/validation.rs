// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates ranges and cross-field constraints that serde attributes cannot
//! express, such as probability bounds and chunk overlap smaller than chunk size.

use crate::diagnostic::ConfigError;
use crate::model::RecallConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &RecallConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.engine.log_level.as_str()) {
        fail(format!(
            "engine.log_level `{}` must be one of: {}",
            config.engine.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.graph.importance_half_life_days <= 0.0 {
        fail(format!(
            "graph.importance_half_life_days must be positive, got {}",
            config.graph.importance_half_life_days
        ));
    }

    let extraction = &config.extraction;
    if !(0.0..=1.0).contains(&extraction.min_confidence) {
        fail(format!(
            "extraction.min_confidence must be within 0.0-1.0, got {}",
            extraction.min_confidence
        ));
    }
    if !(0.0..=1.0).contains(&extraction.dedup_threshold) {
        fail(format!(
            "extraction.dedup_threshold must be within 0.0-1.0, got {}",
            extraction.dedup_threshold
        ));
    }
    if extraction.batch_size == 0 {
        fail("extraction.batch_size must be at least 1".to_string());
    }

    let index = &config.index;
    if index.chunk_tokens == 0 {
        fail("index.chunk_tokens must be at least 1".to_string());
    }
    if index.overlap_tokens >= index.chunk_tokens {
        fail(format!(
            "index.overlap_tokens ({}) must be smaller than index.chunk_tokens ({})",
            index.overlap_tokens, index.chunk_tokens
        ));
    }
    if index.chars_per_token == 0 {
        fail("index.chars_per_token must be at least 1".to_string());
    }
    if index.search_limit == 0 {
        fail("index.search_limit must be at least 1".to_string());
    }
    if index.recency_half_life_days <= 0.0 {
        fail(format!(
            "index.recency_half_life_days must be positive, got {}",
            index.recency_half_life_days
        ));
    }
    if index.embedding_queue_capacity == 0 {
        fail("index.embedding_queue_capacity must be at least 1".to_string());
    }

    let w = &index.weights;
    let weights = [
        ("vector", w.vector),
        ("bm25", w.bm25),
        ("graph", w.graph),
        ("recency", w.recency),
        ("entity_density", w.entity_density),
    ];
    for (name, value) in weights {
        if value < 0.0 {
            fail(format!("index.weights.{name} must be non-negative, got {value}"));
        }
    }
    if w.total() <= 0.0 {
        fail("index.weights must not all be zero".to_string());
    }

    let decay = &config.decay;
    if decay.half_life_days <= 0.0 {
        fail(format!(
            "decay.half_life_days must be positive, got {}",
            decay.half_life_days
        ));
    }
    if decay.remove_below < 0.0 {
        fail(format!(
            "decay.remove_below must be non-negative, got {}",
            decay.remove_below
        ));
    }
    if decay.threshold < 0.0 {
        fail(format!(
            "decay.threshold must be non-negative, got {}",
            decay.threshold
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RecallConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = RecallConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = RecallConfig::default();
        config.index.chunk_tokens = 50;
        config.index.overlap_tokens = 50;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "overlap_tokens"));
    }

    #[test]
    fn min_confidence_out_of_range() {
        let mut config = RecallConfig::default();
        config.extraction.min_confidence = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "min_confidence"));
    }

    #[test]
    fn negative_weight_and_zero_batch_are_both_reported() {
        let mut config = RecallConfig::default();
        config.index.weights.graph = -0.1;
        config.extraction.batch_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(has_error(&errors, "weights.graph"));
        assert!(has_error(&errors, "batch_size"));
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = RecallConfig::default();
        config.engine.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "log_level"));
    }

    #[test]
    fn decay_half_life_must_be_positive() {
        let mut config = RecallConfig::default();
        config.decay.half_life_days = 0.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "decay.half_life_days"));
    }

    #[test]
    fn partial_toml_validates() {
        let toml_str = r#"
[index]
chunk_tokens = 200
overlap_tokens = 20
"#;
        let config: RecallConfig = toml::from_str(toml_str).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.index.chunk_tokens, 200);
    }

    #[test]
    fn unknown_section_rejected_by_deserializer() {
        let result = toml::from_str::<RecallConfig>("[vault]\nenabled = true\n");
        assert!(result.is_err());
    }
}
