// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity importance scoring.

const MS_PER_DAY: f64 = 86_400_000.0;

/// Mentions at which the mention component saturates (log2(21) normalizer).
const MENTION_SATURATION: f64 = 20.0;

/// Relationship count at which the connection component saturates.
const CONNECTION_SATURATION: f64 = 20.0;

/// Weighted blend of mention frequency, recency, connectivity and confidence.
///
/// ```text
/// importance = 0.30 * mention + 0.25 * recency + 0.25 * connections + 0.20 * confidence
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportanceModel {
    half_life_ms: f64,
}

impl ImportanceModel {
    pub fn new(half_life_days: f64) -> Self {
        Self {
            half_life_ms: half_life_days * MS_PER_DAY,
        }
    }

    /// Score in [0, 1]. Negative ages (clock skew) count as zero.
    pub fn score(&self, mention_count: u32, age_ms: i64, connections: usize, confidence: f64) -> f64 {
        let mention = ((f64::from(mention_count) + 1.0).log2()
            / (MENTION_SATURATION + 1.0).log2())
        .min(1.0);
        let recency = self.recency(age_ms);
        let connection = (connections as f64 / CONNECTION_SATURATION).min(1.0);
        let confidence = confidence.clamp(0.0, 1.0);
        0.30 * mention + 0.25 * recency + 0.25 * connection + 0.20 * confidence
    }

    /// `exp(-age * ln2 / half_life)`.
    pub fn recency(&self, age_ms: i64) -> f64 {
        if self.half_life_ms <= 0.0 {
            return 0.0;
        }
        let age = age_ms.max(0) as f64;
        (-age * std::f64::consts::LN_2 / self.half_life_ms).exp()
    }
}

impl Default for ImportanceModel {
    fn default() -> Self {
        Self::new(7.0)
    }
}
