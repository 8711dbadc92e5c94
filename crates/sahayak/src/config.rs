use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for the routing pipeline. One consistent set of thresholds
/// replaces the divergent constants found across earlier matching attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub thresholds: ThresholdConfig,
    pub pattern: PatternConfig,
    pub semantic: SemanticConfig,
    pub fallback: FallbackConfig,
    pub quota: QuotaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum RelevanceScorer score (0–100) accepted at the scoring tier.
    pub score_accept: f32,
    /// Minimum score for an entry to be forwarded as a semantic candidate.
    /// Deliberately below `score_accept` so borderline entries still get a
    /// semantic look.
    pub candidate_floor: f32,
    /// Score reported for pattern-tier hits.
    pub pattern_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// How many of an entry's top keywords feed its compiled pattern.
    pub max_keywords: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Upper bound on candidates sent to the external model in one call.
    pub candidate_cap: usize,
    pub max_output_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// How many prior turns are replayed as conversational context.
    pub history_window: usize,
    pub max_output_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Cooldown applied when the provider signals rate limiting without a
    /// usable retry delay.
    pub default_cooldown_secs: u64,
}

impl RouterConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.thresholds.score_accept) {
            return Err("thresholds.score_accept must be in [0, 100]".into());
        }
        if self.thresholds.candidate_floor > self.thresholds.score_accept {
            return Err("thresholds.candidate_floor must be <= score_accept".into());
        }
        if self.pattern.max_keywords == 0 {
            return Err("pattern.max_keywords must be > 0".into());
        }
        if self.semantic.candidate_cap == 0 {
            return Err("semantic.candidate_cap must be > 0".into());
        }
        if self.fallback.history_window == 0 {
            return Err("fallback.history_window must be > 0".into());
        }
        if self.quota.default_cooldown_secs == 0 {
            return Err("quota.default_cooldown_secs must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, validating before returning.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig {
                score_accept: 40.0,
                candidate_floor: 25.0,
                pattern_score: 90.0,
            },
            pattern: PatternConfig { max_keywords: 4 },
            semantic: SemanticConfig {
                candidate_cap: 20,
                max_output_tokens: 128,
            },
            fallback: FallbackConfig {
                history_window: 8,
                max_output_tokens: 1024,
            },
            quota: QuotaConfig {
                default_cooldown_secs: 3600,
            },
        }
    }
}
