//! Tunable policy constants.
//!
//! Loaded as part of the daemon configuration; every field has a default so
//! a partial YAML section is valid.

use serde::{Deserialize, Serialize};

/// All engine policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnginePolicy {
    #[serde(default)]
    pub memory: MemoryPolicy,

    #[serde(default)]
    pub loop_detector: LoopPolicy,

    #[serde(default)]
    pub checkpoints: CheckpointPolicy,
}

/// Memory cleanup and ranking policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPolicy {
    /// Similarity at or above which two memories are merged (0.0-1.0)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Days without access before a memory starts decaying
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Decayed memories below this relevance are deleted
    #[serde(default = "default_min_relevance")]
    pub min_relevance: u8,

    /// Relevance lost per full week past `max_age_days`
    #[serde(default = "default_decay_per_week")]
    pub decay_per_week: u8,

    /// Memories at or above this relevance never decay
    #[serde(default = "default_decay_exempt_relevance")]
    pub decay_exempt_relevance: u8,

    /// Relevance assigned when the caller gives none
    #[serde(default = "default_relevance")]
    pub default_relevance: u8,

    /// Size of the recent subset in a session briefing
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Result limit for searches that do not set one
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Days without access after which a memory counts as stale in stats
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
}

/// Loop detection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopPolicy {
    /// Only events this recent count toward classification
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Edits to one file that put it on watch
    #[serde(default = "default_watch_threshold")]
    pub watch_threshold: usize,

    /// Edits to one file at which the last test result decides the state
    #[serde(default = "default_spiral_threshold")]
    pub spiral_threshold: usize,

    /// Retained events per kind; older ones are dropped
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

/// Checkpoint retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    /// Checkpoints kept per project
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: usize,

    /// Restoring a checkpoint older than this adds a warning
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: i64,
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_max_age_days() -> u32 {
    30
}

fn default_min_relevance() -> u8 {
    2
}

fn default_decay_per_week() -> u8 {
    1
}

fn default_decay_exempt_relevance() -> u8 {
    7
}

fn default_relevance() -> u8 {
    5
}

fn default_recent_limit() -> usize {
    10
}

fn default_search_limit() -> usize {
    5
}

fn default_stale_after_days() -> u32 {
    60
}

fn default_window_minutes() -> i64 {
    60
}

fn default_watch_threshold() -> usize {
    2
}

fn default_spiral_threshold() -> usize {
    3
}

fn default_max_events() -> usize {
    500
}

fn default_max_checkpoints() -> usize {
    50
}

fn default_stale_after_hours() -> i64 {
    24
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_age_days: default_max_age_days(),
            min_relevance: default_min_relevance(),
            decay_per_week: default_decay_per_week(),
            decay_exempt_relevance: default_decay_exempt_relevance(),
            default_relevance: default_relevance(),
            recent_limit: default_recent_limit(),
            search_limit: default_search_limit(),
            stale_after_days: default_stale_after_days(),
        }
    }
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            watch_threshold: default_watch_threshold(),
            spiral_threshold: default_spiral_threshold(),
            max_events: default_max_events(),
        }
    }
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            max_checkpoints: default_max_checkpoints(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_policy_uses_defaults() {
        let policy: EnginePolicy =
            serde_json::from_str(r#"{"memory": {"similarity_threshold": 0.9}}"#).unwrap();
        assert_eq!(policy.memory.similarity_threshold, 0.9);
        assert_eq!(policy.memory.max_age_days, 30);
        assert_eq!(policy.memory.min_relevance, 2);
        assert_eq!(policy.loop_detector.spiral_threshold, 3);
        assert_eq!(policy.checkpoints.stale_after_hours, 24);
    }
}
