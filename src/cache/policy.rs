//! Eviction Policy Module
//!
//! Chooses which near cache keys to drop when the table is over capacity.
//! The read and write paths only ever call [`EvictionPolicy::select_victims`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the policy knows about one resident key.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionCandidate {
    pub key: String,
    /// Last time the key was read or written (Unix milliseconds)
    pub last_access_at: u64,
    /// Reads observed for the key
    pub access_count: u64,
}

// == Eviction Policy ==
/// Near cache eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Least recently used first
    Recency,
    /// Least frequently used first, ties broken by recency
    Frequency,
    /// Weighted mix of normalised idle time and normalised rarity
    Blended {
        recency_weight: f64,
        frequency_weight: f64,
    },
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Blended {
            recency_weight: 0.5,
            frequency_weight: 0.5,
        }
    }
}

impl EvictionPolicy {
    /// Returns up to `count` keys to evict, most evictable first.
    pub fn select_victims(
        &self,
        mut candidates: Vec<EvictionCandidate>,
        count: usize,
        now_ms: u64,
    ) -> Vec<String> {
        if count == 0 || candidates.is_empty() {
            return Vec::new();
        }

        match *self {
            EvictionPolicy::Recency => {
                candidates.sort_by(|a, b| {
                    a.last_access_at
                        .cmp(&b.last_access_at)
                        .then_with(|| a.key.cmp(&b.key))
                });
            }
            EvictionPolicy::Frequency => {
                candidates.sort_by(|a, b| {
                    a.access_count
                        .cmp(&b.access_count)
                        .then_with(|| a.last_access_at.cmp(&b.last_access_at))
                        .then_with(|| a.key.cmp(&b.key))
                });
            }
            EvictionPolicy::Blended {
                recency_weight,
                frequency_weight,
            } => {
                let max_idle = candidates
                    .iter()
                    .map(|c| now_ms.saturating_sub(c.last_access_at))
                    .max()
                    .unwrap_or(0)
                    .max(1) as f64;
                let max_count = candidates
                    .iter()
                    .map(|c| c.access_count)
                    .max()
                    .unwrap_or(0)
                    .max(1) as f64;

                // Higher score = more evictable
                let score = |c: &EvictionCandidate| {
                    let idle = now_ms.saturating_sub(c.last_access_at) as f64 / max_idle;
                    let rarity = 1.0 - c.access_count as f64 / max_count;
                    recency_weight * idle + frequency_weight * rarity
                };

                candidates.sort_by(|a, b| {
                    score(b)
                        .partial_cmp(&score(a))
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.last_access_at.cmp(&b.last_access_at))
                        .then_with(|| a.key.cmp(&b.key))
                });
            }
        }

        candidates.into_iter().take(count).map(|c| c.key).collect()
    }

    /// Short policy name for logs and stats.
    pub fn name(&self) -> &'static str {
        match self {
            EvictionPolicy::Recency => "recency",
            EvictionPolicy::Frequency => "frequency",
            EvictionPolicy::Blended { .. } => "blended",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recency" | "lru" => Ok(EvictionPolicy::Recency),
            "frequency" | "lfu" => Ok(EvictionPolicy::Frequency),
            "blended" | "lru-k" => Ok(EvictionPolicy::default()),
            other => Err(format!("unknown eviction policy '{}'", other)),
        }
    }
}
