// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vulnstats_core::NamespaceId;
use vulnstats_store_db::MAX_AGGREGATION_BATCH;

use crate::error::ConfigError;

/// How rollups under a root namespace are maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Older per-field addition, maintained outside this crate.
    LegacyAdditive,
    /// Batch recompute, diff against the stored rollup, propagate the diff.
    #[default]
    DiffAggregated,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeaseConfig {
    pub ttl_secs: u64,
    /// Extra attempts after the first one fails.
    pub retries: u32,
    pub retry_delay_millis: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            retries: 3,
            retry_delay_millis: 3000,
        }
    }
}

impl LeaseConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustmentConfig {
    /// Upper bound on namespace ids accepted by one `recalculate` call
    pub max_namespace_ids: usize,

    /// Namespaces aggregated per store round-trip
    pub batch_size: usize,

    /// Strategy for every root not listed in `legacy_roots`
    pub default_strategy: AggregationStrategy,

    /// Roots still maintained by the legacy additive path
    pub legacy_roots: Vec<NamespaceId>,

    pub lease: LeaseConfig,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            max_namespace_ids: 1000,
            batch_size: MAX_AGGREGATION_BATCH,
            default_strategy: AggregationStrategy::DiffAggregated,
            legacy_roots: Vec::new(),
            lease: LeaseConfig::default(),
        }
    }
}

impl AdjustmentConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AdjustmentConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_AGGREGATION_BATCH).contains(&self.batch_size) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "batch_size must be between 1 and {MAX_AGGREGATION_BATCH}, got {}",
                    self.batch_size
                ),
            });
        }
        if self.max_namespace_ids == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_namespace_ids must be at least 1".to_string(),
            });
        }
        if self.lease.ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "lease.ttl_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The strategy that applies to the tree rooted at `root_id`.
    pub fn strategy_for(&self, root_id: NamespaceId) -> AggregationStrategy {
        if self.legacy_roots.contains(&root_id) {
            AggregationStrategy::LegacyAdditive
        } else {
            self.default_strategy
        }
    }
}
