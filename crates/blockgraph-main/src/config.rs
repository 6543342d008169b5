//! Relation-index configuration.
//!
//! Loaded from JSON; every key is optional:
//!
//! ```json
//! { "pool_chunk_size": 256, "entry_capacity_hint": 50000, "include_ui": false,
//!   "max_edge_records": 1000000 }
//! ```
//!
//! `BLOCKGRAPH_POOL_CHUNK_SIZE` overrides the chunk size when set.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MainError, Result};
use crate::pool::DEFAULT_CHUNK_SIZE;
use crate::relations::RelationsFlags;

pub const POOL_CHUNK_SIZE_ENV: &str = "BLOCKGRAPH_POOL_CHUNK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationsConfig {
    /// Edge records per pool chunk.
    pub pool_chunk_size: usize,
    /// Entries to reserve up front, on top of the registry size.
    pub entry_capacity_hint: usize,
    /// Build with UI-only references included.
    pub include_ui: bool,
    /// Refuse builds needing more edge records than this.
    pub max_edge_records: Option<usize>,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            pool_chunk_size: DEFAULT_CHUNK_SIZE,
            entry_capacity_hint: 0,
            include_ui: false,
            max_edge_records: None,
        }
    }
}

impl RelationsConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: RelationsConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Apply `BLOCKGRAPH_POOL_CHUNK_SIZE` if it is set.
    pub fn with_env_overrides(self) -> Result<Self> {
        match std::env::var(POOL_CHUNK_SIZE_ENV) {
            Ok(raw) => self.with_chunk_size_override(&raw),
            Err(_) => Ok(self),
        }
    }

    fn with_chunk_size_override(mut self, raw: &str) -> Result<Self> {
        self.pool_chunk_size = raw.trim().parse().map_err(|_| {
            MainError::Config(format!("{POOL_CHUNK_SIZE_ENV}={raw:?} is not a number"))
        })?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_chunk_size == 0 {
            return Err(MainError::Config("pool_chunk_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Build flags implied by this configuration.
    pub fn flags(&self) -> RelationsFlags {
        if self.include_ui {
            RelationsFlags::INCLUDE_UI
        } else {
            RelationsFlags::empty()
        }
    }
}
