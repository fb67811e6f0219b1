//! Runtime configuration
//!
//! Storage is chosen when the admin is constructed: a redb file per identity
//! under a data directory, or an in-memory log for simulations and tests.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SneerError, SneerResult};

/// Where a runtime keeps its tuple log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// One redb file per identity inside `data_dir`
    Durable { data_dir: PathBuf },
    /// Process memory; survives `restart` but not the process
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SneerConfig {
    pub storage: StorageConfig,
}

impl SneerConfig {
    pub fn durable(data_dir: impl AsRef<Path>) -> Self {
        Self {
            storage: StorageConfig::Durable {
                data_dir: data_dir.as_ref().to_path_buf(),
            },
        }
    }

    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig::InMemory,
        }
    }

    pub fn from_json(json: &str) -> SneerResult<Self> {
        serde_json::from_str(json).map_err(|e| SneerError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> SneerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SneerError::Serialization(e.to_string()))
    }
}
