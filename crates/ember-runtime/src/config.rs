//! Runtime configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::dml::DmlMode;
use crate::error::RuntimeError;

/// Store location and connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file, or `:memory:`
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./database.sqlite3".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub store: StoreConfig,
    /// Deadline applied to store calls when the caller supplies none
    pub query_timeout_ms: Option<u64>,
    pub dml_mode: DmlMode,
}

impl RuntimeConfig {
    /// In-memory store, no timeout, per-record DML
    pub fn in_memory() -> Self {
        Self {
            store: StoreConfig::in_memory(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Fresh deadline derived from `query_timeout_ms`
    pub fn default_deadline(&self) -> Deadline {
        match self.query_timeout_ms {
            Some(ms) => Deadline::after(Duration::from_millis(ms)),
            None => Deadline::none(),
        }
    }
}
