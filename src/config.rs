use serde::{Deserialize, Serialize};

use crate::conflict::resolution::ConflictResolution;
use crate::errors::{OccError, Result};

/// Tunables for a [`crate::VersionedReplacer`].
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```no_run
/// use docdb_concurrency::prelude::*;
///
/// let config = ConcurrencyConfig::from_json(r#"{ "fetch_snapshot_on_conflict": true }"#).unwrap();
/// assert_eq!(config.max_conflict_attempts, 3);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// After a conflict whose response had no document snapshot, read the
    /// current document once so handlers can inspect it.
    pub fetch_snapshot_on_conflict: bool,
    /// Upper bound on replace attempts made by `update_with_retry`.
    pub max_conflict_attempts: u32,
    /// What `update_with_retry` does on a conflict.
    pub conflict_resolution: ConflictResolution,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            fetch_snapshot_on_conflict: false,
            max_conflict_attempts: 3,
            conflict_resolution: ConflictResolution::Fail,
        }
    }
}

impl ConcurrencyConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| OccError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_conflict_attempts == 0 {
            return Err(OccError::InvalidConfig(
                "max_conflict_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
