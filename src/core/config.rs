use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    // Concurrent-read tier
    pub max_readers: usize,                     // Max read sections open at once
    pub reader_wait_ms: u64,                    // How long reader() waits for a free slot

    // Query validation
    pub max_query_depth: usize,
    pub max_bool_clauses: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            max_readers: 64,
            reader_wait_ms: 1000,
            max_query_depth: 32,
            max_bool_clauses: 1024,
        }
    }
}

impl CollectionConfig {
    /// Parse a config, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CollectionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_readers == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "max_readers must be at least 1".to_string(),
            ));
        }
        if self.max_query_depth == 0 || self.max_bool_clauses == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "query limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
