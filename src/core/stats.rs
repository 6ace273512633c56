use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Collection statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub captured_at: DateTime<Utc>,

    // Contents
    pub object_count: usize,
    pub mutation_count: u64,            // Batches that changed something
    pub indexes: Vec<IndexStats>,

    // Tier specific
    pub version: Option<u64>,           // Transactional tier: published version
    pub active_readers: Option<usize>,  // Concurrent-read tier: open read sections
    pub max_readers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub name: String,
    pub target: String,
    pub indexed_objects: usize,
    pub distinct_keys: Option<usize>,
}

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl CollectionStats {
    /// Every index must hold exactly the objects the collection holds
    pub fn health(&self) -> HealthStatus {
        let lagging: Vec<&str> = self
            .indexes
            .iter()
            .filter(|i| i.indexed_objects != self.object_count)
            .map(|i| i.name.as_str())
            .collect();
        if !lagging.is_empty() {
            return HealthStatus::Unhealthy(format!("indexes out of sync with storage: {}", lagging.join(", ")));
        }
        match (self.active_readers, self.max_readers) {
            (Some(active), Some(max)) if active >= max => {
                HealthStatus::Degraded(format!("all {} reader slots in use", max))
            }
            _ => HealthStatus::Healthy,
        }
    }

    pub fn to_json(&self) -> crate::core::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
