//! Ontology service configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::term::ALL_ROOT;

/// Environment variable that overrides [`OntologyConfig::load_ontology`].
pub const LOAD_ONTOLOGY_ENV: &str = "GEMMA_LOAD_ONTOLOGY";

/// Bounded cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    pub max_entries: u64,
    /// Time-to-live per entry, in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 3600,
        }
    }
}

/// Configuration for the Gene Ontology service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    /// Load the ontology into memory on `initialize()`
    pub load_ontology: bool,
    /// Accession of the term the graph is built from
    pub root_accession: String,
    /// Materialize `part_of` edges in the graph
    pub include_part_of: bool,
    /// Gene -> GO term cache
    pub annotation_cache: CacheConfig,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            load_ontology: true,
            root_accession: ALL_ROOT.to_string(),
            include_part_of: false,
            annotation_cache: CacheConfig::default(),
        }
    }
}

impl OntologyConfig {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Apply `GEMMA_LOAD_ONTOLOGY` if it is set.
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(LOAD_ONTOLOGY_ENV).ok();
        self.with_load_override(value.as_deref())
    }

    /// Unparseable values leave the setting as it was.
    pub fn with_load_override(mut self, value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" || v == "1" => self.load_ontology = true,
            Some(v) if v == "false" || v == "0" => self.load_ontology = false,
            Some(v) => {
                tracing::warn!(value = %v, "ignoring unrecognized {LOAD_ONTOLOGY_ENV} value");
            }
            None => {}
        }
        self
    }
}
