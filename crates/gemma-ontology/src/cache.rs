//! Bounded gene -> GO term cache.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::config::CacheConfig;

/// Caches, per gene id, the gene's GO terms closed over their ancestors.
#[derive(Clone)]
pub struct GoTermCache {
    inner: Cache<u64, Arc<BTreeSet<String>>>,
}

impl GoTermCache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self { inner }
    }

    pub fn get(&self, gene_id: u64) -> Option<Arc<BTreeSet<String>>> {
        self.inner.get(&gene_id)
    }

    pub fn insert(&self, gene_id: u64, terms: Arc<BTreeSet<String>>) {
        self.inner.insert(gene_id, terms);
    }

    pub fn invalidate(&self, gene_id: u64) {
        self.inner.invalidate(&gene_id);
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub fn max_entries(&self) -> Option<u64> {
        self.inner.policy().max_capacity()
    }

    /// Approximate; pending maintenance is run first.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for GoTermCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl std::fmt::Debug for GoTermCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTermCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
