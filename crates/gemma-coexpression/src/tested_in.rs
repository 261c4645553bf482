//! Which experiments each gene was tested for coexpression in.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::config::CacheConfig;
use crate::error::SupportDataError;
use crate::id_array::{IdArray, IdArrayBacked};

/// Experiments in which a gene was tested. One per gene.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneCoexpressionTestedIn {
    pub gene_id: u64,
    ids: IdArray,
}

impl GeneCoexpressionTestedIn {
    pub fn new(gene_id: u64) -> Self {
        Self {
            gene_id,
            ids: IdArray::new(),
        }
    }

    pub fn from_bytes(gene_id: u64, bytes: &[u8]) -> Result<Self, SupportDataError> {
        Ok(Self {
            gene_id,
            ids: IdArray::from_bytes(bytes)?,
        })
    }

    pub fn num_datasets_tested_in(&self) -> usize {
        self.num_ids()
    }

    /// Experiments both genes were tested in.
    pub fn and_set(&self, other: &GeneCoexpressionTestedIn) -> BTreeSet<u64> {
        self.ids.and_set(&other.ids)
    }
}

impl IdArrayBacked for GeneCoexpressionTestedIn {
    fn id_array(&self) -> &IdArray {
        &self.ids
    }

    fn id_array_mut(&mut self) -> &mut IdArray {
        &mut self.ids
    }
}

/// Bounded per-gene cache of tested-in data.
#[derive(Clone)]
pub struct TestedInCache {
    inner: Cache<u64, Arc<GeneCoexpressionTestedIn>>,
}

impl TestedInCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(Duration::from_secs(config.ttl_secs))
                .build(),
        }
    }

    pub fn get(&self, gene_id: u64) -> Option<Arc<GeneCoexpressionTestedIn>> {
        self.inner.get(&gene_id)
    }

    pub fn insert(&self, tested_in: Arc<GeneCoexpressionTestedIn>) {
        self.inner.insert(tested_in.gene_id, tested_in);
    }

    pub fn invalidate(&self, gene_id: u64) {
        self.inner.invalidate(&gene_id);
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for TestedInCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl std::fmt::Debug for TestedInCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestedInCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
