//! In-memory bookkeeping of link support and tested-in data.
//!
//! A link is an unordered gene pair plus a correlation sign. Both directions
//! of a link share one [`SupportDetails`], so the pair is stored once under a
//! normalized [`LinkKey`].

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::config::CoexpressionConfig;
use crate::error::{LedgerError, SupportDataError};
use crate::id_array::{check_id, IdArrayBacked};
use crate::support::SupportDetails;
use crate::tested_in::{GeneCoexpressionTestedIn, TestedInCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub low: u64,
    pub high: u64,
    pub positive: bool,
}

impl LinkKey {
    pub fn new(gene1: u64, gene2: u64, positive: bool) -> Self {
        Self {
            low: gene1.min(gene2),
            high: gene1.max(gene2),
            positive,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddSummary {
    pub new_links: usize,
    pub updated_links: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub links_adjusted: usize,
    pub zero_support: usize,
    pub links_deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSupport {
    pub id: u64,
    pub first_gene: u64,
    pub second_gene: u64,
    pub positive_correlation: bool,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTestedIn {
    pub gene_id: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub support: Vec<PersistedSupport>,
    pub tested_in: Vec<PersistedTestedIn>,
}

/// Not synchronized: wrap in a lock to share between writers.
#[derive(Debug)]
pub struct CoexpressionLedger {
    config: CoexpressionConfig,
    links: BTreeMap<LinkKey, SupportDetails>,
    tested_in: AHashMap<u64, GeneCoexpressionTestedIn>,
    cache: TestedInCache,
    next_support_id: u64,
}

impl CoexpressionLedger {
    pub fn new(config: CoexpressionConfig) -> Self {
        let cache = TestedInCache::new(&config.tested_in_cache);
        Self {
            config,
            links: BTreeMap::new(),
            tested_in: AHashMap::new(),
            cache,
            next_support_id: 1,
        }
    }

    pub fn config(&self) -> &CoexpressionConfig {
        &self.config
    }

    /// Number of distinct links (flipped versions counted once).
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    // ========================================================================
    // Support
    // ========================================================================

    /// Record that an experiment supports each of `links`.
    ///
    /// The batch is validated before anything changes: an existing link
    /// listed twice, or one the experiment already supports, fails the whole
    /// batch. A new link listed twice is added once.
    pub fn add_support(
        &mut self,
        experiment: u64,
        links: &[(u64, u64, bool)],
    ) -> Result<AddSummary, LedgerError> {
        check_id(experiment)?;

        let mut seen: AHashSet<LinkKey> = AHashSet::new();
        let mut batch: Vec<(LinkKey, u64, u64)> = Vec::with_capacity(links.len());
        for &(first, second, positive) in links {
            let key = LinkKey::new(first, second, positive);
            let existing = self.links.get(&key);
            if !seen.insert(key) {
                if existing.is_some() {
                    return Err(LedgerError::DuplicateLink {
                        first_gene: first,
                        second_gene: second,
                    });
                }
                tracing::warn!(first, second, positive, "new link listed more than once");
                continue;
            }
            if let Some(sd) = existing {
                if sd.is_included(experiment) {
                    return Err(LedgerError::AlreadySupported {
                        experiment,
                        first_gene: first,
                        second_gene: second,
                    });
                }
            }
            batch.push((key, first, second));
        }

        let mut summary = AddSummary::default();
        for (key, first, second) in batch {
            match self.links.get_mut(&key) {
                Some(sd) => {
                    let old = sd.num_ids();
                    sd.add_entity(experiment)?;
                    debug_assert_eq!(sd.num_ids(), old + 1);
                    summary.updated_links += 1;
                }
                None => {
                    let mut sd = SupportDetails::new(first, second, key.positive)
                        .with_id(self.next_support_id);
                    self.next_support_id += 1;
                    sd.add_entity(experiment)?;
                    self.links.insert(key, sd);
                    summary.new_links += 1;
                }
            }
        }

        tracing::info!(
            experiment,
            new = summary.new_links,
            updated = summary.updated_links,
            "added coexpression support"
        );
        Ok(summary)
    }

    /// Remove an experiment's support from every link and from the tested-in
    /// data of every gene.
    pub fn remove_experiment(&mut self, experiment: u64) -> RemovalSummary {
        let mut summary = RemovalSummary::default();
        let mut orphans = Vec::new();

        for (key, sd) in self.links.iter_mut() {
            if !sd.is_included(experiment) {
                continue;
            }
            sd.remove_entity(experiment);
            summary.links_adjusted += 1;
            if sd.num_ids() == 0 {
                summary.zero_support += 1;
                if self.config.delete_orphan_links {
                    orphans.push(*key);
                }
            }
        }
        for key in &orphans {
            self.links.remove(key);
        }
        summary.links_deleted = orphans.len();

        if summary.links_adjusted > 0 {
            if self.config.delete_orphan_links {
                tracing::info!(
                    experiment,
                    adjusted = summary.links_adjusted,
                    removed = summary.links_deleted,
                    "adjusted links supported by the experiment; links with zero support removed"
                );
            } else {
                tracing::info!(
                    experiment,
                    adjusted = summary.links_adjusted,
                    zero_support = summary.zero_support,
                    "adjusted links supported by the experiment; links with zero support left in place"
                );
            }
        }

        // Tested-in data is cleared even when the experiment had no links.
        for (gene, tested_in) in self.tested_in.iter_mut() {
            if tested_in.is_included(experiment) {
                tested_in.remove_entity(experiment);
                self.cache.invalidate(*gene);
            }
        }

        summary
    }

    pub fn support(&self, gene1: u64, gene2: u64, positive: bool) -> Option<&SupportDetails> {
        self.links.get(&LinkKey::new(gene1, gene2, positive))
    }

    /// Zero for unknown links.
    pub fn num_datasets_supporting(&self, gene1: u64, gene2: u64, positive: bool) -> usize {
        self.support(gene1, gene2, positive)
            .map(|sd| sd.num_datasets_supporting())
            .unwrap_or(0)
    }

    /// Links involving the gene, in key order.
    pub fn links_for_gene(&self, gene: u64) -> Vec<&SupportDetails> {
        self.links
            .iter()
            .filter(|(key, _)| key.low == gene || key.high == gene)
            .map(|(_, sd)| sd)
            .collect()
    }

    // ========================================================================
    // Tested-in
    // ========================================================================

    /// Mark `genes` as tested in the experiment. Returns how many genes had
    /// no tested-in data before.
    pub fn update_tested_in(&mut self, experiment: u64, genes: &[u64]) -> Result<usize, LedgerError> {
        check_id(experiment)?;

        let mut created = 0usize;
        for &gene in genes {
            let tested_in = self.tested_in.entry(gene).or_insert_with(|| {
                created += 1;
                GeneCoexpressionTestedIn::new(gene)
            });
            tested_in.add_entity(experiment)?;
            self.cache.invalidate(gene);
        }

        tracing::info!(
            experiment,
            updated = genes.len() - created,
            added = created,
            "updated tested-in information"
        );
        Ok(created)
    }

    /// Tested-in data for one gene, through the cache.
    pub fn tested_in(&self, gene: u64) -> Option<Arc<GeneCoexpressionTestedIn>> {
        if let Some(cached) = self.cache.get(gene) {
            return Some(cached);
        }
        let tested_in = Arc::new(self.tested_in.get(&gene)?.clone());
        self.cache.insert(Arc::clone(&tested_in));
        Some(tested_in)
    }

    /// Experiments in which both genes were tested.
    pub fn tested_in_datasets(&self, gene1: u64, gene2: u64) -> Result<BTreeSet<u64>, LedgerError> {
        let first = self.tested_in(gene1).ok_or(LedgerError::MissingTestedIn(gene1))?;
        let second = self.tested_in(gene2).ok_or(LedgerError::MissingTestedIn(gene2))?;

        if first.num_datasets_tested_in() == 0 || second.num_datasets_tested_in() == 0 {
            tracing::warn!(gene1, gene2, "gene was not tested in any dataset");
        }
        let both = first.and_set(&second);
        if both.is_empty() {
            tracing::warn!(gene1, gene2, "genes were never tested together");
        }
        Ok(both)
    }

    pub fn cache(&self) -> &TestedInCache {
        &self.cache
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn persist(&self) -> Result<LedgerSnapshot, SupportDataError> {
        let mut support = Vec::with_capacity(self.links.len());
        for sd in self.links.values() {
            support.push(PersistedSupport {
                id: sd.id.unwrap_or_default(),
                first_gene: sd.first_gene,
                second_gene: sd.second_gene,
                positive_correlation: sd.positive_correlation,
                bytes: sd.to_bytes()?,
            });
        }

        let mut tested_in = Vec::with_capacity(self.tested_in.len());
        for t in self.tested_in.values() {
            tested_in.push(PersistedTestedIn {
                gene_id: t.gene_id,
                bytes: t.to_bytes()?,
            });
        }
        tested_in.sort_by_key(|t| t.gene_id);

        Ok(LedgerSnapshot { support, tested_in })
    }

    pub fn restore(snapshot: LedgerSnapshot, config: CoexpressionConfig) -> Result<Self, SupportDataError> {
        let mut ledger = Self::new(config);
        for row in snapshot.support {
            let sd = SupportDetails::from_bytes(
                row.first_gene,
                row.second_gene,
                row.positive_correlation,
                &row.bytes,
            )?
            .with_id(row.id);
            let next = row.id.checked_add(1).ok_or_else(|| {
                SupportDataError::corrupt(format!("support id {} leaves no room for new links", row.id))
            })?;
            ledger.next_support_id = ledger.next_support_id.max(next);

            let key = LinkKey::new(row.first_gene, row.second_gene, row.positive_correlation);
            if ledger.links.insert(key, sd).is_some() {
                return Err(SupportDataError::corrupt(format!(
                    "link {}-{} ({}) stored twice",
                    key.low,
                    key.high,
                    if key.positive { "+" } else { "-" }
                )));
            }
        }
        for row in snapshot.tested_in {
            let tested_in = GeneCoexpressionTestedIn::from_bytes(row.gene_id, &row.bytes)?;
            ledger.tested_in.insert(row.gene_id, tested_in);
        }
        tracing::debug!(
            links = ledger.links.len(),
            genes = ledger.tested_in.len(),
            "restored coexpression ledger"
        );
        Ok(ledger)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let snapshot = self.persist()?;
        let json = serde_json::to_vec(&snapshot)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>, config: CoexpressionConfig) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&content)
            .map_err(|e| anyhow::anyhow!("invalid ledger file {}: {e}", path.display()))?;
        Ok(Self::restore(snapshot, config)?)
    }
}
