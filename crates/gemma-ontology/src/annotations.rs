//! Gene -> GO annotation lookups and term overlap between genes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cache::GoTermCache;
use crate::error::SourceError;
use crate::service::GeneOntologyService;
use crate::term::{normalize_accession, GoAspect};

/// Roots of the three GO aspects; never counted as shared annotation.
pub const ASPECT_ROOTS: [&str; 3] = ["GO:0008150", "GO:0003674", "GO:0005575"];

/// Gene <-> GO association store.
pub trait GeneAnnotationSource: Send + Sync {
    /// GO accessions directly annotated to the gene.
    fn go_terms_for_gene(&self, gene_id: u64) -> Result<Vec<String>, SourceError>;

    /// Genes directly annotated with the accession.
    fn genes_for_term(&self, accession: &str) -> Result<Vec<u64>, SourceError>;
}

pub struct GoAnnotationService {
    ontology: Arc<GeneOntologyService>,
    annotations: Arc<dyn GeneAnnotationSource>,
    cache: GoTermCache,
}

impl GoAnnotationService {
    pub fn new(
        ontology: Arc<GeneOntologyService>,
        annotations: Arc<dyn GeneAnnotationSource>,
        cache: GoTermCache,
    ) -> Self {
        Self {
            ontology,
            annotations,
            cache,
        }
    }

    /// Use a cache sized by the ontology's `annotation_cache` settings.
    pub fn with_configured_cache(
        ontology: Arc<GeneOntologyService>,
        annotations: Arc<dyn GeneAnnotationSource>,
    ) -> Self {
        let cache = GoTermCache::new(&ontology.config().annotation_cache);
        Self::new(ontology, annotations, cache)
    }

    pub fn ontology(&self) -> &GeneOntologyService {
        &self.ontology
    }

    pub fn cache(&self) -> &GoTermCache {
        &self.cache
    }

    /// The gene's GO terms plus all of their ancestors.
    ///
    /// Annotations to terms the ontology does not know are skipped. The
    /// result is cached per gene.
    pub fn go_terms(&self, gene_id: u64) -> Arc<BTreeSet<String>> {
        if let Some(cached) = self.cache.get(gene_id) {
            return cached;
        }

        let direct = match self.annotations.go_terms_for_gene(gene_id) {
            Ok(direct) => direct,
            Err(err) => {
                // Not cached, so the next call retries.
                tracing::warn!(gene_id, error = %err, "failed to load GO annotations");
                return Arc::new(BTreeSet::new());
            }
        };

        let mut known: Vec<String> = Vec::with_capacity(direct.len());
        for raw in direct {
            match self.ontology.get_term(&raw) {
                Some(term) => known.push(term.accession),
                None => {
                    tracing::warn!(
                        gene_id,
                        accession = %normalize_accession(&raw),
                        "term not found in ontology, skipping annotation"
                    );
                }
            }
        }

        let include_part_of = self.ontology.config().include_part_of;
        let mut terms: BTreeSet<String> = known.iter().cloned().collect();
        terms.extend(
            self.ontology
                .get_all_parents_of_many(known.iter().map(String::as_str), include_part_of)
                .into_iter()
                .map(|t| t.accession),
        );

        let terms = Arc::new(terms);
        self.cache.insert(gene_id, Arc::clone(&terms));
        terms
    }

    /// `go_terms` restricted to one aspect.
    pub fn go_terms_in_aspect(&self, gene_id: u64, aspect: GoAspect) -> BTreeSet<String> {
        self.go_terms(gene_id)
            .iter()
            .filter(|acc| self.ontology.get_term_aspect(acc) == Some(aspect))
            .cloned()
            .collect()
    }

    /// Terms shared between the query gene and each of `gene_ids`.
    ///
    /// The query gene maps to its own terms. Genes without terms, or any gene
    /// when the query has none, map to an empty set.
    pub fn calculate_go_term_overlap(
        &self,
        query_gene: u64,
        gene_ids: &[u64],
    ) -> BTreeMap<u64, BTreeSet<String>> {
        let mut overlap = BTreeMap::new();
        if gene_ids.is_empty() {
            return overlap;
        }

        let query_terms = self.go_terms(query_gene);
        overlap.insert(query_gene, query_terms.as_ref().clone());

        for &gene in gene_ids {
            if query_terms.is_empty() {
                overlap.insert(gene, BTreeSet::new());
                continue;
            }
            let terms = self.go_terms(gene);
            overlap.insert(gene, compute_overlap(&query_terms, &terms));
        }
        overlap
    }

    pub fn calculate_pair_overlap(&self, gene1: u64, gene2: u64) -> BTreeSet<String> {
        compute_overlap(&self.go_terms(gene1), &self.go_terms(gene2))
    }

    /// Genes annotated with the term or any of its descendants. `None` if
    /// the term is unknown.
    pub fn genes_for_term(&self, accession: &str) -> Option<BTreeSet<u64>> {
        let term = self.ontology.get_term(accession)?;
        let mut accessions = vec![term.accession.clone()];
        accessions.extend(
            self.ontology
                .get_all_children(&term.accession)
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.accession),
        );

        let mut genes = BTreeSet::new();
        for acc in &accessions {
            match self.annotations.genes_for_term(acc) {
                Ok(found) => genes.extend(found),
                Err(err) => {
                    tracing::warn!(accession = %acc, error = %err, "failed to load genes for term");
                }
            }
        }
        Some(genes)
    }

    /// Number of shared terms, aspect roots excluded.
    pub fn simple_overlap_score(&self, gene1: u64, gene2: u64) -> f64 {
        if !self.ontology.is_ready() {
            tracing::error!("simple overlap computed before the Gene Ontology is ready");
        }
        self.shared_non_root(gene1, gene2) as f64
    }

    /// Shared terms as a fraction of the smaller term set.
    pub fn percent_overlap_score(&self, gene1: u64, gene2: u64) -> f64 {
        if !self.ontology.is_ready() {
            tracing::error!("percent overlap computed before the Gene Ontology is ready");
        }
        let smaller = self.go_terms(gene1).len().min(self.go_terms(gene2).len());
        if smaller == 0 {
            return 0.0;
        }
        self.shared_non_root(gene1, gene2) as f64 / smaller as f64
    }

    fn shared_non_root(&self, gene1: u64, gene2: u64) -> usize {
        self.calculate_pair_overlap(gene1, gene2)
            .iter()
            .filter(|acc| !ASPECT_ROOTS.contains(&acc.as_str()))
            .count()
    }

    /// Clear cached annotations and shut the ontology down.
    pub fn shutdown(&self) {
        self.cache.invalidate_all();
        self.ontology.shutdown();
    }
}

pub fn compute_overlap(master: &BTreeSet<String>, comparison: &BTreeSet<String>) -> BTreeSet<String> {
    master.intersection(comparison).cloned().collect()
}
