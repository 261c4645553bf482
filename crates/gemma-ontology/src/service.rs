//! Gene Ontology service: background loading plus ancestor/descendant queries.
//!
//! The service owns a [`LoadState`] behind a single lock. Queries take a
//! snapshot of the state: when it is `Ready` they are answered from the
//! shared, immutable [`OntologyGraph`]; in every other state they fall back
//! to the slow [`TermSource`].

use ahash::AHashSet;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::config::OntologyConfig;
use crate::error::{GraphError, ServiceError, SourceError};
use crate::graph::OntologyGraph;
use crate::source::TermSource;
use crate::term::{normalize_accession, EdgeKind, GoAspect, OntologyTerm};

const LOADER_THREAD_NAME: &str = "gemma_go_loader";

/// Lifecycle of the in-memory graph.
#[derive(Debug, Clone)]
pub enum LoadState {
    NotStarted,
    /// Loading switched off by configuration.
    Disabled,
    Loading,
    Ready(Arc<OntologyGraph>),
    /// Terminal for this process unless `force_reload()` is called.
    Failed(String),
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Disabled => "disabled",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

pub struct GeneOntologyService {
    source: Arc<dyn TermSource>,
    config: OntologyConfig,
    state: Arc<RwLock<LoadState>>,
}

impl GeneOntologyService {
    pub fn new(source: Arc<dyn TermSource>, config: OntologyConfig) -> Self {
        Self {
            source,
            config,
            state: Arc::new(RwLock::new(LoadState::NotStarted)),
        }
    }

    pub fn config(&self) -> &OntologyConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start loading the graph on a background thread.
    ///
    /// No-op while a load is running or once a load has finished (either
    /// way). The returned handle may be ignored.
    pub fn initialize(&self) -> Option<JoinHandle<()>> {
        {
            let mut state = self.state.write();
            match &*state {
                LoadState::Loading => {
                    tracing::warn!("Gene Ontology initialization is already running");
                    return None;
                }
                LoadState::Ready(_) | LoadState::Failed(_) => {
                    tracing::debug!(state = state.label(), "Gene Ontology already initialized");
                    return None;
                }
                LoadState::NotStarted | LoadState::Disabled => {}
            }
            if !self.config.load_ontology {
                tracing::info!("Loading Gene Ontology is disabled");
                *state = LoadState::Disabled;
                return None;
            }
            *state = LoadState::Loading;
        }
        self.start_load()
    }

    /// Load again regardless of configuration, unless a load is running.
    pub fn force_reload(&self) -> Option<JoinHandle<()>> {
        {
            let mut state = self.state.write();
            if matches!(*state, LoadState::Loading) {
                tracing::warn!("Gene Ontology initialization is already running");
                return None;
            }
            *state = LoadState::Loading;
        }
        self.start_load()
    }

    /// Build the graph on the calling thread.
    pub fn initialize_blocking(&self) -> Result<(), GraphError> {
        {
            let mut state = self.state.write();
            if matches!(*state, LoadState::Loading) {
                tracing::warn!("Gene Ontology initialization is already running");
                return Ok(());
            }
            *state = LoadState::Loading;
        }
        let root = match self.locate_root() {
            Ok(root) => root,
            Err(err) => {
                *self.state.write() = LoadState::Failed(err.to_string());
                return Err(err);
            }
        };
        let result = OntologyGraph::build(self.source.as_ref(), root, self.config.include_part_of);
        match result {
            Ok(graph) => {
                *self.state.write() = LoadState::Ready(Arc::new(graph));
                Ok(())
            }
            Err(err) => {
                *self.state.write() = LoadState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Drop the graph and go back to `NotStarted`. Ignored while loading.
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        if matches!(*state, LoadState::Loading) {
            tracing::warn!("Gene Ontology is loading; shutdown ignored");
            return;
        }
        *state = LoadState::NotStarted;
    }

    /// Precondition: state is `Loading`.
    fn start_load(&self) -> Option<JoinHandle<()>> {
        let root = match self.locate_root() {
            Ok(root) => root,
            Err(err) => {
                tracing::warn!(error = %err, "Gene Ontology root unavailable; using direct lookups");
                *self.state.write() = LoadState::Failed(err.to_string());
                return None;
            }
        };

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let include_part_of = self.config.include_part_of;

        let spawned = std::thread::Builder::new()
            .name(LOADER_THREAD_NAME.to_string())
            .spawn(move || {
                tracing::info!("Loading Gene Ontology...");
                let started = Instant::now();
                match OntologyGraph::build(source.as_ref(), root, include_part_of) {
                    Ok(graph) => {
                        tracing::info!(
                            terms = graph.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Gene Ontology loaded"
                        );
                        *state.write() = LoadState::Ready(Arc::new(graph));
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Gene Ontology load failed");
                        *state.write() = LoadState::Failed(err.to_string());
                    }
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn Gene Ontology loader thread");
                *self.state.write() = LoadState::Failed(format!("failed to spawn loader: {err}"));
                None
            }
        }
    }

    fn locate_root(&self) -> Result<OntologyTerm, GraphError> {
        let accession = &self.config.root_accession;
        self.source
            .find_term(accession)?
            .ok_or_else(|| GraphError::RootNotFound(accession.clone()))
    }

    pub fn state(&self) -> LoadState {
        self.state.read().clone()
    }

    pub fn state_label(&self) -> &'static str {
        self.state.read().label()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), LoadState::Ready(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.read(), LoadState::Loading)
    }

    /// Failure message of the last load, if it failed.
    pub fn failure(&self) -> Option<String> {
        match &*self.state.read() {
            LoadState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    fn graph(&self) -> Option<Arc<OntologyGraph>> {
        match &*self.state.read() {
            LoadState::Ready(graph) => Some(Arc::clone(graph)),
            _ => None,
        }
    }

    /// Graph that can answer a query with the given edge kinds.
    fn graph_for(&self, include_part_of: bool) -> Option<Arc<OntologyGraph>> {
        self.graph()
            .filter(|g| !include_part_of || g.includes_part_of())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Immediate parents. The root is never returned; `None` if the term is
    /// unknown.
    pub fn get_parents(&self, accession: &str) -> Option<Vec<OntologyTerm>> {
        self.get_parents_with(accession, false)
    }

    pub fn get_parents_with(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        if let Some(graph) = self.graph_for(include_part_of) {
            return graph.parents(accession, include_part_of);
        }
        let term = self.lookup(accession)?;
        self.fallback_step(&term.accession, true, include_part_of)
    }

    pub fn get_children(&self, accession: &str) -> Option<Vec<OntologyTerm>> {
        self.get_children_with(accession, false)
    }

    pub fn get_children_with(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        if let Some(graph) = self.graph_for(include_part_of) {
            return graph.children(accession, include_part_of);
        }
        let term = self.lookup(accession)?;
        self.fallback_step(&term.accession, false, include_part_of)
    }

    /// All parents up to (not including) the root; the term itself is not
    /// included.
    pub fn get_all_parents(&self, accession: &str) -> Option<Vec<OntologyTerm>> {
        self.get_all_parents_with(accession, false)
    }

    pub fn get_all_parents_with(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        if let Some(graph) = self.graph_for(include_part_of) {
            return graph.ancestors(accession, include_part_of);
        }
        let term = self.lookup(accession)?;
        self.fallback_closure(&term.accession, true, include_part_of)
    }

    pub fn get_all_children(&self, accession: &str) -> Option<Vec<OntologyTerm>> {
        self.get_all_children_with(accession, false)
    }

    pub fn get_all_children_with(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        if let Some(graph) = self.graph_for(include_part_of) {
            return graph.descendants(accession, include_part_of);
        }
        let term = self.lookup(accession)?;
        self.fallback_closure(&term.accession, false, include_part_of)
    }

    /// Union of the ancestors of each term. Input terms are not added
    /// explicitly, though they may appear as parents of one another.
    pub fn get_all_parents_of_many<'a>(
        &self,
        accessions: impl IntoIterator<Item = &'a str>,
        include_part_of: bool,
    ) -> Vec<OntologyTerm> {
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut out = Vec::new();
        for accession in accessions {
            for term in self
                .get_all_parents_with(accession, include_part_of)
                .unwrap_or_default()
            {
                if seen.insert(term.accession.clone()) {
                    out.push(term);
                }
            }
        }
        out.sort_by(|a, b| a.accession.cmp(&b.accession));
        out
    }

    /// True if `candidate` is in the parent graph of `child`. The root is
    /// treated as a universal ancestor.
    pub fn is_a_parent_of(&self, child: &str, candidate: &str) -> bool {
        if self.is_root(candidate) {
            return true;
        }
        if let Some(graph) = self.graph() {
            return graph.is_ancestor(child, candidate, false).unwrap_or(false);
        }
        let Some(candidate) = self.lookup(candidate) else {
            return false;
        };
        self.get_all_parents(child)
            .map(|parents| parents.iter().any(|p| p.accession == candidate.accession))
            .unwrap_or(false)
    }

    pub fn is_a_child_of(&self, parent: &str, candidate: &str) -> bool {
        self.is_a_parent_of(candidate, parent)
    }

    /// Structural once the graph is ready; before that, compared to the
    /// configured root accession.
    pub fn is_root(&self, accession: &str) -> bool {
        match self.graph() {
            Some(graph) => graph.is_root(accession),
            None => normalize_accession(accession) == self.config.root_accession,
        }
    }

    pub fn get_term(&self, accession: &str) -> Option<OntologyTerm> {
        if let Some(graph) = self.graph() {
            return graph.term(accession).cloned();
        }
        self.lookup(accession)
    }

    /// Human-readable name, e.g. "protein kinase activity".
    pub fn get_term_name(&self, accession: &str) -> String {
        self.get_term(accession)
            .and_then(|t| t.label)
            .unwrap_or_else(|| "[Not available]".to_string())
    }

    pub fn get_term_definition(&self, accession: &str) -> Option<String> {
        self.get_term(accession)?.definition
    }

    pub fn get_term_aspect(&self, accession: &str) -> Option<GoAspect> {
        let term = self.get_term(accession)?;
        if term.aspect.is_none() {
            tracing::warn!(accession = %term.accession, "aspect could not be determined");
        }
        term.aspect
    }

    pub fn is_biological_process(&self, accession: &str) -> bool {
        match self.get_term(accession).and_then(|t| t.aspect) {
            Some(aspect) => aspect == GoAspect::BiologicalProcess,
            None => {
                tracing::debug!(accession, "no namespace, assuming not biological process");
                false
            }
        }
    }

    /// Only answerable once the graph is ready.
    pub fn is_a_valid_go_id(&self, go_id: &str) -> Result<bool, ServiceError> {
        let graph = self.graph().ok_or(ServiceError::NotReady)?;
        Ok(graph.contains(go_id))
    }

    /// Every term in the graph (not the root); empty until ready.
    pub fn list_terms(&self) -> Vec<OntologyTerm> {
        match self.graph() {
            Some(graph) => graph.terms().cloned().collect(),
            None => Vec::new(),
        }
    }

    // ========================================================================
    // Fallback (direct lookups against the backing store)
    // ========================================================================

    fn lookup(&self, accession: &str) -> Option<OntologyTerm> {
        match self.source.find_term(accession) {
            Ok(term) => term,
            Err(err) => {
                tracing::warn!(accession, error = %err, "term lookup failed");
                None
            }
        }
    }

    fn source_step(
        &self,
        accession: &str,
        up: bool,
        include_part_of: bool,
    ) -> Result<Vec<OntologyTerm>, SourceError> {
        let fetch = |kind| {
            if up {
                self.source.parents(accession, kind)
            } else {
                self.source.children(accession, kind)
            }
        };
        let mut out = fetch(EdgeKind::IsA)?;
        if include_part_of {
            out.extend(fetch(EdgeKind::PartOf)?);
        }
        let mut seen = AHashSet::new();
        out.retain(|t| t.accession != self.config.root_accession && seen.insert(t.accession.clone()));
        Ok(out)
    }

    fn fallback_step(&self, accession: &str, up: bool, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        match self.source_step(accession, up, include_part_of) {
            Ok(mut terms) => {
                terms.sort_by(|a, b| a.accession.cmp(&b.accession));
                Some(terms)
            }
            Err(err) => {
                tracing::warn!(accession, error = %err, "direct lookup failed");
                None
            }
        }
    }

    fn fallback_closure(&self, accession: &str, up: bool, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        let mut seen: AHashSet<String> = AHashSet::new();
        seen.insert(accession.to_string());
        let mut out = Vec::new();
        let mut work = vec![accession.to_string()];
        while let Some(current) = work.pop() {
            let step = match self.source_step(&current, up, include_part_of) {
                Ok(step) => step,
                Err(err) => {
                    tracing::warn!(accession = %current, error = %err, "direct lookup failed");
                    return None;
                }
            };
            for term in step {
                if seen.insert(term.accession.clone()) {
                    work.push(term.accession.clone());
                    out.push(term);
                }
            }
        }
        out.sort_by(|a, b| a.accession.cmp(&b.accession));
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TripleSource;

    const SLICE: &str = r#"
<http://purl.obolibrary.org/obo/GO_0008150> <http://www.w3.org/2000/01/rdf-schema#label> "biological_process" .
<http://purl.obolibrary.org/obo/GO_0008150> <http://www.geneontology.org/formats/oboInOwl#hasOBONamespace> "biological_process" .
<http://purl.obolibrary.org/obo/GO_0008152> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0008150> .
<http://purl.obolibrary.org/obo/GO_0008152> <http://www.w3.org/2000/01/rdf-schema#label> "metabolic process" .
<http://purl.obolibrary.org/obo/GO_0008152> <http://www.geneontology.org/formats/oboInOwl#hasOBONamespace> "biological_process" .
<http://purl.obolibrary.org/obo/GO_0006796> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0008152> .
<http://purl.obolibrary.org/obo/GO_0006796> <http://purl.obolibrary.org/obo/IAO_0000115> "The chemical reactions involving phosphates." .
"#;

    fn service(config: OntologyConfig) -> GeneOntologyService {
        let source = TripleSource::parse(SLICE).unwrap();
        GeneOntologyService::new(Arc::new(source), config)
    }

    #[test]
    fn test_state_transitions_blocking() {
        let svc = service(OntologyConfig::default());
        assert_eq!(svc.state().label(), "not_started");
        svc.initialize_blocking().unwrap();
        assert!(svc.is_ready());
        svc.shutdown();
        assert_eq!(svc.state().label(), "not_started");
    }

    #[test]
    fn test_disabled_never_loads() {
        let svc = service(OntologyConfig {
            load_ontology: false,
            ..OntologyConfig::default()
        });
        assert!(svc.initialize().is_none());
        assert_eq!(svc.state().label(), "disabled");
        // Direct lookups still work.
        let parents = svc.get_parents("GO:0006796").unwrap();
        assert_eq!(parents[0].accession, "GO:0008152");
    }

    #[test]
    fn test_missing_root_fails_distinctly() {
        let svc = service(OntologyConfig {
            root_accession: "GO:1234567".to_string(),
            ..OntologyConfig::default()
        });
        assert!(svc.initialize().is_none());
        assert_eq!(svc.state().label(), "failed");
        assert!(svc.failure().unwrap().contains("GO:1234567"));
        assert!(svc.initialize().is_none());
    }

    #[test]
    fn test_term_details() {
        let svc = service(OntologyConfig::default());
        svc.initialize_blocking().unwrap();
        assert_eq!(svc.get_term_name("GO:0008152"), "metabolic process");
        assert_eq!(svc.get_term_name("GO:0000000"), "[Not available]");
        assert!(svc.is_biological_process("GO:0008152"));
        assert!(!svc.is_biological_process("GO:0006796"));
        assert_eq!(
            svc.get_term_definition("GO:0006796").as_deref(),
            Some("The chemical reactions involving phosphates.")
        );
        assert_eq!(svc.get_term_aspect("GO:0008150"), Some(GoAspect::BiologicalProcess));
    }

    #[test]
    fn test_valid_go_id_requires_ready() {
        let svc = service(OntologyConfig::default());
        assert!(matches!(svc.is_a_valid_go_id("GO:0008152"), Err(ServiceError::NotReady)));
        svc.initialize_blocking().unwrap();
        assert!(svc.is_a_valid_go_id("GO:0008152").unwrap());
        assert!(svc.is_a_valid_go_id("GO_0008152").unwrap());
        assert!(!svc.is_a_valid_go_id("GO:0000000").unwrap());
    }

    #[test]
    fn test_list_terms_excludes_root() {
        let svc = service(OntologyConfig::default());
        assert!(svc.list_terms().is_empty());
        svc.initialize_blocking().unwrap();
        let terms = svc.list_terms();
        assert_eq!(terms.len(), 3);
        assert!(terms.iter().all(|t| t.accession != "all"));
    }
}
