//! Gemma Gene Ontology
//!
//! Loads the Gene Ontology into memory in the background and answers
//! hierarchy queries. Until the graph is ready, every query is answered by
//! walking the slow backing store instead:
//!
//! ```text
//! ┌──────────────┐  initialize()   ┌──────────────────┐
//! │ TermSource   │────────────────►│ gemma_go_loader  │
//! │ (slow store) │                 │ thread           │
//! └──────┬───────┘                 └────────┬─────────┘
//!        │ fallback                         │ Ready(graph)
//!        ▼                                  ▼
//! ┌─────────────────────────────────────────────────────┐
//! │            GeneOntologyService (LoadState)          │
//! └─────────────────────────┬───────────────────────────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │ GoAnnotationService │──► GoTermCache
//!                └─────────────────────┘
//! ```
//!
//! ## Key Features
//!
//! - **Explicit load state**: `NotStarted`, `Disabled`, `Loading`, `Ready`, `Failed`
//! - **Cycle-safe build**: iterative traversal, cycles reported with their path
//! - **Bitmap closures**: ancestors/descendants over `RoaringBitmap` adjacency
//! - **Bounded caches**: per-gene GO terms with capacity and TTL

pub mod annotations;
pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod service;
pub mod source;
pub mod term;

pub use annotations::{compute_overlap, GeneAnnotationSource, GoAnnotationService};
pub use cache::GoTermCache;
pub use config::{CacheConfig, OntologyConfig};
pub use error::{ConfigError, GraphError, ServiceError, SourceError};
pub use graph::OntologyGraph;
pub use service::{GeneOntologyService, LoadState};
pub use source::{TermSource, TripleSource};
pub use term::{EdgeKind, GoAspect, OntologyTerm};

/// Load a triple file and wrap it in a service, with environment overrides
/// applied to the configuration.
pub fn service_from_path(
    path: impl AsRef<std::path::Path>,
    config: OntologyConfig,
) -> anyhow::Result<GeneOntologyService> {
    let path = path.as_ref();
    let source = TripleSource::from_path(path)
        .map_err(|e| anyhow::anyhow!("failed to load ontology from {}: {e}", path.display()))?;
    tracing::info!(terms = source.len(), path = %path.display(), "ontology source loaded");
    Ok(GeneOntologyService::new(
        std::sync::Arc::new(source),
        config.with_env_overrides(),
    ))
}
