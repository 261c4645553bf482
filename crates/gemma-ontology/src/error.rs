//! Error types for the ontology crate.

/// Failures of the slow backing store (or of parsing its input).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse N-Triples: {0}")]
    Parse(String),
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

/// Failures while building the in-memory graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Root term {0} not found in backing store")]
    RootNotFound(String),
    #[error("Cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("Backing store error during build: {0}")]
    Source(#[from] SourceError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Gene Ontology isn't ready")]
    NotReady,
}
