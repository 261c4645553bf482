//! Gene Ontology term model and GO identifier helpers.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Prefix of OBO PURLs, e.g. `http://purl.obolibrary.org/obo/GO_0001312`.
pub const BASE_GO_URI: &str = "http://purl.obolibrary.org/obo/";

/// Accession of the synthetic root that sits above the three GO aspects.
pub const ALL_ROOT: &str = "all";

/// The three GO namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoAspect {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl GoAspect {
    /// Parse an OBO namespace value (`biological_process`, ...).
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace.trim().to_ascii_lowercase().as_str() {
            "biological_process" => Some(Self::BiologicalProcess),
            "molecular_function" => Some(Self::MolecularFunction),
            "cellular_component" => Some(Self::CellularComponent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BiologicalProcess => "biological_process",
            Self::MolecularFunction => "molecular_function",
            Self::CellularComponent => "cellular_component",
        }
    }
}

/// Relationship kinds carried by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    IsA,
    PartOf,
}

/// A GO term. Identity is the accession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub accession: String,
    pub label: Option<String>,
    pub aspect: Option<GoAspect>,
    pub definition: Option<String>,
    #[serde(default)]
    pub alternative_ids: Vec<String>,
    #[serde(default)]
    pub obsolete: bool,
}

impl OntologyTerm {
    pub fn new(accession: impl Into<String>) -> Self {
        Self {
            accession: accession.into(),
            label: None,
            aspect: None,
            definition: None,
            alternative_ids: Vec::new(),
            obsolete: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_aspect(mut self, aspect: GoAspect) -> Self {
        self.aspect = Some(aspect);
        self
    }

    /// The synthetic root term.
    pub fn all_root() -> Self {
        Self::new(ALL_ROOT).with_label(ALL_ROOT)
    }

    /// Full OBO URI for this term.
    pub fn uri(&self) -> String {
        to_uri(&self.accession)
    }
}

impl PartialEq for OntologyTerm {
    fn eq(&self, other: &Self) -> bool {
        self.accession == other.accession
    }
}

impl Eq for OntologyTerm {}

impl Hash for OntologyTerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.accession.hash(state);
    }
}

/// Turn an id like `GO:0038128` into a URI.
pub fn to_uri(go_id: &str) -> String {
    format!("{BASE_GO_URI}{}", go_id.replace(':', "_"))
}

/// Usual formatted GO id from a URI, e.g. `.../GO_0039392` -> `GO:0039392`.
pub fn as_regular_go_id(uri: &str) -> String {
    local_name(uri).replacen('_', ":", 1)
}

/// Normalize any accepted spelling of a term reference to its accession.
///
/// Accepts full URIs (`<...>` optional), `obo:GO_nnnnnnn`, `GO_nnnnnnn` and
/// `GO:nnnnnnn`. Anything that does not look like a GO id (e.g. `all`) is
/// returned trimmed but otherwise unchanged.
pub fn normalize_accession(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('<').trim_end_matches('>');
    let s = local_name(s);
    let s = s.strip_prefix("obo:").unwrap_or(s);
    if let Some(rest) = s.strip_prefix("GO_") {
        return format!("GO:{rest}");
    }
    s.to_string()
}

/// `GO:` or `GO_` followed by exactly seven digits.
pub fn is_valid_go_id(s: &str) -> bool {
    let Some(digits) = s.strip_prefix("GO:").or_else(|| s.strip_prefix("GO_")) else {
        return false;
    };
    digits.len() == 7 && digits.bytes().all(|b| b.is_ascii_digit())
}

fn local_name(iri: &str) -> &str {
    iri.rsplit(&['/', '#'][..]).next().unwrap_or(iri)
}
