//! Backing store for ontology lookups.
//!
//! [`TermSource`] is the slow, synchronous lookup interface the service falls
//! back to while the in-memory graph is not ready. [`TripleSource`] is an
//! in-memory implementation loaded from an N-Triples dump of GO (shown here
//! with prefixes for brevity):
//!
//! ```text
//! obo:GO_0016791 rdf:type owl:Class .
//! obo:GO_0016791 rdfs:subClassOf obo:GO_0042578 .
//! obo:GO_0016791 rdfs:label "phosphatase activity" .
//! obo:GO_0005654 rdfs:subClassOf _:r1 .
//! _:r1 owl:onProperty obo:BFO_0000050 .
//! _:r1 owl:someValuesFrom obo:GO_0005634 .
//! ```

use ahash::{AHashMap, AHashSet};
use sophia::api::source::TripleSource as _;
use sophia::api::term::{Term, TermKind};
use sophia::api::triple::Triple as _;
use std::io::BufRead;
use std::path::Path;

use crate::error::SourceError;
use crate::term::{normalize_accession, EdgeKind, GoAspect, OntologyTerm, ALL_ROOT};

/// Synchronous lookups keyed by accession.
///
/// Unknown accessions yield `Ok(None)` / empty vectors, not errors.
pub trait TermSource: Send + Sync {
    fn find_term(&self, accession: &str) -> Result<Option<OntologyTerm>, SourceError>;

    /// Immediate children along one kind of edge.
    fn children(&self, accession: &str, kind: EdgeKind) -> Result<Vec<OntologyTerm>, SourceError>;

    /// Immediate parents along one kind of edge.
    fn parents(&self, accession: &str, kind: EdgeKind) -> Result<Vec<OntologyTerm>, SourceError>;

    fn list_terms(&self) -> Result<Vec<OntologyTerm>, SourceError>;
}

#[derive(Debug, Default)]
struct Edges {
    up: AHashMap<String, Vec<String>>,
    down: AHashMap<String, Vec<String>>,
}

impl Edges {
    fn add(&mut self, child: &str, parent: &str) {
        let ups = self.up.entry(child.to_string()).or_default();
        if ups.iter().any(|p| p == parent) {
            return;
        }
        ups.push(parent.to_string());
        self.down
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
    }

    fn parents_of(&self, accession: &str) -> &[String] {
        self.up.get(accession).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn children_of(&self, accession: &str) -> &[String] {
        self.down.get(accession).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// In-memory GO store parsed from triples.
///
/// The designated root `all` is synthesized: its children are the
/// non-obsolete terms without an `is_a` parent (the three aspect roots for
/// a complete GO dump).
#[derive(Debug)]
pub struct TripleSource {
    terms: AHashMap<String, OntologyTerm>,
    alt_ids: AHashMap<String, String>,
    is_a: Edges,
    part_of: Edges,
    root: OntologyTerm,
    top_level: Vec<String>,
}

// ============================================================================
// Parsed statements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Iri(String),
    Blank(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Object {
    Node(Node),
    Literal(String),
}

#[derive(Debug, Clone)]
struct Statement {
    subject: Node,
    /// Compacted, e.g. `rdfs:subClassOf`
    predicate: String,
    object: Object,
}

/// `owl:Restriction` blank node, e.g. `part_of some GO:0005634`.
#[derive(Debug, Default)]
struct Restriction {
    on_property: Option<String>,
    some_values_from: Option<String>,
}

fn node_of<T: Term>(term: T) -> Option<Node> {
    match term.kind() {
        TermKind::Iri => term.iri().map(|iri| Node::Iri(iri.as_str().to_string())),
        TermKind::BlankNode => term.bnode_id().map(|id| Node::Blank(id.as_str().to_string())),
        _ => None,
    }
}

fn object_of<T: Term>(term: T) -> Option<Object> {
    if matches!(term.kind(), TermKind::Literal) {
        return term.lexical_form().map(|lex| Object::Literal(lex.to_string()));
    }
    node_of(term).map(Object::Node)
}

fn read_statements<R: BufRead>(reader: R) -> Result<Vec<Statement>, SourceError> {
    let mut out = Vec::new();
    let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
    parser
        .for_each_triple(|t| {
            let (Some(subject), Some(Node::Iri(predicate)), Some(object)) =
                (node_of(t.s()), node_of(t.p()), object_of(t.o()))
            else {
                return;
            };
            out.push(Statement {
                subject,
                predicate: compact_iri(&predicate),
                object,
            });
        })
        .map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(out)
}

impl TripleSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn parse(content: &str) -> Result<Self, SourceError> {
        Self::from_reader(content.as_bytes())
    }

    /// Read an N-Triples dump of GO.
    ///
    /// `part_of` is taken from direct `obo:BFO_0000050` triples and from
    /// `rdfs:subClassOf` restrictions on that property. Other blank nodes are
    /// ignored, as are subjects typed as something other than `owl:Class`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SourceError> {
        let statements = read_statements(reader)?;

        let mut restrictions: AHashMap<String, Restriction> = AHashMap::new();
        let mut non_classes: AHashSet<String> = AHashSet::new();
        for st in &statements {
            match (&st.subject, st.predicate.as_str(), &st.object) {
                (Node::Blank(id), "owl:onProperty", Object::Node(Node::Iri(prop))) => {
                    restrictions.entry(id.clone()).or_default().on_property = Some(compact_iri(prop));
                }
                (Node::Blank(id), "owl:someValuesFrom", Object::Node(Node::Iri(filler))) => {
                    restrictions.entry(id.clone()).or_default().some_values_from =
                        Some(normalize_accession(filler));
                }
                (Node::Iri(iri), "rdf:type", Object::Node(Node::Iri(ty)))
                    if compact_iri(ty) != "owl:Class" =>
                {
                    non_classes.insert(normalize_accession(iri));
                }
                _ => {}
            }
        }

        let mut terms: AHashMap<String, OntologyTerm> = AHashMap::new();
        let mut alt_ids = AHashMap::new();
        let mut is_a = Edges::default();
        let mut part_of = Edges::default();

        for st in statements {
            let Node::Iri(subject_iri) = &st.subject else {
                continue;
            };
            let subject = normalize_accession(subject_iri);
            if non_classes.contains(&subject) {
                continue;
            }
            let term = terms
                .entry(subject.clone())
                .or_insert_with(|| OntologyTerm::new(subject.clone()));

            match (st.predicate.as_str(), st.object) {
                ("rdfs:subClassOf", Object::Node(Node::Iri(parent))) => {
                    let parent = normalize_accession(&parent);
                    terms
                        .entry(parent.clone())
                        .or_insert_with(|| OntologyTerm::new(parent.clone()));
                    is_a.add(&subject, &parent);
                }
                ("rdfs:subClassOf", Object::Node(Node::Blank(id))) => {
                    let whole = restrictions.get(&id).and_then(|r| {
                        match (r.on_property.as_deref(), &r.some_values_from) {
                            (Some("obo:BFO_0000050"), Some(whole)) => Some(whole.clone()),
                            _ => None,
                        }
                    });
                    if let Some(whole) = whole {
                        terms
                            .entry(whole.clone())
                            .or_insert_with(|| OntologyTerm::new(whole.clone()));
                        part_of.add(&subject, &whole);
                    }
                }
                ("obo:BFO_0000050", Object::Node(Node::Iri(whole))) => {
                    let whole = normalize_accession(&whole);
                    terms
                        .entry(whole.clone())
                        .or_insert_with(|| OntologyTerm::new(whole.clone()));
                    part_of.add(&subject, &whole);
                }
                ("rdfs:label", Object::Literal(label)) => {
                    term.label = Some(label);
                }
                ("oboInOwl:hasOBONamespace" | "oboInOwl:has_obo_namespace", Object::Literal(ns)) => {
                    term.aspect = GoAspect::from_namespace(&ns);
                }
                ("obo:IAO_0000115", Object::Literal(definition)) => {
                    term.definition = Some(definition);
                }
                ("oboInOwl:hasAlternativeId", Object::Literal(alt)) => {
                    let alt = normalize_accession(&alt);
                    if !term.alternative_ids.contains(&alt) {
                        term.alternative_ids.push(alt.clone());
                    }
                    alt_ids.insert(alt, subject.clone());
                }
                ("owl:deprecated", Object::Literal(flag)) => {
                    term.obsolete = flag.eq_ignore_ascii_case("true");
                }
                _ => {
                    // Annotations we don't model
                }
            }
        }

        let mut top_level: Vec<String> = terms
            .values()
            .filter(|t| !t.obsolete && is_a.parents_of(&t.accession).is_empty())
            .map(|t| t.accession.clone())
            .collect();
        top_level.sort();

        tracing::debug!(
            terms = terms.len(),
            restrictions = restrictions.len(),
            "parsed GO triples"
        );
        Ok(Self {
            terms,
            alt_ids,
            is_a,
            part_of,
            root: OntologyTerm::all_root(),
            top_level,
        })
    }

    /// Number of terms, not counting the synthetic root.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn resolve<'a>(&'a self, accession: &'a str) -> &'a str {
        self.alt_ids
            .get(accession)
            .map(|s| s.as_str())
            .unwrap_or(accession)
    }

    fn edges(&self, kind: EdgeKind) -> &Edges {
        match kind {
            EdgeKind::IsA => &self.is_a,
            EdgeKind::PartOf => &self.part_of,
        }
    }

    fn to_terms(&self, accessions: &[String]) -> Vec<OntologyTerm> {
        accessions
            .iter()
            .filter_map(|a| self.terms.get(a).cloned())
            .collect()
    }
}

impl TermSource for TripleSource {
    fn find_term(&self, accession: &str) -> Result<Option<OntologyTerm>, SourceError> {
        let accession = normalize_accession(accession);
        if accession == ALL_ROOT {
            return Ok(Some(self.root.clone()));
        }
        Ok(self.terms.get(self.resolve(&accession)).cloned())
    }

    fn children(&self, accession: &str, kind: EdgeKind) -> Result<Vec<OntologyTerm>, SourceError> {
        let accession = normalize_accession(accession);
        if accession == ALL_ROOT {
            return Ok(match kind {
                EdgeKind::IsA => self.to_terms(&self.top_level),
                EdgeKind::PartOf => Vec::new(),
            });
        }
        let accession = self.resolve(&accession);
        Ok(self.to_terms(self.edges(kind).children_of(accession)))
    }

    fn parents(&self, accession: &str, kind: EdgeKind) -> Result<Vec<OntologyTerm>, SourceError> {
        let accession = normalize_accession(accession);
        let accession = self.resolve(&accession);
        Ok(self.to_terms(self.edges(kind).parents_of(accession)))
    }

    fn list_terms(&self) -> Result<Vec<OntologyTerm>, SourceError> {
        let mut out: Vec<OntologyTerm> = self.terms.values().cloned().collect();
        out.sort_by(|a, b| a.accession.cmp(&b.accession));
        Ok(out)
    }
}

/// Map full vocabulary IRIs onto the prefixed names matched by the parser.
fn compact_iri(iri: &str) -> String {
    const PREFIXES: [(&str, &str); 5] = [
        ("http://www.w3.org/1999/02/22-rdf-syntax-ns#", "rdf:"),
        ("http://www.w3.org/2000/01/rdf-schema#", "rdfs:"),
        ("http://www.w3.org/2002/07/owl#", "owl:"),
        ("http://www.geneontology.org/formats/oboInOwl#", "oboInOwl:"),
        ("http://purl.obolibrary.org/obo/", "obo:"),
    ];
    for (full, short) in PREFIXES {
        if let Some(rest) = iri.strip_prefix(full) {
            return format!("{short}{rest}");
        }
    }
    iri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# tiny GO slice
<http://purl.obolibrary.org/obo/GO_0003674> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .
<http://purl.obolibrary.org/obo/GO_0003674> <http://www.w3.org/2000/01/rdf-schema#label> "molecular_function" .
<http://purl.obolibrary.org/obo/GO_0003674> <http://www.geneontology.org/formats/oboInOwl#hasOBONamespace> "molecular_function"^^<http://www.w3.org/2001/XMLSchema#string> .
<http://purl.obolibrary.org/obo/GO_0003824> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0003674> .
<http://purl.obolibrary.org/obo/GO_0003824> <http://www.w3.org/2000/01/rdf-schema#label> "catalytic activity"@en .
<http://purl.obolibrary.org/obo/GO_0003824> <http://www.geneontology.org/formats/oboInOwl#hasAlternativeId> "GO:0000999" .
<http://purl.obolibrary.org/obo/GO_0005575> <http://www.w3.org/2000/01/rdf-schema#label> "cellular_component" .
<http://purl.obolibrary.org/obo/GO_0005634> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0005575> .
<http://purl.obolibrary.org/obo/GO_0005654> <http://purl.obolibrary.org/obo/BFO_0000050> <http://purl.obolibrary.org/obo/GO_0005634> .
<http://purl.obolibrary.org/obo/GO_0005654> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0005575> .
<http://purl.obolibrary.org/obo/GO_0000001> <http://www.w3.org/2002/07/owl#deprecated> "true"^^<http://www.w3.org/2001/XMLSchema#boolean> .
"#;

    /// GO's own encoding: part_of as a subClassOf restriction, plus the
    /// property declaration and an escaped literal.
    const RESTRICTIONS: &str = r#"
<http://purl.obolibrary.org/obo/BFO_0000050> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#ObjectProperty> .
<http://purl.obolibrary.org/obo/BFO_0000050> <http://www.w3.org/2000/01/rdf-schema#label> "part of" .
<http://purl.obolibrary.org/obo/GO_0005575> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .
<http://purl.obolibrary.org/obo/GO_0005634> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0005575> .
<http://purl.obolibrary.org/obo/GO_0005654> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/GO_0005575> .
<http://purl.obolibrary.org/obo/GO_0005654> <http://www.w3.org/2000/01/rdf-schema#subClassOf> _:b0 .
<http://purl.obolibrary.org/obo/GO_0005654> <http://www.w3.org/2000/01/rdf-schema#label> "nucleoplasm \"inner\" part" .
_:b0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Restriction> .
_:b0 <http://www.w3.org/2002/07/owl#onProperty> <http://purl.obolibrary.org/obo/BFO_0000050> .
_:b0 <http://www.w3.org/2002/07/owl#someValuesFrom> <http://purl.obolibrary.org/obo/GO_0005634> .
<http://purl.obolibrary.org/obo/GO_0005634> <http://www.w3.org/2000/01/rdf-schema#subClassOf> _:b1 .
_:b1 <http://www.w3.org/2002/07/owl#onProperty> <http://purl.obolibrary.org/obo/RO_0002131> .
_:b1 <http://www.w3.org/2002/07/owl#someValuesFrom> <http://purl.obolibrary.org/obo/GO_0005575> .
"#;

    fn accessions(terms: Vec<OntologyTerm>) -> Vec<String> {
        terms.into_iter().map(|t| t.accession).collect()
    }

    #[test]
    fn test_parse_terms_and_edges() {
        let source = TripleSource::parse(SAMPLE).unwrap();
        assert_eq!(source.len(), 6);

        let catalytic = source.find_term("GO:0003824").unwrap().unwrap();
        assert_eq!(catalytic.label.as_deref(), Some("catalytic activity"));

        let parents = source.parents("GO:0003824", EdgeKind::IsA).unwrap();
        assert_eq!(accessions(parents), vec!["GO:0003674"]);

        let mf = source.find_term("GO:0003674").unwrap().unwrap();
        assert_eq!(mf.aspect, Some(GoAspect::MolecularFunction));
        assert!(source.find_term("GO:0000001").unwrap().unwrap().obsolete);
    }

    #[test]
    fn test_synthetic_root_children_skip_obsolete() {
        let source = TripleSource::parse(SAMPLE).unwrap();
        let top = accessions(source.children(ALL_ROOT, EdgeKind::IsA).unwrap());
        assert_eq!(top, vec!["GO:0003674", "GO:0005575"]);
        assert!(source.parents("GO:0003674", EdgeKind::IsA).unwrap().is_empty());
    }

    #[test]
    fn test_part_of_edges_are_separate() {
        let source = TripleSource::parse(SAMPLE).unwrap();
        let wholes = source.parents("GO:0005654", EdgeKind::PartOf).unwrap();
        assert_eq!(accessions(wholes), vec!["GO:0005634"]);
        let parts = source.children("GO:0005634", EdgeKind::PartOf).unwrap();
        assert_eq!(accessions(parts), vec!["GO:0005654"]);
        assert!(source.children("GO:0005634", EdgeKind::IsA).unwrap().is_empty());
    }

    #[test]
    fn test_restriction_becomes_part_of_not_a_term() {
        let source = TripleSource::parse(RESTRICTIONS).unwrap();

        let is_a = accessions(source.parents("GO:0005654", EdgeKind::IsA).unwrap());
        assert_eq!(is_a, vec!["GO:0005575"]);
        let part_of = accessions(source.parents("GO:0005654", EdgeKind::PartOf).unwrap());
        assert_eq!(part_of, vec!["GO:0005634"]);

        // Restrictions on other properties are dropped.
        assert!(source.parents("GO:0005634", EdgeKind::PartOf).unwrap().is_empty());
        assert_eq!(
            accessions(source.parents("GO:0005634", EdgeKind::IsA).unwrap()),
            vec!["GO:0005575"]
        );

        // Neither blank nodes nor the property declaration become terms.
        let all = accessions(source.list_terms().unwrap());
        assert_eq!(all, vec!["GO:0005575", "GO:0005634", "GO:0005654"]);
        let top = accessions(source.children(ALL_ROOT, EdgeKind::IsA).unwrap());
        assert_eq!(top, vec!["GO:0005575"]);
    }

    #[test]
    fn test_escaped_literal_is_unescaped() {
        let source = TripleSource::parse(RESTRICTIONS).unwrap();
        let term = source.find_term("GO:0005654").unwrap().unwrap();
        assert_eq!(term.label.as_deref(), Some("nucleoplasm \"inner\" part"));
    }

    #[test]
    fn test_alternative_id_resolves() {
        let source = TripleSource::parse(SAMPLE).unwrap();
        let term = source.find_term("GO:0000999").unwrap().unwrap();
        assert_eq!(term.accession, "GO:0003824");
    }

    #[test]
    fn test_missing_object_is_parse_error() {
        let err = TripleSource::parse("<http://x.org/a> <http://x.org/b> .\n").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn test_unterminated_line_is_parse_error() {
        let err = TripleSource::parse("\n<http://x.org/a> <http://x.org/b> \"x\" ;\n").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
