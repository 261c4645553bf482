//! In-memory ontology graph.
//!
//! Terms are interned to dense `u32` node ids and adjacency is kept as one
//! `RoaringBitmap` per node and direction, so transitive closures are bitmap
//! worklists. The graph is built once from a [`TermSource`] and is read-only
//! afterwards.

use ahash::AHashMap;
use roaring::RoaringBitmap;

use crate::error::GraphError;
use crate::source::TermSource;
use crate::term::{normalize_accession, EdgeKind, OntologyTerm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    Open,
    Closed,
}

#[derive(Debug)]
pub struct OntologyGraph {
    /// accession (and alternative ids) -> node id
    ids: AHashMap<String, u32>,
    terms: Vec<OntologyTerm>,
    children: Vec<RoaringBitmap>,
    parents: Vec<RoaringBitmap>,
    part_children: Vec<RoaringBitmap>,
    part_parents: Vec<RoaringBitmap>,
    root: u32,
    includes_part_of: bool,
}

impl OntologyGraph {
    /// Build the graph reachable from `root` by descending through children.
    ///
    /// Every node is expanded once. A back edge during the descent is
    /// reported as [`GraphError::Cycle`] with the offending path.
    pub fn build(
        source: &dyn TermSource,
        root: OntologyTerm,
        include_part_of: bool,
    ) -> Result<Self, GraphError> {
        let mut graph = Self {
            ids: AHashMap::new(),
            terms: Vec::new(),
            children: Vec::new(),
            parents: Vec::new(),
            part_children: Vec::new(),
            part_parents: Vec::new(),
            root: 0,
            includes_part_of: include_part_of,
        };
        let root_id = graph.intern(root);
        graph.root = root_id;

        let mut visits: Vec<Visit> = vec![Visit::Open];
        let first = graph.expand(source, root_id)?;
        let mut stack: Vec<(u32, std::vec::IntoIter<u32>)> = vec![(root_id, first.into_iter())];

        loop {
            let Some(top) = stack.last_mut() else {
                break;
            };
            let node = top.0;
            let Some(child) = top.1.next() else {
                visits[node as usize] = Visit::Closed;
                stack.pop();
                continue;
            };

            if visits.len() < graph.terms.len() {
                visits.resize(graph.terms.len(), Visit::Unseen);
            }
            match visits[child as usize] {
                Visit::Closed => {}
                Visit::Open => {
                    let start = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|(n, _)| graph.terms[*n as usize].accession.clone())
                        .collect();
                    path.push(graph.terms[child as usize].accession.clone());
                    return Err(GraphError::Cycle { path });
                }
                Visit::Unseen => {
                    visits[child as usize] = Visit::Open;
                    let next = graph.expand(source, child)?;
                    stack.push((child, next.into_iter()));
                }
            }
        }

        Ok(graph)
    }

    /// Fetch a node's children from the source, record the edges and return
    /// the child ids to descend into.
    fn expand(&mut self, source: &dyn TermSource, node: u32) -> Result<Vec<u32>, GraphError> {
        let accession = self.terms[node as usize].accession.clone();
        let mut out = Vec::new();

        for child in source.children(&accession, EdgeKind::IsA)? {
            let id = self.intern(child);
            self.children[node as usize].insert(id);
            self.parents[id as usize].insert(node);
            out.push(id);
        }

        if self.includes_part_of {
            for part in source.children(&accession, EdgeKind::PartOf)? {
                let id = self.intern(part);
                self.part_children[node as usize].insert(id);
                self.part_parents[id as usize].insert(node);
                out.push(id);
            }
        }

        Ok(out)
    }

    fn intern(&mut self, term: OntologyTerm) -> u32 {
        if let Some(&id) = self.ids.get(&term.accession) {
            return id;
        }
        let id = self.terms.len() as u32;
        self.ids.insert(term.accession.clone(), id);
        for alt in &term.alternative_ids {
            self.ids.entry(alt.clone()).or_insert(id);
        }
        self.terms.push(term);
        self.children.push(RoaringBitmap::new());
        self.parents.push(RoaringBitmap::new());
        self.part_children.push(RoaringBitmap::new());
        self.part_parents.push(RoaringBitmap::new());
        id
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn includes_part_of(&self) -> bool {
        self.includes_part_of
    }

    pub fn root(&self) -> &OntologyTerm {
        &self.terms[self.root as usize]
    }

    pub fn node_id(&self, accession: &str) -> Option<u32> {
        self.ids.get(&normalize_accession(accession)).copied()
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.node_id(accession).is_some()
    }

    pub fn term(&self, accession: &str) -> Option<&OntologyTerm> {
        self.node_id(accession).map(|id| &self.terms[id as usize])
    }

    /// All terms except the root.
    pub fn terms(&self) -> impl Iterator<Item = &OntologyTerm> + '_ {
        let root = self.root as usize;
        self.terms
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != root)
            .map(|(_, t)| t)
    }

    /// Structural root check: the node the build started from.
    pub fn is_root(&self, accession: &str) -> bool {
        self.node_id(accession) == Some(self.root)
    }

    fn edges(&self, node: u32, up: bool, include_part_of: bool) -> RoaringBitmap {
        let idx = node as usize;
        let mut out = if up {
            self.parents[idx].clone()
        } else {
            self.children[idx].clone()
        };
        if include_part_of {
            if up {
                out |= &self.part_parents[idx];
            } else {
                out |= &self.part_children[idx];
            }
        }
        out
    }

    fn closure(&self, start: u32, up: bool, include_part_of: bool) -> RoaringBitmap {
        let mut seen = RoaringBitmap::new();
        let mut work = vec![start];
        while let Some(node) = work.pop() {
            for next in self.edges(node, up, include_part_of).iter() {
                if seen.insert(next) {
                    work.push(next);
                }
            }
        }
        seen.remove(start);
        seen.remove(self.root);
        seen
    }

    fn collect(&self, ids: &RoaringBitmap) -> Vec<OntologyTerm> {
        let mut out: Vec<OntologyTerm> = ids
            .iter()
            .map(|id| self.terms[id as usize].clone())
            .collect();
        out.sort_by(|a, b| a.accession.cmp(&b.accession));
        out
    }

    /// Immediate parents; the root is never returned.
    pub fn parents(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        let id = self.node_id(accession)?;
        let mut ids = self.edges(id, true, include_part_of);
        ids.remove(self.root);
        Some(self.collect(&ids))
    }

    pub fn children(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        let id = self.node_id(accession)?;
        Some(self.collect(&self.edges(id, false, include_part_of)))
    }

    /// All ancestors, excluding the term itself and the root.
    pub fn ancestors(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        let id = self.node_id(accession)?;
        Some(self.collect(&self.closure(id, true, include_part_of)))
    }

    /// All descendants, excluding the term itself.
    pub fn descendants(&self, accession: &str, include_part_of: bool) -> Option<Vec<OntologyTerm>> {
        let id = self.node_id(accession)?;
        Some(self.collect(&self.closure(id, false, include_part_of)))
    }

    /// `Some(true)` if `candidate` is a (transitive) ancestor of `child`.
    /// The root counts as everyone's ancestor.
    pub fn is_ancestor(&self, child: &str, candidate: &str, include_part_of: bool) -> Option<bool> {
        let candidate = self.node_id(candidate)?;
        if candidate == self.root {
            return Some(true);
        }
        let child = self.node_id(child)?;
        Some(self.closure(child, true, include_part_of).contains(candidate))
    }
}
