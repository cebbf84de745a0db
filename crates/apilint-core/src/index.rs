//! The Document Index: a resolved, queryable view of a node tree.
//!
//! Built exactly once per document version by [`DocumentIndex::build`] and
//! immutable afterwards, so it can be shared between evaluation workers
//! without locking.
//!
//! ```text
//! NodeTree
//!   ↓ pre-order walk        (paths, ranks, subtree ranges, $ref sites)
//!   ↓ pointer resolution    (path map lookups)
//!   ↓ reference-graph walk  (circular reference marking)
//! DocumentIndex
//! ```

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::tree::{NodeId, NodeKind, NodeTree, Span};

/// Path of the document root.
pub const ROOT_PATH: &str = "#";

/// Key that marks a mapping as a reference.
pub const REF_KEY: &str = "$ref";

/// Errors that prevent an index from being built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The tree has no root node.
    #[error("cannot index an empty document")]
    EmptyDocument,
}

/// Non-fatal findings recorded while building the index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexDiagnostic {
    /// A local pointer whose target does not exist.
    #[error("reference '{pointer}' at '{path}' cannot be resolved")]
    UnresolvedReference {
        /// Path of the mapping holding the `$ref`.
        path: String,
        /// The pointer text.
        pointer: String,
    },

    /// A pointer into another document. Not followed.
    #[error("reference '{pointer}' at '{path}' points to an external document")]
    ExternalReference {
        /// Path of the mapping holding the `$ref`.
        path: String,
        /// The pointer text.
        pointer: String,
    },

    /// A reference whose resolution revisits a target already being resolved.
    #[error("reference '{pointer}' at '{path}' is circular")]
    CircularReference {
        /// Path of the mapping holding the `$ref`.
        path: String,
        /// The pointer text.
        pointer: String,
    },
}

impl IndexDiagnostic {
    /// Returns the path of the reference this diagnostic is about.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::UnresolvedReference { path, .. }
            | Self::ExternalReference { path, .. }
            | Self::CircularReference { path, .. } => path,
        }
    }
}

/// Whether a pointer targets this document or another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `#/...` pointer into this document.
    Local,
    /// Pointer with a non-empty document part.
    External,
}

/// A `$ref` occurrence in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The mapping node that holds the `$ref` key.
    pub location: NodeId,
    /// Path of `location`.
    pub path: String,
    /// The pointer text.
    pub pointer: String,
    /// Local or external.
    pub kind: ReferenceKind,
    /// Resolved target, if any.
    pub target: Option<NodeId>,
    /// Whether following this reference closes a cycle.
    pub circular: bool,
}

const UNREACHED: usize = usize::MAX;

/// Resolved, immutable lookup tables over a [`NodeTree`].
#[derive(Debug)]
pub struct DocumentIndex {
    tree: Arc<NodeTree>,
    root: NodeId,
    paths: IndexMap<String, NodeId>,
    node_paths: Vec<Option<String>>,
    ranks: Vec<usize>,
    subtree_end: Vec<usize>,
    references: Vec<Reference>,
    ref_targets: IndexMap<String, NodeId>,
    circular: IndexSet<String>,
    diagnostics: Vec<IndexDiagnostic>,
}

impl DocumentIndex {
    /// Builds the index for a tree.
    ///
    /// Malformed references never fail the build; they are recorded as
    /// [`IndexDiagnostic`]s.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyDocument`] if the tree has no root.
    pub fn build(tree: Arc<NodeTree>) -> Result<Self, IndexError> {
        let root = tree.root().ok_or(IndexError::EmptyDocument)?;

        let mut walker = Walker::new(&tree);
        walker.visit(root, ROOT_PATH.to_string());
        let Walker {
            paths,
            node_paths,
            ranks,
            subtree_end,
            sites,
            ..
        } = walker;

        let mut index = Self {
            root,
            paths,
            node_paths,
            ranks,
            subtree_end,
            references: Vec::with_capacity(sites.len()),
            ref_targets: IndexMap::new(),
            circular: IndexSet::new(),
            diagnostics: Vec::new(),
            tree,
        };

        index.resolve_sites(sites);
        index.mark_circular();

        debug!(
            "Indexed {} paths, {} references ({} circular, {} diagnostics)",
            index.paths.len(),
            index.references.len(),
            index.circular.len(),
            index.diagnostics.len()
        );

        Ok(index)
    }

    fn resolve_sites(&mut self, sites: Vec<RefSite>) {
        for site in sites {
            let (kind, target) = match split_pointer(&site.pointer) {
                Some(fragment) => (ReferenceKind::Local, self.paths.get(fragment).copied()),
                None => (ReferenceKind::External, None),
            };

            match (kind, target) {
                (ReferenceKind::Local, Some(node)) => {
                    self.ref_targets.insert(site.pointer.clone(), node);
                }
                (ReferenceKind::Local, None) => {
                    warn!("Unresolved reference {} at {}", site.pointer, site.path);
                    self.diagnostics.push(IndexDiagnostic::UnresolvedReference {
                        path: site.path.clone(),
                        pointer: site.pointer.clone(),
                    });
                }
                (ReferenceKind::External, _) => {
                    self.diagnostics.push(IndexDiagnostic::ExternalReference {
                        path: site.path.clone(),
                        pointer: site.pointer.clone(),
                    });
                }
            }

            self.references.push(Reference {
                location: site.location,
                path: site.path,
                pointer: site.pointer,
                kind,
                target,
                circular: false,
            });
        }
    }

    /// Walks the reference graph depth-first. Following a reference pushes its
    /// target on the resolution stack; references inside that target are
    /// followed lazily. Reaching a target that is still on the stack marks the
    /// reference circular and stops there.
    fn mark_circular(&mut self) {
        let mut marks = vec![Mark::Unvisited; self.tree.len()];
        let mut circular = vec![false; self.references.len()];

        for i in 0..self.references.len() {
            if let Some(target) = self.references[i].target {
                if marks[target.index()] == Mark::Unvisited {
                    self.explore(target, &mut marks, &mut circular);
                }
            }
        }

        for (reference, is_circular) in self.references.iter_mut().zip(circular) {
            if is_circular {
                reference.circular = true;
                self.circular.insert(reference.path.clone());
                self.diagnostics.push(IndexDiagnostic::CircularReference {
                    path: reference.path.clone(),
                    pointer: reference.pointer.clone(),
                });
            }
        }
    }

    fn explore(&self, target: NodeId, marks: &mut [Mark], circular: &mut [bool]) {
        marks[target.index()] = Mark::OnStack;

        for i in self.references_within(target) {
            let Some(next) = self.references[i].target else {
                continue;
            };
            match marks[next.index()] {
                Mark::OnStack => circular[i] = true,
                Mark::Done => {}
                Mark::Unvisited => self.explore(next, marks, circular),
            }
        }

        marks[target.index()] = Mark::Done;
    }

    /// Positions in `self.references` of the references located inside the
    /// subtree rooted at `node`. References are stored in pre-order, so the
    /// result is a contiguous range.
    fn references_within(&self, node: NodeId) -> std::ops::Range<usize> {
        let start = self.ranks[node.index()];
        let end = self.subtree_end[node.index()];
        if start == UNREACHED {
            return 0..0;
        }
        let from = self
            .references
            .partition_point(|r| self.ranks[r.location.index()] < start);
        let to = self
            .references
            .partition_point(|r| self.ranks[r.location.index()] <= end);
        from..to
    }

    /// Returns the indexed tree.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Returns a shared handle to the indexed tree.
    #[must_use]
    pub fn shared_tree(&self) -> Arc<NodeTree> {
        Arc::clone(&self.tree)
    }

    /// Returns the document root.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Looks up a node by its path (e.g. `#/paths/~1pets/get`).
    #[must_use]
    pub fn node_at(&self, path: &str) -> Option<NodeId> {
        self.paths.get(path).copied()
    }

    /// Returns the path of a node. Mapping keys share their value's path.
    #[must_use]
    pub fn path_of(&self, node: NodeId) -> Option<&str> {
        self.node_paths.get(node.index()).and_then(Option::as_deref)
    }

    /// Returns the source span of a node.
    #[must_use]
    pub fn span_of(&self, node: NodeId) -> Option<Span> {
        self.tree.get(node).map(|n| n.span)
    }

    /// Returns the document-order rank of a node (`None` if unreachable from
    /// the root).
    #[must_use]
    pub fn rank_of(&self, node: NodeId) -> Option<usize> {
        self.ranks
            .get(node.index())
            .copied()
            .filter(|&r| r != UNREACHED)
    }

    /// Returns all paths in document order.
    pub fn paths(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.paths.iter().map(|(p, n)| (p.as_str(), *n))
    }

    /// Returns all `$ref` occurrences in document order.
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Resolves a local pointer to its target node.
    #[must_use]
    pub fn resolve(&self, pointer: &str) -> Option<NodeId> {
        self.ref_targets
            .get(pointer)
            .copied()
            .or_else(|| split_pointer(pointer).and_then(|f| self.node_at(f)))
    }

    /// Returns the map of resolved pointers to targets.
    #[must_use]
    pub fn resolved_references(&self) -> &IndexMap<String, NodeId> {
        &self.ref_targets
    }

    /// Returns `true` if the reference at `path` is circular.
    #[must_use]
    pub fn is_circular(&self, path: &str) -> bool {
        self.circular.contains(path)
    }

    /// Returns the paths of all circular references.
    #[must_use]
    pub fn circular_references(&self) -> &IndexSet<String> {
        &self.circular
    }

    /// Returns the diagnostics recorded while building.
    #[must_use]
    pub fn diagnostics(&self) -> &[IndexDiagnostic] {
        &self.diagnostics
    }

    /// Follows a mapping's `$ref` (once) when present, otherwise returns the node.
    #[must_use]
    pub fn dereference(&self, node: NodeId) -> Option<NodeId> {
        match self.tree.mapping_get(node, REF_KEY) {
            Some(pointer) => self
                .tree
                .scalar_str(pointer)
                .and_then(|p| self.resolve(p)),
            None => Some(node),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

struct RefSite {
    location: NodeId,
    path: String,
    pointer: String,
}

struct Walker<'a> {
    tree: &'a NodeTree,
    paths: IndexMap<String, NodeId>,
    node_paths: Vec<Option<String>>,
    ranks: Vec<usize>,
    subtree_end: Vec<usize>,
    sites: Vec<RefSite>,
    next_rank: usize,
}

impl<'a> Walker<'a> {
    fn new(tree: &'a NodeTree) -> Self {
        Self {
            tree,
            paths: IndexMap::with_capacity(tree.len()),
            node_paths: vec![None; tree.len()],
            ranks: vec![UNREACHED; tree.len()],
            subtree_end: vec![UNREACHED; tree.len()],
            sites: Vec::new(),
            next_rank: 0,
        }
    }

    fn visit(&mut self, id: NodeId, path: String) {
        let tree = self.tree;
        if self.ranks[id.index()] != UNREACHED {
            // shared node (only possible for hand-built trees); index it once
            return;
        }
        let rank = self.next_rank;
        self.next_rank += 1;
        self.ranks[id.index()] = rank;
        self.node_paths[id.index()] = Some(path.clone());
        self.paths.insert(path.clone(), id);

        match tree.get(id).map(|n| &n.kind) {
            Some(NodeKind::Mapping(entries)) => {
                for &(key, value) in entries {
                    let Some(key_text) = tree.scalar_str(key) else {
                        continue;
                    };
                    if key_text == REF_KEY {
                        if let Some(pointer) = tree.scalar_str(value) {
                            self.sites.push(RefSite {
                                location: id,
                                path: path.clone(),
                                pointer: pointer.to_string(),
                            });
                        }
                    }
                    let child_path = format!("{path}/{}", escape_segment(key_text));
                    self.node_paths[key.index()] = Some(child_path.clone());
                    self.ranks[key.index()] = self.next_rank;
                    self.visit(value, child_path);
                }
            }
            Some(NodeKind::Sequence(items)) => {
                for (i, &item) in items.iter().enumerate() {
                    self.visit(item, format!("{path}/{i}"));
                }
            }
            _ => {}
        }

        self.subtree_end[id.index()] = self.next_rank - 1;
    }
}

/// Escapes a mapping key for use as a JSON-pointer segment.
#[must_use]
pub fn escape_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Unescapes a JSON-pointer segment.
#[must_use]
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Returns the local fragment (`#...`) of a pointer, or `None` if the pointer
/// names another document.
fn split_pointer(pointer: &str) -> Option<&str> {
    match pointer.find('#') {
        Some(0) => Some(pointer.trim_end_matches('/')).filter(|p| !p.is_empty()),
        _ => None,
    }
}
