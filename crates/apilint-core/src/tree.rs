//! Arena-backed node tree for parsed API description documents.
//!
//! The tree is produced once by the parser adapter in [`crate::document`]
//! and is read-only afterwards. Nodes are addressed by [`NodeId`]; ids are
//! handed out in the order nodes are added, which for parsed documents is
//! document (pre-order) order.

use serde::{Deserialize, Serialize};

/// Index of a node inside a [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the arena slot of this id.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A 1-indexed line/column position in the source text.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Start and end positions of a node in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Where the node starts.
    pub start: Position,
    /// Where the node ends (equal to `start` when unknown).
    pub end: Position,
}

impl Span {
    /// Creates a span from two positions.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Creates a zero-width span at a single position.
    #[must_use]
    pub fn at(line: usize, column: usize) -> Self {
        let pos = Position::new(line, column);
        Self { start: pos, end: pos }
    }
}

/// The inferred type of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Plain or quoted text.
    String,
    /// An integer literal.
    Integer,
    /// A floating point literal.
    Float,
    /// `true` or `false`.
    Bool,
    /// `null`, `~` or an empty value.
    Null,
}

impl ScalarKind {
    /// Infers the kind of a scalar from its text using YAML core-schema rules.
    #[must_use]
    pub fn infer(text: &str) -> Self {
        match text {
            "" | "~" | "null" | "Null" | "NULL" => return Self::Null,
            "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => return Self::Bool,
            _ => {}
        }
        if !text.bytes().any(|b| b.is_ascii_digit()) {
            return Self::String;
        }
        if text.parse::<i64>().is_ok() {
            Self::Integer
        } else if text.parse::<f64>().is_ok() {
            Self::Float
        } else {
            Self::String
        }
    }
}

/// A scalar value with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    /// The scalar text as it appears after YAML unquoting.
    pub value: String,
    /// Inferred type.
    pub kind: ScalarKind,
}

/// The payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf value.
    Scalar(Scalar),
    /// Ordered key/value pairs. Keys are scalar nodes.
    Mapping(Vec<(NodeId, NodeId)>),
    /// Ordered elements.
    Sequence(Vec<NodeId>),
}

/// A single node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node payload.
    pub kind: NodeKind,
    /// Source location.
    pub span: Span,
}

impl Node {
    /// Returns the scalar text, if this is a scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(&s.value),
            _ => None,
        }
    }

    /// Returns the scalar, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for mapping nodes.
    #[must_use]
    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    /// Returns `true` for sequence nodes.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence(_))
    }
}

/// Arena of nodes with a designated root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl NodeTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node { kind, span });
        id
    }

    /// Adds a scalar node, inferring its kind from the text.
    pub fn add_scalar(&mut self, value: impl Into<String>, span: Span) -> NodeId {
        let value = value.into();
        let kind = ScalarKind::infer(&value);
        self.push(NodeKind::Scalar(Scalar { value, kind }), span)
    }

    /// Adds a scalar node that is always a string, such as a quoted YAML
    /// scalar.
    pub fn add_string(&mut self, value: impl Into<String>, span: Span) -> NodeId {
        let value = value.into();
        self.push(
            NodeKind::Scalar(Scalar {
                value,
                kind: ScalarKind::String,
            }),
            span,
        )
    }

    /// Adds an empty mapping node.
    pub fn add_mapping(&mut self, span: Span) -> NodeId {
        self.push(NodeKind::Mapping(Vec::new()), span)
    }

    /// Adds an empty sequence node.
    pub fn add_sequence(&mut self, span: Span) -> NodeId {
        self.push(NodeKind::Sequence(Vec::new()), span)
    }

    /// Appends a key/value entry to a mapping node. Ignored for other kinds.
    pub fn push_entry(&mut self, mapping: NodeId, key: NodeId, value: NodeId) {
        if let Some(Node {
            kind: NodeKind::Mapping(entries),
            ..
        }) = self.nodes.get_mut(mapping.index())
        {
            entries.push((key, value));
        }
    }

    /// Appends an element to a sequence node. Ignored for other kinds.
    pub fn push_item(&mut self, sequence: NodeId, item: NodeId) {
        if let Some(Node {
            kind: NodeKind::Sequence(items),
            ..
        }) = self.nodes.get_mut(sequence.index())
        {
            items.push(item);
        }
    }

    /// Designates the root node.
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Returns the root node, or `None` for an empty document.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node by id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Returns the scalar text of a node.
    #[must_use]
    pub fn scalar_str(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(Node::as_str)
    }

    /// Returns the entries of a mapping node (empty for other kinds).
    #[must_use]
    pub fn entries(&self, id: NodeId) -> &[(NodeId, NodeId)] {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Mapping(entries)) => entries,
            _ => &[],
        }
    }

    /// Returns the elements of a sequence node (empty for other kinds).
    #[must_use]
    pub fn items(&self, id: NodeId) -> &[NodeId] {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Sequence(items)) => items,
            _ => &[],
        }
    }

    /// Looks up the value stored under `key` in a mapping node.
    #[must_use]
    pub fn mapping_get(&self, mapping: NodeId, key: &str) -> Option<NodeId> {
        self.entries(mapping)
            .iter()
            .find(|(k, _)| self.scalar_str(*k) == Some(key))
            .map(|(_, v)| *v)
    }

    /// Returns the direct child values of a node: mapping values or
    /// sequence elements, in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Mapping(entries)) => entries.iter().map(|(_, v)| *v).collect(),
            Some(NodeKind::Sequence(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns the scalar texts of a sequence node's scalar elements.
    #[must_use]
    pub fn string_items(&self, sequence: NodeId) -> Vec<&str> {
        self.items(sequence)
            .iter()
            .filter_map(|id| self.scalar_str(*id))
            .collect()
    }
}
