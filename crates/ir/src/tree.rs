//! Arena-backed generic syntax tree.
//!
//! Nodes are addressed by [`NodeId`], a stable index into an immutable arena.
//! Each node exclusively owns its children; the tree is acyclic and never
//! mutated after [`TreeBuilder::finish`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::kind::NodeKind;
use crate::location::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} already has a parent")]
    ChildReused(NodeId),
    #[error("node {0} is neither the root nor owned by another node")]
    Orphan(NodeId),
    #[error("tree exceeds the node capacity of the arena")]
    Capacity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    path: String,
    language: String,
    source: String,
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    /// Source text covered by the node.
    pub fn text(&self, id: NodeId) -> &str {
        self.slice(self.span(id))
    }

    pub fn slice(&self, span: Span) -> &str {
        self.source
            .get(span.start.offset..span.end.offset)
            .unwrap_or_default()
    }

    /// Pre-order traversal of the whole tree.
    pub fn preorder(&self) -> Preorder<'_> {
        self.descendants(self.root)
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![id],
        }
    }

    /// Hash of language and source, used as the identity of a target for
    /// memoization.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.language.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.source.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Exports the tree to DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph AST {\n");
        for id in self.preorder() {
            let label = self.kind(id).label().replace('"', "\\\"");
            out.push_str(&format!("    {} [label=\"{}\"];\n", id.0, label));
            for child in self.children(id) {
                out.push_str(&format!("    {} -> {};\n", id.0, child.0));
            }
        }
        out.push('}');
        out
    }

    /// Exports the tree to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Preorder<'t> {
    tree: &'t Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Bottom-up constructor enforcing exclusive child ownership.
#[derive(Debug)]
pub struct TreeBuilder {
    path: String,
    language: String,
    source: String,
    nodes: Vec<Node>,
    adopted: Vec<bool>,
}

impl TreeBuilder {
    pub fn new(path: impl Into<String>, language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            source: source.into(),
            nodes: Vec::new(),
            adopted: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.index()).map(|n| &n.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.nodes.get(id.index()).map(|n| n.span)
    }

    pub fn leaf(&mut self, kind: NodeKind, span: Span) -> Result<NodeId, TreeError> {
        self.push(kind, Vec::new(), span)
    }

    pub fn push(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeId>,
        span: Span,
    ) -> Result<NodeId, TreeError> {
        for child in &children {
            match self.adopted.get(child.index()) {
                None => return Err(TreeError::UnknownNode(*child)),
                Some(true) => return Err(TreeError::ChildReused(*child)),
                Some(false) => {}
            }
        }
        for child in &children {
            self.adopted[child.index()] = true;
        }
        let id = u32::try_from(self.nodes.len()).map_err(|_| TreeError::Capacity)?;
        self.nodes.push(Node {
            kind,
            children,
            span,
        });
        self.adopted.push(false);
        Ok(NodeId(id))
    }

    pub fn finish(self, root: NodeId) -> Result<Tree, TreeError> {
        match self.adopted.get(root.index()) {
            None => return Err(TreeError::UnknownNode(root)),
            Some(true) => return Err(TreeError::ChildReused(root)),
            Some(false) => {}
        }
        if let Some(orphan) = self
            .adopted
            .iter()
            .enumerate()
            .position(|(idx, adopted)| !adopted && idx != root.index())
        {
            return Err(TreeError::Orphan(NodeId(orphan as u32)));
        }
        Ok(Tree {
            path: self.path,
            language: self.language,
            source: self.source,
            nodes: self.nodes,
            root,
        })
    }
}
