//! Parent and ancestor lookups built once per tree, so the tree itself
//! carries no back references.

use crate::kind::NodeKind;
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone)]
pub struct AncestorIndex {
    parent: Vec<Option<NodeId>>,
    depth: Vec<u32>,
}

impl AncestorIndex {
    pub fn build(tree: &Tree) -> Self {
        let mut parent = vec![None; tree.len()];
        let mut depth = vec![0u32; tree.len()];
        for id in tree.preorder() {
            let d = depth[id.index()];
            for child in tree.children(id) {
                parent[child.index()] = Some(id);
                depth[child.index()] = d + 1;
            }
        }
        Self { parent, depth }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id.index()).copied().flatten()
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.depth.get(id.index()).copied().unwrap_or(0) as usize
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            current: self.parent(id),
        }
    }

    /// Whether `ancestor` is `node` or lies on its path to the root.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        if ancestor == node {
            return true;
        }
        let target_depth = self.depth(ancestor);
        if self.depth(node) <= target_depth {
            return false;
        }
        self.ancestors(node)
            .take_while(|a| self.depth(*a) >= target_depth)
            .any(|a| a == ancestor)
    }

    /// Nearest strict ancestor whose kind satisfies `pred`.
    pub fn enclosing<F>(&self, tree: &Tree, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
    {
        self.ancestors(id).find(|a| pred(tree.kind(*a)))
    }
}

pub struct Ancestors<'i> {
    index: &'i AncestorIndex,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.index.parent(id);
        Some(id)
    }
}
