//! Aggregated call tree
//!
//! One node per distinct call-path prefix ever observed, created lazily the
//! first time a sample walks through it and never removed. Nodes live in a
//! vector, so a node's index is also its discovery order; that order is the
//! tie-break wherever equal values have to be ranked.
//!
//! The tree is a plain value. Consumers that need their own node type (a UI
//! tree model, a JSON snapshot) implement [`CallTreeVisitor`] and let
//! [`CallTree::walk`] drive them.

use std::collections::HashMap;

use super::aggregator::{Counters, Weight};
use crate::domain::FunctionId;

/// Index of a node inside its [`CallTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTreeNode {
    pub function: FunctionId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub counters: Counters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
    edges: HashMap<(NodeId, FunctionId), NodeId>,
}

impl Default for CallTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CallTree {
    /// A tree holding only the root (fake function) node
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![CallTreeNode {
                function: FunctionId::FAKE,
                parent: None,
                children: Vec::new(),
                counters: Counters::default(),
            }],
            edges: HashMap::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &CallTreeNode {
        &self.nodes[NodeId::ROOT.0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.nodes.get(id.0)
    }

    /// Total node count, root included
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All nodes in discovery order (root first)
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &CallTreeNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Child of `parent` for `function`, if that path was ever observed
    #[must_use]
    pub fn child(&self, parent: NodeId, function: FunctionId) -> Option<NodeId> {
        self.edges.get(&(parent, function)).copied()
    }

    /// Child of `parent` for `function`, created on first use
    pub fn child_or_insert(&mut self, parent: NodeId, function: FunctionId) -> NodeId {
        if let Some(&child) = self.edges.get(&(parent, function)) {
            return child;
        }
        let child = NodeId(self.nodes.len());
        self.nodes.push(CallTreeNode {
            function,
            parent: Some(parent),
            children: Vec::new(),
            counters: Counters::default(),
        });
        self.nodes[parent.0].children.push(child);
        self.edges.insert((parent, function), child);
        child
    }

    pub(crate) fn add_inclusive(&mut self, id: NodeId, weight: Weight) {
        self.nodes[id.0].counters.add_inclusive(weight);
    }

    pub(crate) fn add_exclusive(&mut self, id: NodeId, weight: Weight) {
        self.nodes[id.0].counters.add_exclusive(weight);
    }

    /// Functions on the path from the root to `id`, root excluded, outermost first
    #[must_use]
    pub fn path(&self, id: NodeId) -> Vec<FunctionId> {
        let mut path = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            let Some(parent) = node.parent else { break };
            path.push(node.function);
            current = self.node(parent);
        }
        path.reverse();
        path
    }

    /// Depth-first, children in discovery order
    pub fn walk<V: CallTreeVisitor>(&self, visitor: &mut V) {
        // Sampled paths can be deeper than our own stack, so no recursion here
        let mut pending: Vec<(NodeId, bool)> = vec![(NodeId::ROOT, false)];
        while let Some((id, leaving)) = pending.pop() {
            let node = &self.nodes[id.0];
            if leaving {
                visitor.leave(id, node);
                continue;
            }
            visitor.enter(id, node);
            pending.push((id, true));
            pending.extend(node.children.iter().rev().map(|&child| (child, false)));
        }
    }
}

/// Callbacks for converting a [`CallTree`] into another representation
pub trait CallTreeVisitor {
    fn enter(&mut self, id: NodeId, node: &CallTreeNode);
    fn leave(&mut self, _id: NodeId, _node: &CallTreeNode) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        events: Vec<String>,
    }

    impl CallTreeVisitor for Recorder {
        fn enter(&mut self, _id: NodeId, node: &CallTreeNode) {
            self.events.push(format!("+{}", node.function.0));
        }

        fn leave(&mut self, _id: NodeId, node: &CallTreeNode) {
            self.events.push(format!("-{}", node.function.0));
        }
    }

    #[test]
    fn test_child_dedup_by_function() {
        let mut tree = CallTree::new();
        let a = tree.child_or_insert(NodeId::ROOT, FunctionId(1));
        let again = tree.child_or_insert(NodeId::ROOT, FunctionId(1));
        let b = tree.child_or_insert(a, FunctionId(1));

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().children, vec![a]);
    }

    #[test]
    fn test_path_excludes_root() {
        let mut tree = CallTree::new();
        let a = tree.child_or_insert(NodeId::ROOT, FunctionId(1));
        let b = tree.child_or_insert(a, FunctionId(2));

        assert_eq!(tree.path(b), vec![FunctionId(1), FunctionId(2)]);
        assert!(tree.path(NodeId::ROOT).is_empty());
    }

    #[test]
    fn test_walk_visits_in_discovery_order() {
        let mut tree = CallTree::new();
        let a = tree.child_or_insert(NodeId::ROOT, FunctionId(1));
        tree.child_or_insert(a, FunctionId(2));
        tree.child_or_insert(a, FunctionId(3));
        tree.child_or_insert(NodeId::ROOT, FunctionId(4));

        let mut recorder = Recorder { events: Vec::new() };
        tree.walk(&mut recorder);

        assert_eq!(
            recorder.events,
            vec!["+0", "+1", "+2", "-2", "+3", "-3", "-1", "+4", "-4", "-0"]
        );
    }
}
