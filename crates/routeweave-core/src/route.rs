//! Route definitions, node paths, and the block stack used as an explicit
//! insertion-point context for incremental route construction.

use std::fmt;

use routeweave_types::{Result, WeaveError};
use serde::{Deserialize, Serialize};

use crate::node::{resolve, resolve_mut, ProcessingNode};

// ---------------------------------------------------------------------------
// NodePath
// ---------------------------------------------------------------------------

/// Location of a node inside a route.
///
/// The first index selects a top-level output of the route; every further
/// index selects an output of the node selected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `other` appended below this one.
    pub fn join(&self, other: &NodePath) -> NodePath {
        let mut indices = self.0.clone();
        indices.extend_from_slice(&other.0);
        NodePath(indices)
    }

    /// A new path pointing at the `index`-th output of the node at this path.
    pub fn child(&self, index: usize) -> NodePath {
        let mut indices = self.0.clone();
        indices.push(index);
        NodePath(indices)
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        NodePath(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

// ---------------------------------------------------------------------------
// BlockStack
// ---------------------------------------------------------------------------

/// Stack of insertion points for construction that continues after assembly.
///
/// The top of the stack is the current target for further appends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockStack {
    entries: Vec<NodePath>,
}

impl BlockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: NodePath) {
        self.entries.push(path);
    }

    pub fn pop(&mut self) -> Option<NodePath> {
        self.entries.pop()
    }

    /// The current insertion point, if any.
    pub fn current(&self) -> Option<&NodePath> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &NodePath> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// RouteDefinition
// ---------------------------------------------------------------------------

/// One pipeline: an identifier and an ordered sequence of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    outputs: Vec<ProcessingNode>,
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outputs: Vec::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = ProcessingNode>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn outputs(&self) -> &[ProcessingNode] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut Vec<ProcessingNode> {
        &mut self.outputs
    }

    pub fn clear_outputs(&mut self) {
        self.outputs.clear();
    }

    pub fn add_output(&mut self, node: ProcessingNode) {
        self.outputs.push(node);
    }

    pub fn add_outputs(&mut self, nodes: impl IntoIterator<Item = ProcessingNode>) {
        self.outputs.extend(nodes);
    }

    /// Remove and return all top-level outputs, leaving the route empty.
    pub fn take_outputs(&mut self) -> Vec<ProcessingNode> {
        std::mem::take(&mut self.outputs)
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&ProcessingNode> {
        resolve(&self.outputs, path.indices())
    }

    pub fn node_at_mut(&mut self, path: &NodePath) -> Option<&mut ProcessingNode> {
        resolve_mut(&mut self.outputs, path.indices())
    }

    /// Append `node` to the outputs of the node at `path`.
    ///
    /// This is how construction continues at an insertion point taken from a
    /// [`BlockStack`].
    pub fn append_at(&mut self, path: &NodePath, node: ProcessingNode) -> Result<()> {
        let route = self.id.clone();
        let target = self
            .node_at_mut(path)
            .ok_or_else(|| WeaveError::InvalidNodePath {
                route,
                path: path.indices().to_vec(),
            })?;
        target.outputs.push(node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> RouteDefinition {
        RouteDefinition::new("orders").with_outputs([
            ProcessingNode::step("direct:in"),
            ProcessingNode::proxy("audit").with_outputs([ProcessingNode::proceed()]),
        ])
    }

    #[test]
    fn clear_and_add_outputs() {
        let mut route = sample_route();
        assert_eq!(route.outputs().len(), 2);
        route.clear_outputs();
        assert!(route.outputs().is_empty());
        route.add_output(ProcessingNode::step("log:x"));
        assert_eq!(route.outputs(), &[ProcessingNode::step("log:x")]);
    }

    #[test]
    fn take_outputs_empties_route() {
        let mut route = sample_route();
        let taken = route.take_outputs();
        assert_eq!(taken.len(), 2);
        assert!(route.outputs().is_empty());
    }

    #[test]
    fn append_at_targets_nested_node() {
        let mut route = sample_route();
        let path = NodePath::from(vec![1, 0]);
        route.append_at(&path, ProcessingNode::step("log:late")).unwrap();
        let proceed = route.node_at(&path).unwrap();
        assert!(proceed.is_proceed());
        assert_eq!(proceed.outputs, vec![ProcessingNode::step("log:late")]);
    }

    #[test]
    fn append_at_unknown_path_fails() {
        let mut route = sample_route();
        let err = route
            .append_at(&NodePath::from(vec![5]), ProcessingNode::step("x"))
            .unwrap_err();
        match err {
            WeaveError::InvalidNodePath { route, path } => {
                assert_eq!(route, "orders");
                assert_eq!(path, vec![5]);
            }
            other => panic!("expected InvalidNodePath, got {other:?}"),
        }
    }

    #[test]
    fn block_stack_current_is_last_pushed() {
        let mut blocks = BlockStack::new();
        assert!(blocks.current().is_none());
        blocks.push(NodePath::from(vec![0]));
        blocks.push(NodePath::from(vec![1, 0]));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks.current(), Some(&NodePath::from(vec![1, 0])));
        assert_eq!(blocks.pop(), Some(NodePath::from(vec![1, 0])));
        assert_eq!(blocks.current(), Some(&NodePath::from(vec![0])));
    }

    #[test]
    fn node_path_helpers() {
        let base = NodePath::from(vec![2]);
        assert_eq!(base.child(0), NodePath::from(vec![2, 0]));
        assert_eq!(base.join(&NodePath::from(vec![1, 3])), NodePath::from(vec![2, 1, 3]));
        assert_eq!(base.join(&NodePath::from(vec![1, 3])).to_string(), "/2/1/3");
    }
}
