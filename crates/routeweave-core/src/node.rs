//! Processing node model: the tree a route is built from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::route::NodePath;

/// The kind of a processing node.
///
/// Serialized with an internal `kind` tag, e.g. `{"kind": "step", "uri": "log:in"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// An ordinary processing step sending to an endpoint.
    Step { uri: String },
    /// An exception-handling clause. Always hoisted to the front of a route.
    OnException {
        exceptions: Vec<String>,
        #[serde(default)]
        handled: bool,
    },
    /// Continuation point inside an intercept: where the wrapped logic resumes.
    Proceed,
    /// The node an intercept contributes to a route when woven in.
    Proxy { intercept: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ProcessingNode>,
}

impl ProcessingNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            id: None,
            outputs: Vec::new(),
        }
    }

    pub fn step(uri: impl Into<String>) -> Self {
        Self::new(NodeKind::Step { uri: uri.into() })
    }

    pub fn on_exception<I, S>(exceptions: I, handled: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(NodeKind::OnException {
            exceptions: exceptions.into_iter().map(Into::into).collect(),
            handled,
        })
    }

    pub fn proceed() -> Self {
        Self::new(NodeKind::Proceed)
    }

    pub fn proxy(intercept: impl Into<String>) -> Self {
        Self::new(NodeKind::Proxy {
            intercept: intercept.into(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = ProcessingNode>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn is_exception_clause(&self) -> bool {
        matches!(self.kind, NodeKind::OnException { .. })
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self.kind, NodeKind::Proceed)
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, NodeKind::Proxy { .. })
    }

    /// Iterate this node and all of its descendants in pre-order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Step { uri } => write!(f, "to({uri})"),
            NodeKind::OnException {
                exceptions,
                handled,
            } => {
                write!(f, "onException({})", exceptions.join(", "))?;
                if *handled {
                    write!(f, " handled")?;
                }
                Ok(())
            }
            NodeKind::Proceed => write!(f, "proceed"),
            NodeKind::Proxy { intercept } => write!(f, "intercept({intercept})"),
        }
    }
}

impl fmt::Display for ProcessingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref id) = self.id {
            write!(f, " #{id}")?;
        }
        Ok(())
    }
}

/// Pre-order iterator over a node subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a ProcessingNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ProcessingNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.outputs.iter().rev());
        Some(node)
    }
}

// ---------------------------------------------------------------------------
// Tree search and navigation
// ---------------------------------------------------------------------------

/// Find the first proceed marker in `outputs`, depth-first and left-to-right.
///
/// A node is checked before its own outputs. The returned path is relative to
/// `outputs`.
pub fn find_first_proceed(outputs: &[ProcessingNode]) -> Option<NodePath> {
    fn search(nodes: &[ProcessingNode], prefix: &mut Vec<usize>) -> bool {
        for (i, node) in nodes.iter().enumerate() {
            prefix.push(i);
            if node.is_proceed() || search(&node.outputs, prefix) {
                return true;
            }
            prefix.pop();
        }
        false
    }

    let mut path = Vec::new();
    search(outputs, &mut path).then(|| NodePath::from(path))
}

/// Count every proceed marker in `outputs`, at any depth.
pub fn count_proceeds(outputs: &[ProcessingNode]) -> usize {
    outputs
        .iter()
        .flat_map(ProcessingNode::descendants)
        .filter(|n| n.is_proceed())
        .count()
}

pub fn resolve<'a>(nodes: &'a [ProcessingNode], path: &[usize]) -> Option<&'a ProcessingNode> {
    let (first, rest) = path.split_first()?;
    let node = nodes.get(*first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        resolve(&node.outputs, rest)
    }
}

pub fn resolve_mut<'a>(
    nodes: &'a mut [ProcessingNode],
    path: &[usize],
) -> Option<&'a mut ProcessingNode> {
    let (first, rest) = path.split_first()?;
    let node = nodes.get_mut(*first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        resolve_mut(&mut node.outputs, rest)
    }
}
