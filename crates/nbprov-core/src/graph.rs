//! Provenance graph
//!
//! Append-only tree of history nodes connected by the actions that produced
//! them, plus the `current` pointer marking where the document presently is.

use crate::action::Action;
use crate::error::ProvenanceError;
use parking_lot::RwLock;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Label given to the root node of every graph
pub const ROOT_LABEL: &str = "Root";

/// Default graph name
pub const DEFAULT_GRAPH_NAME: &str = "nbprov.default.graph";

const EVENT_CAPACITY: usize = 256;

/// Graph shared between tracker, traverser and host
pub type SharedGraph = Arc<RwLock<ProvenanceGraph>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A point in recorded history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceNode {
    pub id: NodeId,
    pub label: String,
    /// Creation time, milliseconds since the Unix epoch
    pub created_on: i64,
    /// Free-form metadata snapshot attached when the node was recorded
    #[serde(default)]
    pub artifacts: Map<String, Value>,
}

impl ProvenanceNode {
    pub(crate) fn new(label: impl Into<String>, artifacts: Map<String, Value>) -> Self {
        Self {
            id: NodeId::new(),
            label: label.into(),
            created_on: chrono::Utc::now().timestamp_millis(),
            artifacts,
        }
    }
}

/// Identifies a graph across sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub name: String,
    pub version: String,
}

impl GraphMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPH_NAME, crate::VERSION)
    }
}

/// Notifications emitted by the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A node was appended
    NodeAdded(NodeId),
    /// The current pointer moved
    CurrentChanged { from: NodeId, to: NodeId },
    /// A traversal reached its target
    TraversalCompleted { from: NodeId, to: NodeId },
}

/// Append-only provenance tree
#[derive(Debug)]
pub struct ProvenanceGraph {
    metadata: GraphMetadata,
    inner: DiGraph<ProvenanceNode, Action>,
    index: HashMap<NodeId, NodeIndex>,
    root: NodeId,
    current: NodeId,
    events: broadcast::Sender<GraphEvent>,
}

impl ProvenanceGraph {
    /// Create a graph holding only its root node
    #[must_use]
    pub fn new(metadata: GraphMetadata) -> Self {
        Self::with_root(metadata, ProvenanceNode::new(ROOT_LABEL, Map::new()))
    }

    pub(crate) fn with_root(metadata: GraphMetadata, root: ProvenanceNode) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let root_id = root.id;
        let mut inner = DiGraph::new();
        let idx = inner.add_node(root);
        let mut index = HashMap::new();
        index.insert(root_id, idx);
        Self {
            metadata,
            inner,
            index,
            root: root_id,
            current: root_id,
            events,
        }
    }

    /// Wrap into the shared handle used by tracker and traverser
    #[must_use]
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    /// Append a child of `parent` produced by `action`
    ///
    /// Does not move `current`.
    ///
    /// # Errors
    /// `InvalidParent` if `parent` is not part of this graph.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        action: Action,
        label: impl Into<String>,
        artifacts: Map<String, Value>,
    ) -> Result<NodeId, ProvenanceError> {
        let node = ProvenanceNode::new(label, artifacts);
        let id = node.id;
        self.attach(parent, node, action)?;
        tracing::debug!(node = %id, parent = %parent, "appended provenance node");
        self.emit(GraphEvent::NodeAdded(id));
        Ok(id)
    }

    /// Insert without notifying; used when rebuilding from a snapshot
    pub(crate) fn attach(
        &mut self,
        parent: NodeId,
        node: ProvenanceNode,
        action: Action,
    ) -> Result<(), ProvenanceError> {
        let parent_idx = *self
            .index
            .get(&parent)
            .ok_or(ProvenanceError::InvalidParent(parent))?;
        let id = node.id;
        if self.index.contains_key(&id) {
            return Err(ProvenanceError::InvalidSnapshot(format!("duplicate node id {id}")));
        }
        let idx = self.inner.add_node(node);
        self.inner.add_edge(parent_idx, idx, action);
        self.index.insert(id, idx);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// Move the current pointer
    ///
    /// # Errors
    /// `NodeNotFound` if `id` is not part of this graph.
    pub fn set_current(&mut self, id: NodeId) -> Result<(), ProvenanceError> {
        if !self.contains(id) {
            return Err(ProvenanceError::NodeNotFound(id));
        }
        let from = self.current;
        if from != id {
            self.current = id;
            self.emit(GraphEvent::CurrentChanged { from, to: id });
        }
        Ok(())
    }

    #[must_use]
    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ProvenanceNode> {
        self.index.get(&id).map(|idx| &self.inner[*idx])
    }

    /// Action on the edge leading into `id`; `None` for the root
    #[must_use]
    pub fn incoming_action(&self, id: NodeId) -> Option<&Action> {
        let idx = *self.index.get(&id)?;
        self.inner
            .edges_directed(idx, Direction::Incoming)
            .next()
            .map(|edge| edge.weight())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let idx = *self.index.get(&id)?;
        self.inner
            .neighbors_directed(idx, Direction::Incoming)
            .next()
            .map(|p| self.inner[p].id)
    }

    /// Children of `id`, oldest first
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .inner
            .edges_directed(*idx, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        edges.sort_unstable_by_key(|(edge, _)| *edge);
        edges.into_iter().map(|(_, target)| self.inner[target].id).collect()
    }

    /// `id` followed by each ancestor up to and including the root
    #[must_use]
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        if !self.contains(id) {
            return path;
        }
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.parent(node);
        }
        path
    }

    /// Deepest node that is an ancestor of (or equal to) both `a` and `b`
    #[must_use]
    pub fn lowest_common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let ancestors: HashSet<NodeId> = self.path_to_root(a).into_iter().collect();
        self.path_to_root(b).into_iter().find(|n| ancestors.contains(n))
    }

    /// Number of nodes including the root
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    /// Always false: the root exists from construction
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &ProvenanceNode> {
        self.inner.node_indices().map(|idx| &self.inner[idx])
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}
