//! Graph snapshots
//!
//! [`SerializedGraph`] is a plain structural copy of a [`ProvenanceGraph`]:
//! every node with its parent, incoming action and artifacts, plus the root
//! and current ids. Where the bytes live is up to the host.

use crate::action::Action;
use crate::error::ProvenanceError;
use crate::graph::{GraphMetadata, NodeId, ProvenanceGraph, ProvenanceNode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: NodeId,
    pub label: String,
    pub created_on: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default)]
    pub artifacts: Map<String, Value>,
}

/// Portable copy of a whole graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedGraph {
    pub name: String,
    pub version: String,
    pub root: NodeId,
    pub current: NodeId,
    /// Nodes in insertion order
    pub nodes: Vec<SerializedNode>,
}

impl SerializedGraph {
    /// Encode as a JSON value
    ///
    /// # Errors
    /// `Json` if encoding fails.
    pub fn to_value(&self) -> Result<Value, ProvenanceError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode from a JSON value
    ///
    /// # Errors
    /// `Json` if the value does not have the snapshot shape.
    pub fn from_value(value: Value) -> Result<Self, ProvenanceError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Take a snapshot of `graph`
#[must_use]
pub fn serialize(graph: &ProvenanceGraph) -> SerializedGraph {
    let nodes = graph
        .nodes()
        .map(|node| SerializedNode {
            id: node.id,
            label: node.label.clone(),
            created_on: node.created_on,
            parent: graph.parent(node.id),
            action: graph.incoming_action(node.id).cloned(),
            artifacts: node.artifacts.clone(),
        })
        .collect();
    let metadata = graph.metadata();
    SerializedGraph {
        name: metadata.name.clone(),
        version: metadata.version.clone(),
        root: graph.root(),
        current: graph.current(),
        nodes,
    }
}

/// Rebuild a graph from a snapshot
///
/// Nodes are inserted by `createdOn`, ties keeping snapshot order, so
/// children come back oldest first however the snapshot lists them. A node
/// still ahead of its parent is deferred until the parent exists.
///
/// # Errors
/// `InvalidSnapshot` when the snapshot is not a single rooted tree, an edge
/// lacks its action, or `current` is missing.
pub fn restore(snapshot: SerializedGraph) -> Result<ProvenanceGraph, ProvenanceError> {
    let (roots, mut pending): (Vec<_>, Vec<_>) =
        snapshot.nodes.into_iter().partition(|node| node.parent.is_none());
    let mut roots = roots.into_iter();
    let root = roots
        .next()
        .ok_or_else(|| ProvenanceError::InvalidSnapshot("no root node".into()))?;
    if roots.next().is_some() {
        return Err(ProvenanceError::InvalidSnapshot("more than one root".into()));
    }
    if root.id != snapshot.root {
        return Err(ProvenanceError::InvalidSnapshot(format!(
            "root {} does not match declared root {}",
            root.id, snapshot.root
        )));
    }

    pending.sort_by_key(|node| node.created_on);

    let metadata = GraphMetadata::new(snapshot.name, snapshot.version);
    let mut graph = ProvenanceGraph::with_root(metadata, into_node(root));

    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for node in pending {
            match node.parent {
                Some(parent) if graph.contains(parent) => {
                    let id = node.id;
                    let action = node.action.clone().ok_or_else(|| {
                        ProvenanceError::InvalidSnapshot(format!("node {id} has no incoming action"))
                    })?;
                    graph.attach(parent, into_node(node), action)?;
                }
                _ => deferred.push(node),
            }
        }
        if deferred.len() == before {
            return Err(ProvenanceError::InvalidSnapshot(format!(
                "{before} nodes unreachable from root"
            )));
        }
        pending = deferred;
    }

    graph.set_current(snapshot.current).map_err(|_| {
        ProvenanceError::InvalidSnapshot(format!("current node {} missing", snapshot.current))
    })?;
    Ok(graph)
}

fn into_node(node: SerializedNode) -> ProvenanceNode {
    ProvenanceNode {
        id: node.id,
        label: node.label,
        created_on: node.created_on,
        artifacts: node.artifacts,
    }
}
