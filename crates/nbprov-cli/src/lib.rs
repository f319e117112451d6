//! Reports over a provenance graph stored in notebook metadata
//!
//! Backs the `nbprov` binary: loading the graph out of a notebook file and
//! rendering the tree, a traversal plan and a consistency summary.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use anyhow::{anyhow, Context, Result};
use nbprov_core::{restore, NodeId, ProvenanceError, ProvenanceGraph, SerializedGraph, StepDirection, TraversalPlan};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

/// Read a notebook file as JSON
///
/// # Errors
/// I/O failures and malformed JSON.
pub async fn read_notebook(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// Restore the graph stored under `metadata[key]` of a notebook document
///
/// # Errors
/// A missing entry, or a snapshot that does not restore.
pub fn graph_from_notebook(notebook: &Value, key: &str) -> Result<ProvenanceGraph> {
    let stored = notebook
        .get("metadata")
        .and_then(|metadata| metadata.get(key))
        .filter(|value| !value.is_null())
        .ok_or_else(|| anyhow!("notebook has no provenance graph under metadata.{key}"))?;
    let snapshot = SerializedGraph::from_value(stored.clone()).context("decoding provenance snapshot")?;
    restore(snapshot).context("restoring provenance graph")
}

/// Indented tree listing, current node marked with `*`
#[must_use]
pub fn render_tree(graph: &ProvenanceGraph) -> String {
    let mut out = String::new();
    let mut stack = vec![(graph.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let marker = if id == graph.current() { '*' } else { ' ' };
        let kind = match graph.incoming_action(id) {
            Some(action) if !action.is_reversible() => " (irreversible)",
            _ => "",
        };
        let _ = writeln!(out, "{marker} {:indent$}{} [{id}]{kind}", "", node.label, indent = depth * 2);
        // Reverse so the oldest child is listed first
        for child in graph.children(id).into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out
}

/// Step-by-step description of the walk from the current node to `target`
///
/// # Errors
/// The reason the traversal would be rejected.
pub fn render_plan(graph: &ProvenanceGraph, target: NodeId) -> Result<String, ProvenanceError> {
    let plan = TraversalPlan::compute(graph, target)?;
    let mut out = String::new();
    let _ = writeln!(out, "from {} to {} via {}", plan.from, plan.to, plan.ancestor);
    if plan.is_noop() {
        out.push_str("already at target\n");
        return Ok(out);
    }
    for (position, step) in plan.steps.iter().enumerate() {
        let direction = match step.direction {
            StepDirection::Undo => "undo",
            StepDirection::Do => "do  ",
        };
        let arguments = Value::Array(step.arguments.clone());
        let _ = writeln!(
            out,
            "{:>3}. {direction} {}({}) -> {}",
            position + 1,
            step.function,
            arguments,
            step.reaches
        );
    }
    Ok(out)
}

/// Summary of a restored graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// Graph name
    pub name: String,
    /// Graph version
    pub version: String,
    /// Node count, root included
    pub nodes: usize,
    /// Edges with an inverse
    pub reversible: usize,
    /// Edges without an inverse
    pub irreversible: usize,
    /// Nodes without children
    pub leaves: usize,
    /// Current node
    pub current: NodeId,
    /// Edges between root and current
    pub current_depth: usize,
    /// Whether the root is reachable from current by undoing
    pub root_reachable: bool,
}

impl CheckReport {
    /// Summarize `graph`
    #[must_use]
    pub fn new(graph: &ProvenanceGraph) -> Self {
        let mut reversible = 0;
        let mut irreversible = 0;
        let mut leaves = 0;
        for node in graph.nodes() {
            match graph.incoming_action(node.id) {
                Some(action) if action.is_reversible() => reversible += 1,
                Some(_) => irreversible += 1,
                None => {}
            }
            if graph.children(node.id).is_empty() {
                leaves += 1;
            }
        }
        let current = graph.current();
        Self {
            name: graph.metadata().name.clone(),
            version: graph.metadata().version.clone(),
            nodes: graph.len(),
            reversible,
            irreversible,
            leaves,
            current,
            current_depth: graph.path_to_root(current).len().saturating_sub(1),
            root_reachable: TraversalPlan::compute(graph, graph.root()).is_ok(),
        }
    }

    /// Human-readable form
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "graph {} {}\n  nodes: {}\n  reversible edges: {}\n  irreversible edges: {}\n  leaves: {}\n  current: {} (depth {})\n  root reachable: {}\n",
            self.name,
            self.version,
            self.nodes,
            self.reversible,
            self.irreversible,
            self.leaves,
            self.current,
            self.current_depth,
            if self.root_reachable { "yes" } else { "no" },
        )
    }
}
