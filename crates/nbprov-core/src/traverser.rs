//! Provenance graph traverser
//!
//! Moves the document between arbitrary history nodes by undoing edges up to
//! the lowest common ancestor and redoing edges down to the target.
//!
//! # Partial traversal
//!
//! The whole path is validated before any function runs, so an irreversible
//! edge or an unknown name aborts with the document untouched. A function
//! failing mid-path stops the walk: `current` stays at the last node reached
//! and the error comes back as [`ProvenanceError::TraversalInterrupted`].

use crate::action::Args;
use crate::error::ProvenanceError;
use crate::graph::{GraphEvent, NodeId, ProvenanceGraph, SharedGraph};
use crate::pause::PauseFlag;
use crate::registry::ActionFunctionRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Which function of an edge a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepDirection {
    /// Inverse function, walking towards the root
    Undo,
    /// Forward function, walking away from the root
    Do,
}

/// One function call of a traversal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalStep {
    pub direction: StepDirection,
    /// Node whose incoming edge is replayed
    pub edge: NodeId,
    pub function: String,
    pub arguments: Vec<Value>,
    /// Node the document is at once this step succeeds
    pub reaches: NodeId,
}

/// Validated path between two nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalPlan {
    pub from: NodeId,
    pub to: NodeId,
    pub ancestor: NodeId,
    pub steps: Vec<TraversalStep>,
}

impl TraversalPlan {
    /// True when source and target coincide
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Compute the path from `graph.current()` to `target`
    ///
    /// # Errors
    /// `NodeNotFound` for a foreign target,
    /// `IrreversibleActionBlocksTraversal` when an edge to undo has no inverse.
    pub fn compute(graph: &ProvenanceGraph, target: NodeId) -> Result<Self, ProvenanceError> {
        if !graph.contains(target) {
            return Err(ProvenanceError::NodeNotFound(target));
        }
        let from = graph.current();
        let ancestor = graph
            .lowest_common_ancestor(from, target)
            .ok_or(ProvenanceError::NodeNotFound(target))?;

        let mut steps = Vec::new();

        let mut cursor = from;
        while cursor != ancestor {
            let action = graph
                .incoming_action(cursor)
                .ok_or(ProvenanceError::NodeNotFound(cursor))?;
            let parent = graph.parent(cursor).ok_or(ProvenanceError::NodeNotFound(cursor))?;
            let (undo, args) = action.inverse().ok_or_else(|| {
                ProvenanceError::IrreversibleActionBlocksTraversal {
                    node: cursor,
                    action: action.do_name.clone(),
                }
            })?;
            steps.push(TraversalStep {
                direction: StepDirection::Undo,
                edge: cursor,
                function: undo.to_string(),
                arguments: args.to_vec(),
                reaches: parent,
            });
            cursor = parent;
        }

        let down: Vec<NodeId> = graph
            .path_to_root(target)
            .into_iter()
            .take_while(|n| *n != ancestor)
            .collect();
        for node in down.into_iter().rev() {
            let action = graph
                .incoming_action(node)
                .ok_or(ProvenanceError::NodeNotFound(node))?;
            steps.push(TraversalStep {
                direction: StepDirection::Do,
                edge: node,
                function: action.do_name.clone(),
                arguments: action.do_arguments.clone(),
                reaches: node,
            });
        }

        Ok(Self {
            from,
            to: target,
            ancestor,
            steps,
        })
    }
}

/// Replays recorded actions to reach arbitrary nodes
#[derive(Debug, Clone)]
pub struct ProvenanceGraphTraverser {
    registry: Arc<ActionFunctionRegistry>,
    graph: SharedGraph,
    pause: PauseFlag,
}

impl ProvenanceGraphTraverser {
    #[must_use]
    pub fn new(registry: Arc<ActionFunctionRegistry>, graph: SharedGraph, pause: PauseFlag) -> Self {
        Self {
            registry,
            graph,
            pause,
        }
    }

    /// Validated plan from the current node to `target`, without running it
    ///
    /// # Errors
    /// As [`TraversalPlan::compute`], plus `UnknownAction` for any step whose
    /// function is not registered.
    pub fn plan(&self, target: NodeId) -> Result<TraversalPlan, ProvenanceError> {
        let plan = TraversalPlan::compute(&self.graph.read(), target)?;
        for step in &plan.steps {
            self.registry.resolve(&step.function)?;
        }
        Ok(plan)
    }

    /// Move the document to `target`
    ///
    /// # Errors
    /// Validation errors from [`plan`](Self::plan) with nothing executed, or
    /// `TraversalInterrupted` when a step fails part way.
    pub async fn to_node(&self, target: NodeId) -> Result<(), ProvenanceError> {
        let plan = match self.plan(target) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(to = %target, error = %err, "traversal rejected");
                return Err(err);
            }
        };
        if plan.is_noop() {
            return Ok(());
        }

        tracing::info!(
            from = %plan.from,
            to = %plan.to,
            ancestor = %plan.ancestor,
            steps = plan.steps.len(),
            "traversing provenance graph"
        );

        let _guard = self.pause.hold();
        for step in plan.steps {
            let entry = self.registry.resolve(&step.function)?.clone();
            if let Err(err) = entry.invoke(Args::new(step.arguments)).await {
                let reached = self.graph.read().current();
                tracing::warn!(
                    reached = %reached,
                    to = %target,
                    function = %step.function,
                    error = %err,
                    "traversal interrupted"
                );
                return Err(ProvenanceError::TraversalInterrupted {
                    reached,
                    target,
                    source: Box::new(err),
                });
            }
            self.graph.write().set_current(step.reaches)?;
        }

        let graph = self.graph.read();
        graph.emit(GraphEvent::TraversalCompleted {
            from: plan.from,
            to: target,
        });
        tracing::info!(current = %graph.current(), "traversal complete");
        Ok(())
    }

    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }
}
