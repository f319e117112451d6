//! Provenance tracker
//!
//! Records actions as new children of the current node.

use crate::action::{Action, Args};
use crate::error::ProvenanceError;
use crate::graph::{NodeId, SharedGraph};
use crate::pause::PauseFlag;
use crate::registry::ActionFunctionRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Applies actions at the current node
#[derive(Debug, Clone)]
pub struct ProvenanceTracker {
    registry: Arc<ActionFunctionRegistry>,
    graph: SharedGraph,
    pause: PauseFlag,
}

impl ProvenanceTracker {
    #[must_use]
    pub fn new(registry: Arc<ActionFunctionRegistry>, graph: SharedGraph, pause: PauseFlag) -> Self {
        Self {
            registry,
            graph,
            pause,
        }
    }

    /// Record `action` as a child of `current` labelled with its forward name
    ///
    /// With `is_replay == false` the forward function runs first; with
    /// `is_replay == true` the mutation is taken as already applied to the
    /// document and only the bookkeeping happens.
    ///
    /// # Errors
    /// `UnknownAction` if a referenced name is not registered,
    /// `ActionExecution` if the forward function fails. The graph is left
    /// unchanged in both cases.
    pub async fn apply_action(&self, action: Action, is_replay: bool) -> Result<NodeId, ProvenanceError> {
        let label = action.do_name.clone();
        self.apply_action_with(action, is_replay, label, Map::new()).await
    }

    /// [`apply_action`](Self::apply_action) with an explicit label and artifact bag
    ///
    /// # Errors
    /// See [`apply_action`](Self::apply_action).
    pub async fn apply_action_with(
        &self,
        action: Action,
        is_replay: bool,
        label: impl Into<String>,
        artifacts: Map<String, Value>,
    ) -> Result<NodeId, ProvenanceError> {
        self.apply_action_capturing(action, is_replay, label, move || artifacts)
            .await
    }

    /// [`apply_action_with`](Self::apply_action_with), building the artifact
    /// bag once the forward function has run
    ///
    /// # Errors
    /// See [`apply_action`](Self::apply_action).
    pub async fn apply_action_capturing<F>(
        &self,
        action: Action,
        is_replay: bool,
        label: impl Into<String>,
        capture: F,
    ) -> Result<NodeId, ProvenanceError>
    where
        F: FnOnce() -> Map<String, Value> + Send,
    {
        let label = label.into();
        let entry = match self.registry.resolve(&action.do_name) {
            Ok(entry) => entry.clone(),
            Err(err) => {
                tracing::warn!(action = %action.do_name, "dropping action with unknown function");
                return Err(err);
            }
        };
        if let Some(undo) = &action.undo_name {
            if let Err(err) = self.registry.resolve(undo) {
                tracing::warn!(action = %action.do_name, undo = %undo, "dropping action with unknown inverse");
                return Err(err);
            }
        }

        if !is_replay {
            let _guard = self.pause.hold();
            entry.invoke(Args::from(action.do_arguments.as_slice())).await?;
        }

        let artifacts = capture();
        let mut graph = self.graph.write();
        let parent = graph.current();
        let id = graph.add_node(parent, action, label, artifacts)?;
        graph.set_current(id)?;
        Ok(id)
    }

    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ActionFunctionRegistry> {
        &self.registry
    }
}
