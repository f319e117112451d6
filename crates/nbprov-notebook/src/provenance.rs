//! Per-document provenance facade
//!
//! [`NotebookProvenance`] wires one document to its own registry, graph,
//! tracker, traverser and change adapter. Every public operation runs
//! under a per-document FIFO lock, so recording, traversal and snapshots
//! never interleave.

use crate::adapter::{notebook_artifacts, ChangeAdapter, QueuedChange};
use crate::config::ProvenanceConfig;
use crate::document::{NotebookDocument, SharedDocument};
use crate::error::NotebookError;
use crate::functions::NotebookFunctions;
use nbprov_core::{
    restore, serialize, Action, ActionFunctionRegistry, GraphEvent, NodeId, PauseFlag, ProvenanceGraph,
    ProvenanceGraphTraverser, ProvenanceTracker, SerializedGraph, SharedGraph, TraversalPlan,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Provenance tracking for one notebook
pub struct NotebookProvenance<D> {
    config: ProvenanceConfig,
    document: SharedDocument<D>,
    registry: Arc<ActionFunctionRegistry>,
    graph: SharedGraph,
    tracker: ProvenanceTracker,
    traverser: ProvenanceGraphTraverser,
    adapter: Arc<ChangeAdapter>,
    pause: PauseFlag,
    ops: Mutex<()>,
}

impl<D: NotebookDocument> NotebookProvenance<D> {
    /// Start tracking `document`
    ///
    /// A graph stored under `config.metadata_key` is restored as is; the
    /// document is assumed to already be in the state of its current node.
    /// An absent or `null` entry starts a fresh graph.
    ///
    /// # Errors
    /// `Config` for an invalid configuration, `Provenance` when the stored
    /// graph cannot be decoded or restored.
    pub fn attach(document: SharedDocument<D>, config: ProvenanceConfig) -> Result<Self, NotebookError> {
        config.validate()?;

        let stored = document.lock().metadata(&config.metadata_key);
        let graph = match stored {
            None | Some(Value::Null) => ProvenanceGraph::new(config.graph_metadata()),
            Some(value) => {
                let graph = restore(SerializedGraph::from_value(value)?)?;
                tracing::info!(
                    key = %config.metadata_key,
                    nodes = graph.len(),
                    current = %graph.current(),
                    "restored provenance graph"
                );
                graph
            }
        }
        .into_shared();

        let pause = PauseFlag::new();
        let functions = Arc::new(NotebookFunctions::new(Arc::clone(&document), pause.clone()));
        let mut registry = ActionFunctionRegistry::new();
        functions.register_all(&mut registry)?;
        let registry = Arc::new(registry);

        let tracker = ProvenanceTracker::new(Arc::clone(&registry), Arc::clone(&graph), pause.clone());
        let traverser = ProvenanceGraphTraverser::new(Arc::clone(&registry), Arc::clone(&graph), pause.clone());
        let mut adapter = ChangeAdapter::new(pause.clone(), config.quiescence());
        if config.snapshot_artifacts {
            adapter = adapter.with_snapshots(config.metadata_key.clone());
        }
        let adapter = Arc::new(adapter);

        Ok(Self {
            config,
            document,
            registry,
            graph,
            tracker,
            traverser,
            adapter,
            pause,
            ops: Mutex::new(()),
        })
    }

    /// Observer to register with the document's change notifications
    #[must_use]
    pub fn observer(&self) -> Arc<ChangeAdapter> {
        Arc::clone(&self.adapter)
    }

    /// Record queued document changes, oldest first
    ///
    /// A text burst is recorded only once its quiescence window elapsed.
    /// The metadata refreshed here therefore lacks a burst that is still
    /// open; call [`persist`](Self::persist) before saving the document.
    ///
    /// # Errors
    /// The first recording failure; later queued changes are still recorded.
    pub async fn record_pending(&self) -> Result<Vec<NodeId>, NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(false).await
    }

    /// Close any open text burst, then record every queued change
    ///
    /// # Errors
    /// See [`record_pending`](Self::record_pending).
    pub async fn flush_edits(&self) -> Result<Vec<NodeId>, NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await
    }

    /// Perform and record a new action on the document
    ///
    /// # Errors
    /// `UnknownAction` or `ActionExecution`; nothing is recorded then.
    pub async fn apply(&self, action: Action) -> Result<NodeId, NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await?;
        let label = action.do_name.clone();
        let id = self
            .tracker
            .apply_action_capturing(action, false, label, || self.artifacts())
            .await?;
        self.persist_if_configured()?;
        Ok(id)
    }

    /// Move the document to `target`
    ///
    /// # Errors
    /// Traversal errors from the engine. The snapshot is refreshed even when
    /// a traversal stops part way.
    pub async fn to_node(&self, target: NodeId) -> Result<(), NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await?;
        self.navigate(target).await
    }

    /// Step back to the parent of the current node
    ///
    /// Returns the node reached, or `None` at the root.
    ///
    /// # Errors
    /// See [`to_node`](Self::to_node).
    pub async fn undo(&self) -> Result<Option<NodeId>, NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await?;
        let target = {
            let graph = self.graph.read();
            graph.parent(graph.current())
        };
        match target {
            Some(target) => self.navigate(target).await.map(|()| Some(target)),
            None => Ok(None),
        }
    }

    /// Step forward to the most recently created child of the current node
    ///
    /// Returns the node reached, or `None` at a leaf.
    ///
    /// # Errors
    /// See [`to_node`](Self::to_node).
    pub async fn redo(&self) -> Result<Option<NodeId>, NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await?;
        let target = {
            let graph = self.graph.read();
            graph.children(graph.current()).last().copied()
        };
        match target {
            Some(target) => self.navigate(target).await.map(|()| Some(target)),
            None => Ok(None),
        }
    }

    /// Plan a traversal to `target` without running it
    ///
    /// # Errors
    /// The reason the traversal would be rejected.
    pub fn plan(&self, target: NodeId) -> Result<TraversalPlan, NotebookError> {
        Ok(self.traverser.plan(target)?)
    }

    /// Serialized graph after recording everything pending
    ///
    /// # Errors
    /// Recording failures.
    pub async fn snapshot(&self) -> Result<SerializedGraph, NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await?;
        Ok(serialize(&self.graph.read()))
    }

    /// Write the snapshot into the document metadata
    ///
    /// # Errors
    /// Recording or encoding failures.
    pub async fn persist(&self) -> Result<(), NotebookError> {
        let _op = self.ops.lock().await;
        self.record_queued(true).await?;
        self.write_snapshot()
    }

    /// Record pending changes every quiescence window until `self` is dropped
    pub fn spawn_recorder(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.quiescence();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(provenance) = weak.upgrade() else {
                    break;
                };
                if let Err(err) = provenance.record_pending().await {
                    tracing::warn!(error = %err, "background recording failed");
                }
            }
            tracing::debug!("provenance recorder stopped");
        })
    }

    /// Subscribe to graph notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.graph.read().subscribe()
    }

    #[must_use]
    pub fn current(&self) -> NodeId {
        self.graph.read().current()
    }

    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    #[must_use]
    pub fn document(&self) -> &SharedDocument<D> {
        &self.document
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ActionFunctionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ProvenanceConfig {
        &self.config
    }

    /// True while a replay is mutating the document
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    async fn record_queued(&self, flush: bool) -> Result<Vec<NodeId>, NotebookError> {
        if flush {
            self.adapter.flush();
        }
        let changes = self.adapter.take_pending(Instant::now());
        let mut recorded = Vec::with_capacity(changes.len());
        let mut first_error = None;
        for change in changes {
            match self.record(change).await {
                Ok(id) => recorded.push(id),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(recorded),
        }
    }

    /// Record a change the user already made, with the artifacts captured at the time
    async fn record(&self, change: QueuedChange) -> Result<NodeId, NotebookError> {
        let QueuedChange { action, artifacts } = change;
        let label = action.do_name.clone();
        let id = self.tracker.apply_action_with(action, true, label, artifacts).await?;
        self.persist_if_configured()?;
        Ok(id)
    }

    async fn navigate(&self, target: NodeId) -> Result<(), NotebookError> {
        let result = self.traverser.to_node(target).await;
        self.persist_if_configured()?;
        Ok(result?)
    }

    fn artifacts(&self) -> Map<String, Value> {
        if self.config.snapshot_artifacts {
            notebook_artifacts(&*self.document.lock(), &self.config.metadata_key)
        } else {
            Map::new()
        }
    }

    fn persist_if_configured(&self) -> Result<(), NotebookError> {
        if self.config.persist_on_node_added {
            self.write_snapshot()?;
        }
        Ok(())
    }

    fn write_snapshot(&self) -> Result<(), NotebookError> {
        let value = serialize(&self.graph.read()).to_value()?;
        self.document.lock().set_metadata(&self.config.metadata_key, value);
        Ok(())
    }
}

impl<D> std::fmt::Debug for NotebookProvenance<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookProvenance")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
