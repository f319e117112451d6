//! Change-to-action adapter
//!
//! Turns document notifications into replay actions. The adapter runs
//! inside the document's notification callback, so it only translates and
//! queues; the facade drains the queue into the tracker. When snapshots are
//! enabled each queued change also carries the document as it stood right
//! after that change.

use crate::coalesce::TextEditCoalescer;
use crate::document::{DocumentObserver, NotebookDocument};
use crate::functions::{
    ADD_CELL, CELL_OUTPUTS, CHANGE_ACTIVE_CELL, CLEAR_OUTPUTS, DESELECT_ALL, DISABLE_OUTPUT_SCROLLING,
    ENABLE_OUTPUT_SCROLLING, EXECUTE_CELL, MOVE_CELL, REMOVE_CELL, SELECT_ABOVE, SELECT_ALL, SELECT_BELOW,
    SET_CELL,
};
use crate::model::{CellListChange, CellType, DocumentEvent, NotebookCommand};
use nbprov_core::{Action, PauseFlag};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Artifact key carrying the document snapshot
pub const NOTEBOOK_ARTIFACT: &str = "notebook";

/// Artifact bag holding `document` as notebook JSON
///
/// The metadata entry under `metadata_key` is left out so a stored graph
/// never ends up inside its own artifacts.
#[must_use]
pub fn notebook_artifacts(document: &dyn NotebookDocument, metadata_key: &str) -> Map<String, Value> {
    let mut notebook = document.to_json();
    if let Some(metadata) = notebook.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove(metadata_key);
    }
    let mut artifacts = Map::new();
    artifacts.insert(NOTEBOOK_ARTIFACT.to_string(), notebook);
    artifacts
}

/// A translated change waiting to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedChange {
    /// Replay action
    pub action: Action,
    /// Artifacts captured when the change happened; empty unless snapshots are on
    pub artifacts: Map<String, Value>,
}

#[derive(Debug)]
struct TextBurst {
    coalescer: TextEditCoalescer,
    /// Snapshot taken at the burst's latest edit
    artifacts: Map<String, Value>,
}

impl TextBurst {
    fn close(&mut self, action: Option<Action>) -> Option<QueuedChange> {
        let action = action?;
        Some(QueuedChange {
            action,
            artifacts: std::mem::take(&mut self.artifacts),
        })
    }
}

/// Observer that records user-initiated document changes
#[derive(Debug)]
pub struct ChangeAdapter {
    pause: PauseFlag,
    snapshot_key: Option<String>,
    pending: Mutex<VecDeque<QueuedChange>>,
    burst: Mutex<TextBurst>,
}

impl ChangeAdapter {
    /// Create an adapter gated by `pause`, coalescing text over `window`
    #[must_use]
    pub fn new(pause: PauseFlag, window: Duration) -> Self {
        Self {
            pause,
            snapshot_key: None,
            pending: Mutex::new(VecDeque::new()),
            burst: Mutex::new(TextBurst {
                coalescer: TextEditCoalescer::new(window),
                artifacts: Map::new(),
            }),
        }
    }

    /// Capture a document snapshot with every change, omitting `metadata_key`
    #[inline]
    #[must_use]
    pub fn with_snapshots(mut self, metadata_key: impl Into<String>) -> Self {
        self.snapshot_key = Some(metadata_key.into());
        self
    }

    /// Translate a non-text event into its action
    ///
    /// Text edits go through the coalescer and yield `None` here, as do
    /// events that change nothing.
    #[must_use]
    pub fn translate(event: &DocumentEvent) -> Option<Action> {
        let action = match event {
            DocumentEvent::CellsChanged(change) => match change {
                CellListChange::Insert { index, cell } => Action::reversible(
                    ADD_CELL,
                    vec![json!(index), cell.to_value()],
                    REMOVE_CELL,
                    vec![json!(index)],
                ),
                CellListChange::Remove { index, cell } => Action::reversible(
                    REMOVE_CELL,
                    vec![json!(index)],
                    ADD_CELL,
                    vec![json!(index), cell.to_value()],
                ),
                CellListChange::Move { from, to } if from == to => return None,
                CellListChange::Move { from, to } => {
                    Action::reversible(MOVE_CELL, vec![json!(from), json!(to)], MOVE_CELL, vec![json!(to), json!(from)])
                }
                CellListChange::Set {
                    index,
                    previous,
                    current,
                } => Action::reversible(
                    SET_CELL,
                    vec![json!(index), current.to_value()],
                    SET_CELL,
                    vec![json!(index), previous.to_value()],
                ),
            },
            DocumentEvent::ActiveCellChanged { previous, current } if previous == current => return None,
            DocumentEvent::ActiveCellChanged { previous, current } => Action::reversible(
                CHANGE_ACTIVE_CELL,
                vec![json!(current)],
                CHANGE_ACTIVE_CELL,
                vec![json!(previous)],
            ),
            DocumentEvent::CellTextChanged { .. } => return None,
            DocumentEvent::OutputsChanged { previous, current, .. } if previous == current => return None,
            DocumentEvent::OutputsChanged {
                index,
                previous,
                current,
            } => Action::reversible(
                CELL_OUTPUTS,
                vec![json!(index), Value::Array(current.clone())],
                CELL_OUTPUTS,
                vec![json!(index), Value::Array(previous.clone())],
            ),
            // Running code has effects outside the document
            DocumentEvent::CellExecuted {
                index,
                cell_type: CellType::Code,
            } => Action::irreversible(EXECUTE_CELL, vec![json!(index)]),
            DocumentEvent::CellExecuted { index, .. } => {
                Action::reversible(EXECUTE_CELL, vec![json!(index)], CLEAR_OUTPUTS, vec![json!(index)])
            }
            DocumentEvent::CommandInvoked(command) => command_action(*command),
        };
        Some(action)
    }

    /// Close an expired text burst, then drain every queued change in arrival order
    pub fn take_pending(&self, now: Instant) -> Vec<QueuedChange> {
        let expired = {
            let mut burst = self.burst.lock();
            let action = burst.coalescer.poll(now);
            burst.close(action)
        };
        if let Some(change) = expired {
            self.enqueue(change);
        }
        self.pending.lock().drain(..).collect()
    }

    /// Close the open text burst regardless of the window
    pub fn flush(&self) {
        let flushed = {
            let mut burst = self.burst.lock();
            let action = burst.coalescer.flush();
            burst.close(action)
        };
        if let Some(change) = flushed {
            self.enqueue(change);
        }
    }

    /// Instant at which the open text burst closes
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.burst.lock().coalescer.deadline()
    }

    /// Number of queued changes, not counting an open text burst
    #[must_use]
    pub fn queued(&self) -> usize {
        self.pending.lock().len()
    }

    fn capture(&self, document: &dyn NotebookDocument) -> Map<String, Value> {
        match &self.snapshot_key {
            Some(key) => notebook_artifacts(document, key),
            None => Map::new(),
        }
    }

    fn enqueue(&self, change: QueuedChange) {
        tracing::trace!(action = %change.action.do_name, "queued document change");
        self.pending.lock().push_back(change);
    }
}

impl DocumentObserver for ChangeAdapter {
    fn observe(&self, event: &DocumentEvent, document: &dyn NotebookDocument) {
        if self.pause.is_paused() {
            tracing::trace!(?event, "ignoring change made while paused");
            return;
        }

        if let DocumentEvent::CellTextChanged {
            index,
            previous,
            current,
        } = event
        {
            let artifacts = self.capture(document);
            let closed = {
                let mut burst = self.burst.lock();
                let action = burst
                    .coalescer
                    .push(*index, previous.clone(), current.clone(), Instant::now());
                let emitted = std::mem::replace(&mut burst.artifacts, artifacts);
                action.map(|action| QueuedChange {
                    action,
                    artifacts: emitted,
                })
            };
            if let Some(change) = closed {
                self.enqueue(change);
            }
            return;
        }

        self.flush();
        if let Some(action) = Self::translate(event) {
            let artifacts = self.capture(document);
            self.enqueue(QueuedChange { action, artifacts });
        }
    }
}

/// Selection inverses are approximate: the prior selection is not captured
fn command_action(command: NotebookCommand) -> Action {
    let (forward, inverse) = match command {
        NotebookCommand::SelectAll => (SELECT_ALL, DESELECT_ALL),
        NotebookCommand::SelectAbove => (SELECT_ABOVE, DESELECT_ALL),
        NotebookCommand::SelectBelow => (SELECT_BELOW, DESELECT_ALL),
        NotebookCommand::DeselectAll => (DESELECT_ALL, SELECT_ALL),
        NotebookCommand::EnableOutputScrolling => (ENABLE_OUTPUT_SCROLLING, DISABLE_OUTPUT_SCROLLING),
        NotebookCommand::DisableOutputScrolling => (DISABLE_OUTPUT_SCROLLING, ENABLE_OUTPUT_SCROLLING),
    };
    Action::reversible(forward, Vec::new(), inverse, Vec::new())
}
