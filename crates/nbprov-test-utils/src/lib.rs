//! Testing utilities for the nbprov workspace
//!
//! An in-memory notebook that notifies its observer synchronously, a
//! call-recording action function and a few graph fixtures.

#![allow(missing_docs)]

use nbprov_core::{
    Action, ActionFailure, ActionFunction, ActionFunctionRegistry, Args, GraphMetadata, NodeId, ProvenanceGraph,
};
use nbprov_notebook::{
    Cell, CellListChange, CellType, DocumentError, DocumentEvent, DocumentObserver, NotebookCommand,
    NotebookDocument, SharedDocument,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Notebook held entirely in memory
#[derive(Default)]
pub struct InMemoryNotebook {
    cells: Vec<Cell>,
    active: Option<usize>,
    selected: BTreeSet<usize>,
    output_scrolling: bool,
    metadata: Map<String, Value>,
    execution_count: u32,
    executions: Vec<usize>,
    observer: Option<Arc<dyn DocumentObserver>>,
}

impl InMemoryNotebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..Self::default()
        }
    }

    pub fn into_shared(self) -> SharedDocument<Self> {
        Arc::new(Mutex::new(self))
    }

    pub fn set_observer(&mut self, observer: Arc<dyn DocumentObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_sources(&self) -> Vec<String> {
        self.cells.iter().map(|cell| cell.source.clone()).collect()
    }

    pub fn selected(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub fn output_scrolling(&self) -> bool {
        self.output_scrolling
    }

    /// Indices of executed cells, in execution order
    pub fn executions(&self) -> &[usize] {
        &self.executions
    }

    /// Replace the metadata map wholesale, as loading a file would
    pub fn set_raw_metadata(&mut self, metadata: Map<String, Value>) {
        self.metadata = metadata;
    }

    fn notify(&self, event: DocumentEvent) {
        if let Some(observer) = &self.observer {
            observer.observe(&event, self);
        }
    }

    fn check(&self, index: usize) -> Result<(), DocumentError> {
        if index < self.cells.len() {
            Ok(())
        } else {
            Err(DocumentError::IndexOutOfRange {
                index,
                len: self.cells.len(),
            })
        }
    }

    fn command(&mut self, command: NotebookCommand) {
        let len = self.cells.len();
        match command {
            NotebookCommand::SelectAll => self.selected = (0..len).collect(),
            NotebookCommand::DeselectAll => self.selected.clear(),
            NotebookCommand::SelectAbove => {
                if let Some(active) = self.active {
                    self.selected = (0..=active.min(len.saturating_sub(1))).collect();
                }
            }
            NotebookCommand::SelectBelow => {
                if let Some(active) = self.active {
                    self.selected = (active..len).collect();
                }
            }
            NotebookCommand::EnableOutputScrolling => self.output_scrolling = true,
            NotebookCommand::DisableOutputScrolling => self.output_scrolling = false,
        }
        self.notify(DocumentEvent::CommandInvoked(command));
    }
}

impl std::fmt::Debug for InMemoryNotebook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryNotebook")
            .field("cells", &self.cell_sources())
            .field("active", &self.active)
            .field("observed", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl NotebookDocument for InMemoryNotebook {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).cloned()
    }

    fn insert_cell(&mut self, index: usize, cell: Cell) -> Result<(), DocumentError> {
        if index > self.cells.len() {
            return Err(DocumentError::IndexOutOfRange {
                index,
                len: self.cells.len(),
            });
        }
        self.cells.insert(index, cell.clone());
        self.notify(DocumentEvent::CellsChanged(CellListChange::Insert { index, cell }));
        Ok(())
    }

    fn remove_cell(&mut self, index: usize) -> Result<Cell, DocumentError> {
        self.check(index)?;
        let cell = self.cells.remove(index);
        self.notify(DocumentEvent::CellsChanged(CellListChange::Remove {
            index,
            cell: cell.clone(),
        }));
        Ok(cell)
    }

    fn move_cell(&mut self, from: usize, to: usize) -> Result<(), DocumentError> {
        let len = self.cells.len();
        if from >= len || to >= len {
            return Err(DocumentError::InvalidMove { from, to, len });
        }
        let cell = self.cells.remove(from);
        self.cells.insert(to, cell);
        self.notify(DocumentEvent::CellsChanged(CellListChange::Move { from, to }));
        Ok(())
    }

    fn set_cell(&mut self, index: usize, cell: Cell) -> Result<Cell, DocumentError> {
        self.check(index)?;
        let previous = std::mem::replace(&mut self.cells[index], cell.clone());
        self.notify(DocumentEvent::CellsChanged(CellListChange::Set {
            index,
            previous: previous.clone(),
            current: cell,
        }));
        Ok(previous)
    }

    fn active_cell(&self) -> Option<usize> {
        self.active
    }

    fn set_active_cell(&mut self, index: Option<usize>) -> Result<Option<usize>, DocumentError> {
        if let Some(index) = index {
            self.check(index)?;
        }
        let previous = std::mem::replace(&mut self.active, index);
        if previous != index {
            self.notify(DocumentEvent::ActiveCellChanged {
                previous,
                current: index,
            });
        }
        Ok(previous)
    }

    fn set_cell_text(&mut self, index: usize, text: &str) -> Result<String, DocumentError> {
        self.check(index)?;
        let previous = std::mem::replace(&mut self.cells[index].source, text.to_string());
        if previous != text {
            self.notify(DocumentEvent::CellTextChanged {
                index,
                previous: previous.clone(),
                current: text.to_string(),
            });
        }
        Ok(previous)
    }

    fn set_outputs(&mut self, index: usize, outputs: Vec<Value>) -> Result<Vec<Value>, DocumentError> {
        self.check(index)?;
        let previous = std::mem::replace(&mut self.cells[index].outputs, outputs.clone());
        if previous != outputs {
            self.notify(DocumentEvent::OutputsChanged {
                index,
                previous: previous.clone(),
                current: outputs,
            });
        }
        Ok(previous)
    }

    fn set_output_scrolling(&mut self, enabled: bool) {
        if enabled {
            self.command(NotebookCommand::EnableOutputScrolling);
        } else {
            self.command(NotebookCommand::DisableOutputScrolling);
        }
    }

    fn select_all(&mut self) {
        self.command(NotebookCommand::SelectAll);
    }

    fn deselect_all(&mut self) {
        self.command(NotebookCommand::DeselectAll);
    }

    fn select_above(&mut self) {
        self.command(NotebookCommand::SelectAbove);
    }

    fn select_below(&mut self) {
        self.command(NotebookCommand::SelectBelow);
    }

    /// Code cells get an execution count and echo their source as output
    fn execute_cell(&mut self, index: usize) -> Result<(), DocumentError> {
        self.check(index)?;
        let cell_type = self.cells[index].cell_type;
        if cell_type == CellType::Code {
            self.execution_count += 1;
            let count = self.execution_count;
            let cell = &mut self.cells[index];
            let echo = cell.source.clone();
            cell.execution_count = Some(count);
            cell.outputs = vec![json!({
                "output_type": "execute_result",
                "execution_count": count,
                "data": { "text/plain": echo },
            })];
        }
        self.executions.push(index);
        self.notify(DocumentEvent::CellExecuted { index, cell_type });
        Ok(())
    }

    fn to_json(&self) -> Value {
        json!({
            "cells": self.cells.iter().map(Cell::to_value).collect::<Vec<_>>(),
            "metadata": self.metadata,
            "nbformat": 4,
            "nbformat_minor": 5,
        })
    }

    fn metadata(&self, key: &str) -> Option<Value> {
        self.metadata.get(key).cloned()
    }

    fn set_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }
}

/// Calls observed by [`RecordingFunction`]s, in order
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Action function that only records its invocations
#[derive(Debug)]
pub struct RecordingFunction {
    name: String,
    log: CallLog,
}

#[async_trait::async_trait]
impl ActionFunction for RecordingFunction {
    async fn call(&self, args: Args) -> Result<Value, ActionFailure> {
        self.log
            .calls
            .lock()
            .push((self.name.clone(), args.as_slice().to_vec()));
        Ok(Value::Null)
    }
}

/// Registry with a [`RecordingFunction`] under each of `names`
pub fn recording_registry(names: &[&str]) -> (ActionFunctionRegistry, CallLog) {
    let log = CallLog::default();
    let mut registry = ActionFunctionRegistry::new();
    for name in names {
        let function = RecordingFunction {
            name: (*name).to_string(),
            log: log.clone(),
        };
        registry
            .register_function(name, Arc::new(function))
            .expect("fixture names are unique");
    }
    (registry, log)
}

/// Reversible `cellValue` edit of cell 0 from `old` to `new`
pub fn text_edit(old: &str, new: &str) -> Action {
    Action::reversible("cellValue", vec![json!(0), json!(new)], "cellValue", vec![json!(0), json!(old)])
}

/// Root followed by a chain of `len` text edits, current at the tip
///
/// Returns the graph and its node ids from the root down.
pub fn linear_graph(len: usize) -> (ProvenanceGraph, Vec<NodeId>) {
    let mut graph = ProvenanceGraph::new(GraphMetadata::new("fixture.ipynb", "0.0.0"));
    let mut ids = vec![graph.root()];
    for step in 0..len {
        let parent = ids[step];
        let action = text_edit(&step.to_string(), &(step + 1).to_string());
        let id = graph
            .add_node(parent, action, format!("edit {step}"), Map::new())
            .expect("parent is in the graph");
        ids.push(id);
    }
    let tip = ids[len];
    graph.set_current(tip).expect("tip is in the graph");
    (graph, ids)
}
