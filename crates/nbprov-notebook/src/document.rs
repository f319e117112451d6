//! Document collaborator
//!
//! The provenance layer never owns the notebook. It sees it through
//! [`NotebookDocument`], a set of mutation primitives shared by user edits
//! and replays, and hears about changes through [`DocumentObserver`].

use crate::model::Cell;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Document handle shared between host, action functions and facade
pub type SharedDocument<D> = Arc<Mutex<D>>;

/// Errors raised by document primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// Index does not address an existing cell (or insertion slot)
    #[error("cell index {index} out of range for {len} cells")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Cell count at the time of the call
        len: usize,
    },

    /// Move endpoints do not both address cells
    #[error("cannot move cell {from} to {to} in a notebook of {len} cells")]
    InvalidMove {
        /// Source index
        from: usize,
        /// Destination index
        to: usize,
        /// Cell count at the time of the call
        len: usize,
    },

    /// The document refused an operation
    #[error("document rejected operation: {0}")]
    Rejected(String),
}

/// Mutation primitives of a notebook
///
/// Implementations notify their observer synchronously from inside each
/// mutating method.
pub trait NotebookDocument: Send + 'static {
    /// Number of cells
    fn cell_count(&self) -> usize;

    /// Snapshot of the cell at `index`
    fn cell(&self, index: usize) -> Option<Cell>;

    /// Insert `cell` so it ends up at `index`
    ///
    /// # Errors
    /// `IndexOutOfRange` when `index > cell_count()`.
    fn insert_cell(&mut self, index: usize, cell: Cell) -> Result<(), DocumentError>;

    /// Remove and return the cell at `index`
    ///
    /// # Errors
    /// `IndexOutOfRange` for a missing cell.
    fn remove_cell(&mut self, index: usize) -> Result<Cell, DocumentError>;

    /// Move the cell at `from` so it ends up at `to`
    ///
    /// # Errors
    /// `InvalidMove` when either index is missing.
    fn move_cell(&mut self, from: usize, to: usize) -> Result<(), DocumentError>;

    /// Replace the cell at `index`, returning the old one
    ///
    /// # Errors
    /// `IndexOutOfRange` for a missing cell.
    fn set_cell(&mut self, index: usize, cell: Cell) -> Result<Cell, DocumentError>;

    /// Index of the focused cell
    fn active_cell(&self) -> Option<usize>;

    /// Focus a cell (or none), returning the previous focus
    ///
    /// # Errors
    /// `IndexOutOfRange` for a missing cell.
    fn set_active_cell(&mut self, index: Option<usize>) -> Result<Option<usize>, DocumentError>;

    /// Replace a cell's source text, returning the previous text
    ///
    /// # Errors
    /// `IndexOutOfRange` for a missing cell.
    fn set_cell_text(&mut self, index: usize, text: &str) -> Result<String, DocumentError>;

    /// Replace a cell's outputs, returning the previous outputs
    ///
    /// # Errors
    /// `IndexOutOfRange` for a missing cell.
    fn set_outputs(&mut self, index: usize, outputs: Vec<Value>) -> Result<Vec<Value>, DocumentError>;

    fn set_output_scrolling(&mut self, enabled: bool);

    fn select_all(&mut self);

    fn deselect_all(&mut self);

    fn select_above(&mut self);

    fn select_below(&mut self);

    /// Ask the host to run the cell
    ///
    /// # Errors
    /// `IndexOutOfRange` for a missing cell, `Rejected` if execution is unavailable.
    fn execute_cell(&mut self, index: usize) -> Result<(), DocumentError>;

    /// Whole document as notebook JSON
    fn to_json(&self) -> Value;

    /// Read a document-level metadata entry
    fn metadata(&self, key: &str) -> Option<Value>;

    /// Write a document-level metadata entry
    fn set_metadata(&mut self, key: &str, value: Value);
}

/// Receives document change notifications
pub trait DocumentObserver: Send + Sync {
    /// Called synchronously after every document mutation
    ///
    /// `document` is the notifying document, already in its changed state.
    fn observe(&self, event: &crate::model::DocumentEvent, document: &dyn NotebookDocument);
}
