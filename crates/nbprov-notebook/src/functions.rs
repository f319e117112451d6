//! Notebook action function library
//!
//! Every recorded notebook action names one of these functions for its
//! forward step and, when reversible, one for its inverse. Each function
//! holds the pause token while it touches the document so the change
//! notifications it causes are not recorded a second time.

use crate::document::{DocumentError, NotebookDocument, SharedDocument};
use crate::model::Cell;
use nbprov_core::{ActionFailure, ActionFunctionRegistry, Args, PauseFlag, ProvenanceError};
use serde_json::{json, Value};
use std::sync::Arc;

pub const ADD_CELL: &str = "addCell";
pub const REMOVE_CELL: &str = "removeCell";
pub const MOVE_CELL: &str = "moveCell";
pub const SET_CELL: &str = "setCell";
pub const CHANGE_ACTIVE_CELL: &str = "changeActiveCell";
pub const CELL_VALUE: &str = "cellValue";
pub const CELL_OUTPUTS: &str = "cellOutputs";
pub const CLEAR_OUTPUTS: &str = "clearOutputs";
pub const ENABLE_OUTPUT_SCROLLING: &str = "enableOutputScrolling";
pub const DISABLE_OUTPUT_SCROLLING: &str = "disableOutputScrolling";
pub const SELECT_ALL: &str = "selectAll";
pub const DESELECT_ALL: &str = "deselectAll";
pub const SELECT_ABOVE: &str = "selectAbove";
pub const SELECT_BELOW: &str = "selectBelow";
pub const EXECUTE_CELL: &str = "executeCell";

/// Every function name registered by [`NotebookFunctions::register_all`]
///
/// These strings are persisted inside serialized graphs. Renaming one breaks
/// every notebook recorded before the rename.
pub const FUNCTION_NAMES: [&str; 15] = [
    ADD_CELL,
    REMOVE_CELL,
    MOVE_CELL,
    SET_CELL,
    CHANGE_ACTIVE_CELL,
    CELL_VALUE,
    CELL_OUTPUTS,
    CLEAR_OUTPUTS,
    ENABLE_OUTPUT_SCROLLING,
    DISABLE_OUTPUT_SCROLLING,
    SELECT_ALL,
    DESELECT_ALL,
    SELECT_ABOVE,
    SELECT_BELOW,
    EXECUTE_CELL,
];

type Method<D> = fn(&NotebookFunctions<D>, &Args) -> Result<Value, ActionFailure>;

/// Action functions bound to one document
pub struct NotebookFunctions<D> {
    document: SharedDocument<D>,
    pause: PauseFlag,
}

impl<D: NotebookDocument> NotebookFunctions<D> {
    #[must_use]
    pub fn new(document: SharedDocument<D>, pause: PauseFlag) -> Self {
        Self { document, pause }
    }

    /// Register the whole library into `registry`
    ///
    /// # Errors
    /// `DuplicateActionName` if any library name is already taken.
    pub fn register_all(self: &Arc<Self>, registry: &mut ActionFunctionRegistry) -> Result<(), ProvenanceError> {
        let table: [(&str, Method<D>); 15] = [
            (ADD_CELL, Self::add_cell),
            (REMOVE_CELL, Self::remove_cell),
            (MOVE_CELL, Self::move_cell),
            (SET_CELL, Self::set_cell),
            (CHANGE_ACTIVE_CELL, Self::change_active_cell),
            (CELL_VALUE, Self::cell_value),
            (CELL_OUTPUTS, Self::cell_outputs),
            (CLEAR_OUTPUTS, Self::clear_outputs),
            (ENABLE_OUTPUT_SCROLLING, Self::enable_output_scrolling),
            (DISABLE_OUTPUT_SCROLLING, Self::disable_output_scrolling),
            (SELECT_ALL, Self::select_all),
            (DESELECT_ALL, Self::deselect_all),
            (SELECT_ABOVE, Self::select_above),
            (SELECT_BELOW, Self::select_below),
            (EXECUTE_CELL, Self::execute_cell),
        ];
        for (name, method) in table {
            bind(registry, name, self, method)?;
        }
        Ok(())
    }

    /// Run `f` against the document with the pause token held
    fn mutate<T>(&self, f: impl FnOnce(&mut D) -> Result<T, DocumentError>) -> Result<T, ActionFailure> {
        let _guard = self.pause.hold();
        let mut document = self.document.lock();
        f(&mut document).map_err(Into::into)
    }

    /// `[index, cell]`
    fn add_cell(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        let cell: Cell = args.get(1)?;
        self.mutate(|doc| doc.insert_cell(index, cell))?;
        Ok(Value::Null)
    }

    /// `[index]`, returns the removed cell
    fn remove_cell(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        let removed = self.mutate(|doc| doc.remove_cell(index))?;
        Ok(removed.to_value())
    }

    /// `[from, to]`
    fn move_cell(&self, args: &Args) -> Result<Value, ActionFailure> {
        let from: usize = args.get(0)?;
        let to: usize = args.get(1)?;
        self.mutate(|doc| doc.move_cell(from, to))?;
        Ok(Value::Null)
    }

    /// `[index, cell]`, returns the replaced cell
    fn set_cell(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        let cell: Cell = args.get(1)?;
        let previous = self.mutate(|doc| doc.set_cell(index, cell))?;
        Ok(previous.to_value())
    }

    /// `[index | null]`, returns the previous focus
    fn change_active_cell(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: Option<usize> = args.optional(0)?;
        let previous = self.mutate(|doc| doc.set_active_cell(index))?;
        Ok(json!(previous))
    }

    /// `[index, text]`, returns the previous text
    fn cell_value(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        let text: String = args.get(1)?;
        let previous = self.mutate(|doc| doc.set_cell_text(index, &text))?;
        Ok(Value::String(previous))
    }

    /// `[index, outputs]`, returns the previous outputs
    fn cell_outputs(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        let outputs: Vec<Value> = args.get(1)?;
        let previous = self.mutate(|doc| doc.set_outputs(index, outputs))?;
        Ok(Value::Array(previous))
    }

    /// `[index]`, returns the cleared outputs
    fn clear_outputs(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        let previous = self.mutate(|doc| doc.set_outputs(index, Vec::new()))?;
        Ok(Value::Array(previous))
    }

    fn enable_output_scrolling(&self, _args: &Args) -> Result<Value, ActionFailure> {
        self.mutate(|doc| {
            doc.set_output_scrolling(true);
            Ok(Value::Null)
        })
    }

    fn disable_output_scrolling(&self, _args: &Args) -> Result<Value, ActionFailure> {
        self.mutate(|doc| {
            doc.set_output_scrolling(false);
            Ok(Value::Null)
        })
    }

    fn select_all(&self, _args: &Args) -> Result<Value, ActionFailure> {
        self.mutate(|doc| {
            doc.select_all();
            Ok(Value::Null)
        })
    }

    fn deselect_all(&self, _args: &Args) -> Result<Value, ActionFailure> {
        self.mutate(|doc| {
            doc.deselect_all();
            Ok(Value::Null)
        })
    }

    fn select_above(&self, _args: &Args) -> Result<Value, ActionFailure> {
        self.mutate(|doc| {
            doc.select_above();
            Ok(Value::Null)
        })
    }

    fn select_below(&self, _args: &Args) -> Result<Value, ActionFailure> {
        self.mutate(|doc| {
            doc.select_below();
            Ok(Value::Null)
        })
    }

    /// `[index]`
    fn execute_cell(&self, args: &Args) -> Result<Value, ActionFailure> {
        let index: usize = args.get(0)?;
        self.mutate(|doc| doc.execute_cell(index))?;
        Ok(Value::Null)
    }
}

impl<D> std::fmt::Debug for NotebookFunctions<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookFunctions")
            .field("paused", &self.pause.is_paused())
            .finish_non_exhaustive()
    }
}

fn bind<D: NotebookDocument>(
    registry: &mut ActionFunctionRegistry,
    name: &str,
    functions: &Arc<NotebookFunctions<D>>,
    method: Method<D>,
) -> Result<(), ProvenanceError> {
    registry.register(
        name,
        Arc::clone(functions),
        move |functions: Arc<NotebookFunctions<D>>, args: Args| async move { method(&functions, &args) },
    )
}
