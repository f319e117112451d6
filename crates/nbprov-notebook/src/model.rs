//! Notebook data model and change notifications
//!
//! [`Cell`] mirrors the nbformat cell JSON closely enough that a cell
//! snapshot can travel inside action arguments and come back unchanged.

use crate::functions;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Kind of notebook cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// Executable source
    Code,
    /// Rendered prose
    Markdown,
    /// Passed through untouched
    Raw,
}

/// A notebook cell snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    /// Read from either a string or nbformat's list of lines
    #[serde(deserialize_with = "source_text")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<u32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Cell {
    #[must_use]
    pub fn new(cell_type: CellType, source: impl Into<String>) -> Self {
        Self {
            cell_type,
            source: source.into(),
            outputs: Vec::new(),
            execution_count: None,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellType::Code, source)
    }

    #[must_use]
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellType::Markdown, source)
    }

    #[must_use]
    pub fn raw(source: impl Into<String>) -> Self {
        Self::new(CellType::Raw, source)
    }

    /// Cell as a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        // Serializing plain data into a `Value` cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceText {
    Whole(String),
    Lines(Vec<String>),
}

fn source_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match SourceText::deserialize(deserializer)? {
        SourceText::Whole(text) => text,
        // Lines keep their own trailing newlines
        SourceText::Lines(lines) => lines.concat(),
    })
}

/// A change to the ordered cell list
#[derive(Debug, Clone, PartialEq)]
pub enum CellListChange {
    Insert { index: usize, cell: Cell },
    Remove { index: usize, cell: Cell },
    Move { from: usize, to: usize },
    /// Replacement in place, e.g. a cell type change
    Set { index: usize, previous: Cell, current: Cell },
}

/// Selection and view operations, named by the function that replays them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotebookCommand {
    SelectAll,
    DeselectAll,
    SelectAbove,
    SelectBelow,
    EnableOutputScrolling,
    DisableOutputScrolling,
}

impl NotebookCommand {
    /// Name of the action function that performs this command
    #[must_use]
    pub fn function_name(self) -> &'static str {
        match self {
            Self::SelectAll => functions::SELECT_ALL,
            Self::DeselectAll => functions::DESELECT_ALL,
            Self::SelectAbove => functions::SELECT_ABOVE,
            Self::SelectBelow => functions::SELECT_BELOW,
            Self::EnableOutputScrolling => functions::ENABLE_OUTPUT_SCROLLING,
            Self::DisableOutputScrolling => functions::DISABLE_OUTPUT_SCROLLING,
        }
    }
}

/// Notification sent by the document after it changed
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    CellsChanged(CellListChange),
    ActiveCellChanged {
        previous: Option<usize>,
        current: Option<usize>,
    },
    CellTextChanged {
        index: usize,
        previous: String,
        current: String,
    },
    OutputsChanged {
        index: usize,
        previous: Vec<Value>,
        current: Vec<Value>,
    },
    CellExecuted {
        index: usize,
        cell_type: CellType,
    },
    CommandInvoked(NotebookCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_json_matches_nbformat_keys() {
        let mut cell = Cell::code("print(1)");
        cell.execution_count = Some(3);
        assert_eq!(
            cell.to_value(),
            json!({
                "cell_type": "code",
                "source": "print(1)",
                "execution_count": 3,
                "metadata": {}
            })
        );
    }

    #[test]
    fn source_accepts_list_of_lines() {
        let cell: Cell = serde_json::from_value(json!({
            "cell_type": "code",
            "source": ["import os\n", "print(os.getcwd())"],
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(cell.source, "import os\nprint(os.getcwd())");
        assert_eq!(cell.to_value()["source"], json!("import os\nprint(os.getcwd())"));

        let empty: Cell = serde_json::from_value(json!({ "cell_type": "raw", "source": [] })).unwrap();
        assert_eq!(empty.source, "");
    }

    #[test]
    fn source_of_wrong_shape_is_rejected() {
        let parsed: Result<Cell, _> = serde_json::from_value(json!({ "cell_type": "code", "source": 7 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_cell_type_is_rejected() {
        let parsed: Result<Cell, _> = serde_json::from_value(json!({
            "cell_type": "widget",
            "source": ""
        }));
        assert!(parsed.is_err());
    }
}
