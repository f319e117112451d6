//! nbprov notebook binding
//!
//! Connects the provenance engine to a cell-based notebook document:
//!
//! - [`NotebookDocument`]: mutation primitives the host implements
//! - [`NotebookFunctions`]: the action function library over those primitives
//! - [`ChangeAdapter`]: document notifications to replay actions, with text
//!   edits coalesced by [`TextEditCoalescer`]
//! - [`NotebookProvenance`]: one tracked document, with undo/redo, time
//!   travel and persistence into the document metadata
//!
//! # Example
//!
//! ```rust,ignore
//! let document = Arc::new(Mutex::new(host_notebook));
//! let provenance = NotebookProvenance::attach(document.clone(), ProvenanceConfig::default())?;
//! document.lock().set_observer(provenance.observer());
//!
//! document.lock().insert_cell(0, Cell::code("x = 1"))?;
//! provenance.record_pending().await?;
//! provenance.undo().await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod adapter;
pub mod coalesce;
pub mod config;
pub mod document;
pub mod error;
pub mod functions;
pub mod model;
pub mod provenance;

pub use adapter::{notebook_artifacts, ChangeAdapter, QueuedChange, NOTEBOOK_ARTIFACT};
pub use coalesce::TextEditCoalescer;
pub use config::{ConfigError, ProvenanceConfig};
pub use document::{DocumentError, DocumentObserver, NotebookDocument, SharedDocument};
pub use error::NotebookError;
pub use functions::{NotebookFunctions, FUNCTION_NAMES};
pub use model::{Cell, CellListChange, CellType, DocumentEvent, NotebookCommand};
pub use provenance::NotebookProvenance;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
