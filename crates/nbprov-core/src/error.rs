//! Error types for the provenance engine
//!
//! Every fallible engine operation returns [`ProvenanceError`]. Action
//! functions report their own failures as [`ActionFailure`], which the
//! registry wraps into [`ProvenanceError::ActionExecution`].

use crate::graph::NodeId;

/// Boxed error raised by an action function
pub type ActionFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main provenance error type
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    /// An action function with this name is already registered
    #[error("action function already registered: {0}")]
    DuplicateActionName(String),

    /// No action function is registered under this name
    #[error("unknown action function: {0}")]
    UnknownAction(String),

    /// A forward or inverse function failed
    #[error("action function `{name}` failed: {source}")]
    ActionExecution {
        /// Registered name of the failing function
        name: String,
        /// Error raised by the function
        #[source]
        source: ActionFailure,
    },

    /// An edge on the way up to the common ancestor has no inverse
    #[error("irreversible action `{action}` at node {node} blocks traversal")]
    IrreversibleActionBlocksTraversal {
        /// Node whose incoming edge cannot be undone
        node: NodeId,
        /// Forward name of the blocking action
        action: String,
    },

    /// Parent node is not part of this graph
    #[error("invalid parent node: {0}")]
    InvalidParent(NodeId),

    /// Node is not part of this graph
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A step failed in the middle of a validated traversal
    #[error("traversal to {target} interrupted at {reached}: {source}")]
    TraversalInterrupted {
        /// Last node successfully reached; `current` points here
        reached: NodeId,
        /// Requested destination
        target: NodeId,
        /// The failing step's error
        #[source]
        source: Box<ProvenanceError>,
    },

    /// Serialized graph is structurally invalid
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// JSON encoding or decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvenanceError {
    /// True when the caller can keep using the graph after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidParent(_) | Self::InvalidSnapshot(_) | Self::TraversalInterrupted { .. }
        )
    }

    /// True when the failure is known to have left the document untouched
    ///
    /// `TraversalInterrupted` is the one case where the document and the
    /// graph may disagree afterwards.
    #[must_use]
    pub fn leaves_document_unchanged(&self) -> bool {
        match self {
            Self::TraversalInterrupted { .. } => false,
            // A failing function may have partially mutated before raising
            Self::ActionExecution { .. } => false,
            _ => true,
        }
    }

    pub(crate) fn execution(name: &str, source: ActionFailure) -> Self {
        Self::ActionExecution {
            name: name.to_string(),
            source,
        }
    }
}

/// Argument decoding error raised by [`crate::Args`]
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    /// Required positional argument is absent
    #[error("missing argument at position {0}")]
    Missing(usize),

    /// Argument could not be decoded into the requested type
    #[error("invalid argument at position {position}: {source}")]
    Invalid {
        /// Zero-based argument position
        position: usize,
        /// Decoding failure
        #[source]
        source: serde_json::Error,
    },
}
