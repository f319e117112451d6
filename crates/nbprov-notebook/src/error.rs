//! Notebook layer errors

use crate::config::ConfigError;
use nbprov_core::ProvenanceError;

/// Errors raised by [`crate::NotebookProvenance`]
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    /// Engine failure: registry, graph, traversal or snapshot
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    /// Rejected configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl NotebookError {
    /// Engine error, if this is one
    #[must_use]
    pub fn as_provenance(&self) -> Option<&ProvenanceError> {
        match self {
            Self::Provenance(err) => Some(err),
            Self::Config(_) => None,
        }
    }
}

impl From<serde_json::Error> for NotebookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Provenance(ProvenanceError::Json(err))
    }
}
