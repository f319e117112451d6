//! Provenance configuration

use nbprov_core::graph::DEFAULT_GRAPH_NAME;
use nbprov_core::GraphMetadata;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default document metadata slot for the serialized graph
pub const DEFAULT_METADATA_KEY: &str = "provenance";

/// Default text edit quiescence window in milliseconds
pub const DEFAULT_QUIESCENCE_MS: u64 = 1000;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a configuration
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Text edits would never coalesce
    #[error("quiescence window must be greater than zero")]
    ZeroQuiescence,

    /// The graph would be persisted nowhere
    #[error("metadata key must not be empty")]
    EmptyMetadataKey,
}

/// Per-document provenance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// Graph name recorded in snapshots
    pub graph_name: String,
    /// Graph version recorded in snapshots
    pub graph_version: String,
    /// Document metadata key holding the serialized graph
    pub metadata_key: String,
    /// Text edit quiescence window in milliseconds
    pub quiescence_ms: u64,
    /// Attach a full document snapshot to every recorded node
    pub snapshot_artifacts: bool,
    /// Refresh the metadata snapshot after every recorded node and traversal
    ///
    /// A text burst still inside its quiescence window is not part of these
    /// refreshes; `persist` flushes it first.
    pub persist_on_node_added: bool,
}

impl ProvenanceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    /// `Parse` for malformed TOML, or any [`validate`](Self::validate) error.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    ///
    /// # Errors
    /// `ZeroQuiescence` or `EmptyMetadataKey`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiescence_ms == 0 {
            return Err(ConfigError::ZeroQuiescence);
        }
        if self.metadata_key.is_empty() {
            return Err(ConfigError::EmptyMetadataKey);
        }
        Ok(())
    }

    /// With graph name
    #[inline]
    #[must_use]
    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = name.into();
        self
    }

    /// With graph version
    #[inline]
    #[must_use]
    pub fn with_graph_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = version.into();
        self
    }

    /// With metadata key
    #[inline]
    #[must_use]
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }

    /// With quiescence window
    #[inline]
    #[must_use]
    pub fn with_quiescence(mut self, window: Duration) -> Self {
        self.quiescence_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With per-node document snapshots
    #[inline]
    #[must_use]
    pub fn with_snapshot_artifacts(mut self, enabled: bool) -> Self {
        self.snapshot_artifacts = enabled;
        self
    }

    /// With metadata refresh after every node
    #[inline]
    #[must_use]
    pub fn with_persist_on_node_added(mut self, enabled: bool) -> Self {
        self.persist_on_node_added = enabled;
        self
    }

    /// Quiescence window as a duration
    #[must_use]
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    /// Metadata for a freshly created graph
    #[must_use]
    pub fn graph_metadata(&self) -> GraphMetadata {
        GraphMetadata::new(&self.graph_name, &self.graph_version)
    }
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            graph_name: DEFAULT_GRAPH_NAME.to_string(),
            graph_version: nbprov_core::VERSION.to_string(),
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            quiescence_ms: DEFAULT_QUIESCENCE_MS,
            snapshot_artifacts: false,
            persist_on_node_added: true,
        }
    }
}
