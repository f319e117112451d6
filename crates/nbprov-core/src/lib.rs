//! nbprov core - provenance engine
//!
//! Records document mutations as actions in an append-only history tree and
//! replays them to move between arbitrary points of that history.
//!
//! # Core Concepts
//!
//! - [`Action`]: named forward function with optional named inverse
//! - [`ActionFunctionRegistry`]: name → bound function table used at replay time
//! - [`ProvenanceGraph`]: the history tree and its `current` pointer
//! - [`ProvenanceTracker`]: records new actions at `current`
//! - [`ProvenanceGraphTraverser`]: walks undo/do chains between nodes
//! - [`PauseFlag`]: keeps replayed mutations from being recorded again
//!
//! # Example
//!
//! ```rust,ignore
//! let pause = PauseFlag::new();
//! let registry = Arc::new(registry);
//! let graph = ProvenanceGraph::new(GraphMetadata::default()).into_shared();
//! let tracker = ProvenanceTracker::new(registry.clone(), graph.clone(), pause.clone());
//! let traverser = ProvenanceGraphTraverser::new(registry, graph.clone(), pause);
//!
//! let first = tracker.apply_action(action, false).await?;
//! traverser.to_node(graph.read().root()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod action;
pub mod error;
pub mod graph;
pub mod pause;
pub mod registry;
pub mod serialize;
pub mod tracker;
pub mod traverser;

pub use action::{Action, Args};
pub use error::{ActionFailure, ArgumentError, ProvenanceError};
pub use graph::{GraphEvent, GraphMetadata, NodeId, ProvenanceGraph, ProvenanceNode, SharedGraph};
pub use pause::{PauseFlag, PauseGuard};
pub use registry::{ActionFunction, ActionFunctionRegistry, RegistryEntry};
pub use serialize::{restore, serialize, SerializedGraph, SerializedNode};
pub use tracker::ProvenanceTracker;
pub use traverser::{ProvenanceGraphTraverser, StepDirection, TraversalPlan, TraversalStep};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
