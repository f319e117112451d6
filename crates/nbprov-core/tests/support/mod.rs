//! Shared fixtures for engine tests

#![allow(dead_code)]

use nbprov_core::{
    ActionFailure, ActionFunctionRegistry, Args, GraphMetadata, PauseFlag, ProvenanceGraph,
    ProvenanceGraphTraverser, ProvenanceTracker, SharedGraph,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// A list of strings standing in for a document, plus a call journal
#[derive(Default)]
pub struct Journal {
    pub calls: Mutex<Vec<(String, Vec<Value>)>>,
    pub cells: Mutex<Vec<String>>,
    pub fail_on: Mutex<Option<String>>,
    pub pause: PauseFlag,
    pub paused_mutations: Mutex<usize>,
}

impl Journal {
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn cells(&self) -> Vec<String> {
        self.cells.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_on(&self, name: &str) {
        *self.fail_on.lock() = Some(name.to_string());
    }
}

async fn record(journal: Arc<Journal>, name: String, args: Args) -> Result<Value, ActionFailure> {
    journal.calls.lock().push((name.clone(), args.as_slice().to_vec()));
    if journal.fail_on.lock().as_deref() == Some(name.as_str()) {
        return Err(format!("{name} failed").into());
    }
    if journal.pause.is_paused() {
        *journal.paused_mutations.lock() += 1;
    }
    let mut cells = journal.cells.lock();
    match name.as_str() {
        "addCell" => {
            let index: usize = args.get(0)?;
            let value: String = args.get(1)?;
            if index > cells.len() {
                return Err(format!("index {index} out of range").into());
            }
            cells.insert(index, value);
            Ok(Value::Null)
        }
        "removeCell" => {
            let index: usize = args.get(0)?;
            if index >= cells.len() {
                return Err(format!("index {index} out of range").into());
            }
            Ok(json!(cells.remove(index)))
        }
        _ => Ok(Value::Null),
    }
}

pub const NAMES: &[&str] = &["addCell", "removeCell", "executeCell", "noop", "toggle"];

pub fn registry(journal: &Arc<Journal>) -> ActionFunctionRegistry {
    let mut registry = ActionFunctionRegistry::new();
    for name in NAMES {
        let name = (*name).to_string();
        let key = name.clone();
        registry
            .register(&key, Arc::clone(journal), move |journal, args| {
                record(journal, name.clone(), args)
            })
            .unwrap();
    }
    registry
}

pub struct Engine {
    pub journal: Arc<Journal>,
    pub graph: SharedGraph,
    pub tracker: ProvenanceTracker,
    pub traverser: ProvenanceGraphTraverser,
}

pub fn engine() -> Engine {
    let journal = Arc::new(Journal::default());
    let registry = Arc::new(registry(&journal));
    let graph = ProvenanceGraph::new(GraphMetadata::default()).into_shared();
    let pause = journal.pause.clone();
    Engine {
        tracker: ProvenanceTracker::new(Arc::clone(&registry), graph.clone(), pause.clone()),
        traverser: ProvenanceGraphTraverser::new(registry, graph.clone(), pause),
        journal,
        graph,
    }
}
