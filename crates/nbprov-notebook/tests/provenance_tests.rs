use nbprov_core::{Action, GraphEvent, ProvenanceError};
use nbprov_notebook::{
    Cell, NotebookDocument, NotebookError, NotebookProvenance, ProvenanceConfig, SharedDocument, NOTEBOOK_ARTIFACT,
};
use nbprov_test_utils::InMemoryNotebook;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

type Tracked = NotebookProvenance<InMemoryNotebook>;

fn tracked_with(notebook: InMemoryNotebook, config: ProvenanceConfig) -> (SharedDocument<InMemoryNotebook>, Tracked) {
    let document = notebook.into_shared();
    let provenance = NotebookProvenance::attach(Arc::clone(&document), config).unwrap();
    document.lock().set_observer(provenance.observer());
    (document, provenance)
}

fn tracked() -> (SharedDocument<InMemoryNotebook>, Tracked) {
    tracked_with(InMemoryNotebook::new(), ProvenanceConfig::default())
}

fn action_of(provenance: &Tracked, node: nbprov_core::NodeId) -> Action {
    provenance.graph().read().incoming_action(node).cloned().unwrap()
}

#[tokio::test]
async fn test_two_inserts_then_walk_back() {
    let (document, provenance) = tracked();
    let root = provenance.current();

    document.lock().insert_cell(0, Cell::code("a")).unwrap();
    document.lock().insert_cell(1, Cell::code("b")).unwrap();
    let nodes = provenance.record_pending().await.unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(document.lock().cell_sources(), vec!["a", "b"]);

    provenance.to_node(nodes[0]).await.unwrap();
    assert_eq!(document.lock().cell_sources(), vec!["a"]);
    assert_eq!(provenance.current(), nodes[0]);

    provenance.to_node(root).await.unwrap();
    assert!(document.lock().cell_sources().is_empty());
    assert_eq!(provenance.current(), root);

    // Replayed mutations were not recorded again
    assert!(provenance.record_pending().await.unwrap().is_empty());
    assert_eq!(provenance.graph().read().len(), 3);
}

#[tokio::test]
async fn test_replay_mutations_are_never_recorded() {
    let (document, provenance) = tracked();
    document.lock().insert_cell(0, Cell::code("x")).unwrap();
    document.lock().set_active_cell(Some(0)).unwrap();
    document.lock().select_all();
    provenance.record_pending().await.unwrap();
    let recorded = provenance.graph().read().len();

    for _ in 0..5 {
        provenance.undo().await.unwrap();
    }
    for _ in 0..5 {
        provenance.redo().await.unwrap();
    }

    assert!(provenance.flush_edits().await.unwrap().is_empty());
    assert_eq!(provenance.graph().read().len(), recorded);
    assert!(!provenance.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_two_text_bursts() {
    let (document, provenance) = tracked();
    document.lock().insert_cell(0, Cell::code("x")).unwrap();

    document.lock().set_cell_text(0, "y").unwrap();
    // Burst still open: only the insert is recorded
    assert_eq!(provenance.record_pending().await.unwrap().len(), 1);

    tokio::time::advance(Duration::from_millis(1200)).await;
    document.lock().set_cell_text(0, "z").unwrap();
    let edits = provenance.flush_edits().await.unwrap();
    assert_eq!(edits.len(), 2);

    assert_eq!(
        action_of(&provenance, edits[0]),
        Action::reversible("cellValue", vec![json!(0), json!("y")], "cellValue", vec![json!(0), json!("x")])
    );
    assert_eq!(
        action_of(&provenance, edits[1]),
        Action::reversible("cellValue", vec![json!(0), json!("z")], "cellValue", vec![json!(0), json!("y")])
    );

    provenance.undo().await.unwrap();
    assert_eq!(document.lock().cell_sources(), vec!["y"]);
    provenance.undo().await.unwrap();
    assert_eq!(document.lock().cell_sources(), vec!["x"]);
}

#[tokio::test(start_paused = true)]
async fn test_burst_recorded_once_window_elapses() {
    let (document, provenance) = tracked_with(
        InMemoryNotebook::with_cells(vec![Cell::markdown("")]),
        ProvenanceConfig::default(),
    );
    for text in ["#", "# ", "# T", "# Ti"] {
        document.lock().set_cell_text(0, text).unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
    }
    assert!(provenance.record_pending().await.unwrap().is_empty());

    tokio::time::advance(Duration::from_millis(900)).await;
    let nodes = provenance.record_pending().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(action_of(&provenance, nodes[0]).do_arguments, vec![json!(0), json!("# Ti")]);
}

#[tokio::test]
async fn test_executed_code_cell_blocks_walking_back() {
    let (document, provenance) = tracked();
    document.lock().insert_cell(0, Cell::code("print(1)")).unwrap();
    let inserted = provenance.record_pending().await.unwrap()[0];

    document.lock().execute_cell(0).unwrap();
    let executed = provenance.record_pending().await.unwrap();
    assert_eq!(executed.len(), 1);
    assert!(!action_of(&provenance, executed[0]).is_reversible());

    let err = provenance.undo().await.unwrap_err();
    assert!(matches!(
        err.as_provenance(),
        Some(ProvenanceError::IrreversibleActionBlocksTraversal { node, .. }) if *node == executed[0]
    ));
    assert!(provenance.to_node(inserted).await.is_err());
    assert_eq!(provenance.current(), executed[0]);
    assert_eq!(document.lock().executions(), &[0]);
}

#[tokio::test]
async fn test_executed_markdown_cell_undoes_by_clearing_outputs() {
    let (document, provenance) = tracked_with(
        InMemoryNotebook::with_cells(vec![Cell::markdown("*hi*")]),
        ProvenanceConfig::default(),
    );
    document.lock().execute_cell(0).unwrap();
    let rendered = provenance.record_pending().await.unwrap()[0];
    let action = action_of(&provenance, rendered);
    assert_eq!(action.undo_name.as_deref(), Some("clearOutputs"));

    assert!(provenance.undo().await.unwrap().is_some());
}

#[tokio::test]
async fn test_structural_edits_round_trip() {
    let cells = vec![Cell::code("a"), Cell::code("b"), Cell::code("c")];
    let (document, provenance) = tracked_with(InMemoryNotebook::with_cells(cells), ProvenanceConfig::default());
    let root = provenance.current();

    document.lock().move_cell(0, 2).unwrap();
    document.lock().set_cell(1, Cell::markdown("C")).unwrap();
    document.lock().remove_cell(0).unwrap();
    document.lock().set_active_cell(Some(1)).unwrap();
    let nodes = provenance.record_pending().await.unwrap();
    assert_eq!(nodes.len(), 4);
    assert_eq!(document.lock().cell_sources(), vec!["C", "a"]);
    assert_eq!(document.lock().active_cell(), Some(1));

    provenance.to_node(root).await.unwrap();
    assert_eq!(document.lock().cell_sources(), vec!["a", "b", "c"]);
    assert_eq!(document.lock().active_cell(), None);

    provenance.to_node(nodes[3]).await.unwrap();
    assert_eq!(document.lock().cell_sources(), vec!["C", "a"]);
    assert_eq!(document.lock().cells()[0], Cell::markdown("C"));
}

#[tokio::test]
async fn test_selection_commands_replay() {
    let cells = vec![Cell::code("a"), Cell::code("b")];
    let (document, provenance) = tracked_with(InMemoryNotebook::with_cells(cells), ProvenanceConfig::default());
    document.lock().select_all();
    document.lock().set_output_scrolling(true);
    provenance.record_pending().await.unwrap();

    provenance.undo().await.unwrap();
    assert!(!document.lock().output_scrolling());
    provenance.undo().await.unwrap();
    assert!(document.lock().selected().is_empty());

    provenance.redo().await.unwrap();
    assert_eq!(document.lock().selected(), vec![0, 1]);
}

#[tokio::test]
async fn test_apply_runs_and_records_once() {
    let (document, provenance) = tracked();
    let action = Action::reversible(
        "addCell",
        vec![json!(0), Cell::code("x").to_value()],
        "removeCell",
        vec![json!(0)],
    );
    let node = provenance.apply(action).await.unwrap();

    assert_eq!(document.lock().cell_sources(), vec!["x"]);
    assert_eq!(provenance.current(), node);
    assert!(provenance.flush_edits().await.unwrap().is_empty());
    assert_eq!(provenance.graph().read().len(), 2);
}

#[tokio::test]
async fn test_apply_of_unknown_action_records_nothing() {
    let (_document, provenance) = tracked();
    let err = provenance
        .apply(Action::irreversible("restartKernel", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err.as_provenance(), Some(ProvenanceError::UnknownAction(_))));
    assert_eq!(provenance.graph().read().len(), 1);
}

#[tokio::test]
async fn test_undo_at_root_and_redo_at_leaf() {
    let (document, provenance) = tracked();
    assert_eq!(provenance.undo().await.unwrap(), None);

    document.lock().insert_cell(0, Cell::code("a")).unwrap();
    let node = provenance.record_pending().await.unwrap()[0];
    assert_eq!(provenance.redo().await.unwrap(), None);
    assert_eq!(provenance.undo().await.unwrap(), Some(provenance.graph().read().root()));
    assert_eq!(provenance.redo().await.unwrap(), Some(node));
}

#[tokio::test]
async fn test_redo_follows_most_recent_branch() {
    let (document, provenance) = tracked();
    let root = provenance.current();
    document.lock().insert_cell(0, Cell::code("first")).unwrap();
    provenance.record_pending().await.unwrap();
    provenance.undo().await.unwrap();

    document.lock().insert_cell(0, Cell::code("second")).unwrap();
    let second = provenance.record_pending().await.unwrap()[0];
    provenance.to_node(root).await.unwrap();

    assert_eq!(provenance.redo().await.unwrap(), Some(second));
    assert_eq!(document.lock().cell_sources(), vec!["second"]);
}

#[tokio::test]
async fn test_operations_run_in_arrival_order() {
    let (document, provenance) = tracked();
    for (index, text) in ["a", "b", "c"].into_iter().enumerate() {
        document.lock().insert_cell(index, Cell::code(text)).unwrap();
    }
    let nodes = provenance.record_pending().await.unwrap();

    let (first, second, third) = tokio::join!(provenance.undo(), provenance.undo(), provenance.redo());
    assert_eq!(first.unwrap(), Some(nodes[1]));
    assert_eq!(second.unwrap(), Some(nodes[0]));
    assert_eq!(third.unwrap(), Some(nodes[1]));
    assert_eq!(document.lock().cell_sources(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_graph_persists_into_metadata_and_restores() {
    let (document, provenance) = tracked();
    document.lock().insert_cell(0, Cell::code("a")).unwrap();
    document.lock().insert_cell(1, Cell::code("b")).unwrap();
    let nodes = provenance.record_pending().await.unwrap();
    provenance.undo().await.unwrap();

    let stored = document.lock().metadata("provenance").unwrap();
    assert_eq!(stored["current"], json!(nodes[0].to_string()));

    let mut metadata = Map::new();
    metadata.insert("provenance".into(), stored);
    let mut reopened = InMemoryNotebook::with_cells(vec![Cell::code("a")]);
    reopened.set_raw_metadata(metadata);
    let (reopened_doc, restored) = tracked_with(reopened, ProvenanceConfig::default());

    assert_eq!(restored.current(), nodes[0]);
    assert_eq!(restored.graph().read().len(), 3);
    restored.redo().await.unwrap();
    assert_eq!(reopened_doc.lock().cell_sources(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_persist_uses_configured_key() {
    let config = ProvenanceConfig::default()
        .with_metadata_key("history")
        .with_persist_on_node_added(false);
    let (document, provenance) = tracked_with(InMemoryNotebook::new(), config);
    document.lock().insert_cell(0, Cell::raw("r")).unwrap();
    provenance.record_pending().await.unwrap();
    assert!(document.lock().metadata("history").is_none());

    provenance.persist().await.unwrap();
    let stored = document.lock().metadata("history").unwrap();
    assert_eq!(stored["nodes"].as_array().map(Vec::len), Some(2));
    assert!(document.lock().metadata("provenance").is_none());
}

#[tokio::test]
async fn test_attach_rejects_corrupt_metadata() {
    let mut metadata = Map::new();
    metadata.insert("provenance".into(), json!({ "nodes": "nope" }));
    let mut notebook = InMemoryNotebook::new();
    notebook.set_raw_metadata(metadata);

    let err = NotebookProvenance::attach(notebook.into_shared(), ProvenanceConfig::default()).unwrap_err();
    assert!(matches!(err, NotebookError::Provenance(ProvenanceError::Json(_))));
}

#[tokio::test]
async fn test_attach_treats_null_metadata_as_fresh() {
    let mut metadata = Map::new();
    metadata.insert("provenance".into(), Value::Null);
    let mut notebook = InMemoryNotebook::new();
    notebook.set_raw_metadata(metadata);

    let provenance = NotebookProvenance::attach(notebook.into_shared(), ProvenanceConfig::default()).unwrap();
    assert_eq!(provenance.graph().read().len(), 1);
    assert_eq!(provenance.registry().len(), nbprov_notebook::FUNCTION_NAMES.len());
}

#[tokio::test]
async fn test_attach_rejects_invalid_config() {
    let config = ProvenanceConfig::default().with_quiescence(Duration::ZERO);
    let err = NotebookProvenance::attach(InMemoryNotebook::new().into_shared(), config).unwrap_err();
    assert!(matches!(err, NotebookError::Config(_)));
}

#[tokio::test]
async fn test_snapshot_artifacts_carry_document() {
    let config = ProvenanceConfig::default().with_snapshot_artifacts(true);
    let (document, provenance) = tracked_with(InMemoryNotebook::new(), config);
    document.lock().insert_cell(0, Cell::code("a")).unwrap();
    document.lock().insert_cell(1, Cell::code("b")).unwrap();
    let nodes = provenance.record_pending().await.unwrap();

    let graph = provenance.graph().read();
    let first = &graph.node(nodes[0]).unwrap().artifacts[NOTEBOOK_ARTIFACT];
    assert_eq!(first["cells"].as_array().map(Vec::len), Some(1));
    assert_eq!(first["cells"][0]["source"], json!("a"));
    let second = &graph.node(nodes[1]).unwrap().artifacts[NOTEBOOK_ARTIFACT];
    assert_eq!(second["cells"].as_array().map(Vec::len), Some(2));
    assert!(second["metadata"].get("provenance").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_text_burst_artifact_reflects_its_last_edit() {
    let config = ProvenanceConfig::default().with_snapshot_artifacts(true);
    let (document, provenance) = tracked_with(InMemoryNotebook::with_cells(vec![Cell::code("")]), config);

    document.lock().set_cell_text(0, "x").unwrap();
    tokio::time::advance(Duration::from_millis(200)).await;
    document.lock().set_cell_text(0, "xy").unwrap();
    // Closes the burst, but the document has moved on by the time it is recorded
    document.lock().insert_cell(1, Cell::markdown("notes")).unwrap();
    document.lock().set_cell_text(1, "notes!").unwrap();
    let nodes = provenance.flush_edits().await.unwrap();
    assert_eq!(nodes.len(), 3);

    let graph = provenance.graph().read();
    let notebook = |id| graph.node(id).unwrap().artifacts[NOTEBOOK_ARTIFACT].clone();
    assert_eq!(notebook(nodes[0])["cells"], json!([Cell::code("xy").to_value()]));
    assert_eq!(
        notebook(nodes[1])["cells"],
        json!([Cell::code("xy").to_value(), Cell::markdown("notes").to_value()])
    );
    assert_eq!(notebook(nodes[2])["cells"][1]["source"], json!("notes!"));
}

#[tokio::test(start_paused = true)]
async fn test_automatic_refresh_leaves_open_burst_to_persist() {
    let config = ProvenanceConfig::default().with_persist_on_node_added(true);
    let (document, provenance) = tracked_with(InMemoryNotebook::new(), config);
    let stored_nodes = |document: &SharedDocument<InMemoryNotebook>| {
        document.lock().metadata("provenance").unwrap()["nodes"].as_array().map(Vec::len)
    };

    document.lock().insert_cell(0, Cell::code("")).unwrap();
    provenance.record_pending().await.unwrap();
    assert_eq!(stored_nodes(&document), Some(2));

    document.lock().set_cell_text(0, "draft").unwrap();
    assert!(provenance.record_pending().await.unwrap().is_empty());
    assert_eq!(stored_nodes(&document), Some(2));

    provenance.persist().await.unwrap();
    assert_eq!(stored_nodes(&document), Some(3));
}

#[tokio::test]
async fn test_snapshot_flushes_open_burst() {
    let (document, provenance) = tracked_with(
        InMemoryNotebook::with_cells(vec![Cell::code("")]),
        ProvenanceConfig::default(),
    );
    document.lock().set_cell_text(0, "x = 1").unwrap();

    let snapshot = provenance.snapshot().await.unwrap();
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.nodes[1].label, "cellValue");
}

#[tokio::test]
async fn test_node_added_notifies_subscribers() {
    let (document, provenance) = tracked();
    let mut events = provenance.subscribe();
    document.lock().insert_cell(0, Cell::code("a")).unwrap();
    let nodes = provenance.record_pending().await.unwrap();

    let mut added = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let GraphEvent::NodeAdded(id) = event {
            added.push(id);
        }
    }
    assert_eq!(added, nodes);
}

#[tokio::test(start_paused = true)]
async fn test_background_recorder_drains_queue() {
    let (document, provenance) = tracked();
    let provenance = Arc::new(provenance);
    let recorder = provenance.spawn_recorder();

    document.lock().insert_cell(0, Cell::code("a")).unwrap();
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        if provenance.graph().read().len() == 2 {
            break;
        }
    }
    assert_eq!(provenance.graph().read().len(), 2);

    drop(provenance);
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(recorder.is_finished());
}

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, String),
    Remove(usize),
    Move(usize, usize),
    Text(usize, String),
}

fn edit() -> impl proptest::strategy::Strategy<Value = Edit> {
    use proptest::prelude::*;
    prop_oneof![
        (any::<usize>(), "[a-z]{1,4}").prop_map(|(i, s)| Edit::Insert(i, s)),
        any::<usize>().prop_map(Edit::Remove),
        (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Edit::Move(i, j)),
        (any::<usize>(), "[a-z]{0,4}").prop_map(|(i, s)| Edit::Text(i, s)),
    ]
}

/// Apply `edit` as a user would, cell indices taken modulo the cell count
fn perform(document: &SharedDocument<InMemoryNotebook>, edit: &Edit) {
    let mut doc = document.lock();
    let len = doc.cell_count();
    match edit {
        Edit::Insert(i, text) => doc.insert_cell(i % (len + 1), Cell::code(text.as_str())).unwrap(),
        Edit::Remove(i) if len > 0 => {
            doc.remove_cell(i % len).unwrap();
        }
        Edit::Move(i, j) if len > 0 => doc.move_cell(i % len, j % len).unwrap(),
        Edit::Text(i, text) if len > 0 => {
            doc.set_cell_text(i % len, text).unwrap();
        }
        _ => {}
    }
}

proptest::proptest! {
    /// Walking to the root restores the initial cells; walking back restores the final ones
    #[test]
    fn prop_history_walk_restores_both_ends(edits in proptest::collection::vec(edit(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        let (initial, at_root, final_cells, at_tip) = runtime.block_on(async {
            let (document, provenance) = tracked_with(
                InMemoryNotebook::with_cells(vec![Cell::code("seed")]),
                ProvenanceConfig::default(),
            );
            let initial = document.lock().cell_sources();
            let root = provenance.current();
            for edit in &edits {
                perform(&document, edit);
                provenance.flush_edits().await.unwrap();
            }
            let final_cells = document.lock().cell_sources();
            let tip = provenance.current();

            provenance.to_node(root).await.unwrap();
            let at_root = document.lock().cell_sources();
            provenance.to_node(tip).await.unwrap();
            let at_tip = document.lock().cell_sources();
            (initial, at_root, final_cells, at_tip)
        });
        proptest::prop_assert_eq!(initial, at_root);
        proptest::prop_assert_eq!(final_cells, at_tip);
    }
}
