//! Integration tests for the editing workflow
//!
//! These tests drive the public API the way an embedding application would:
//! load a document, edit it, undo, copy/paste, export a report, and persist
//! the result through a storage provider.

use pantograph::clipboard;
use pantograph::descriptor::DiagramDescriptor;
use pantograph::report::ReportBuilder;
use pantograph::storage::{FileHandle, Repository, StorageProvider};
use pantograph::{Workbench, storage::MemoryProvider};
use pantograph_core::catalog::builtin_registry;
use pantograph_core::geometry::Point;
use pantograph_core::model::DiagramModel;

fn sample_document() -> DiagramModel {
    DiagramModel::from_json(
        r#"{
            "version": "1.0",
            "createdAt": "2026-01-10T09:00:00Z",
            "nodes": [
                {"id": "customer", "kind": "user", "name": "Customer"},
                {"id": "gw", "kind": "gateway", "name": "Edge gateway"},
                {"id": "orders", "kind": "api", "name": "Orders API"},
                {"id": "billing", "kind": "service", "name": "Billing"},
                {"id": "ledger", "kind": "database", "name": "Ledger"}
            ],
            "edges": [
                {"id": "e1", "source": "customer", "target": "gw"},
                {"id": "e2", "source": "gw", "target": "orders", "sourceHandle": "children", "targetHandle": "parent"},
                {"id": "e3", "source": "gw", "target": "billing"},
                {"id": "e4", "source": "billing", "target": "ledger"}
            ]
        }"#,
    )
    .expect("sample document is valid")
}

#[test]
fn test_open_edit_serialize_round_trip() {
    let mut bench = Workbench::new(builtin_registry());
    bench.open(sample_document());

    // Hydration assigned a position to every node.
    assert!(bench.nodes().iter().all(|n| n.position.is_some()));

    let new_id = bench
        .add_element("external-service", Point::new(600.0, 50.0))
        .expect("known kind");
    bench
        .connect("billing", &new_id, None, None)
        .expect("service may call an external service");

    let saved = bench.serialize_at("2026-02-01T12:00:00Z");
    assert_eq!(saved.nodes.len(), 6);
    assert_eq!(saved.edges.len(), 5);
    assert_eq!(saved.created_at.as_deref(), Some("2026-01-10T09:00:00Z"));
    assert_eq!(saved.updated_at.as_deref(), Some("2026-02-01T12:00:00Z"));

    // The saved document loads back identically.
    let json = saved.to_json().expect("serializable");
    let reloaded = DiagramModel::from_json(&json).expect("round trip");
    assert_eq!(saved, reloaded);
}

#[test]
fn test_undo_restores_previous_structure() {
    let mut bench = Workbench::new(builtin_registry());
    bench.open(sample_document());

    let added = bench
        .add_element("service", Point::new(500.0, 300.0))
        .unwrap();
    bench.commit_history();
    assert_eq!(bench.nodes().len(), 6);

    assert!(bench.undo());
    assert_eq!(bench.nodes().len(), 5);
    assert!(bench.find_node(&added).is_none());

    assert!(bench.redo());
    assert_eq!(bench.nodes().len(), 6);
    assert!(bench.find_node(&added).is_some());
}

#[test]
fn test_copy_paste_duplicates_a_subgraph() {
    let mut bench = Workbench::new(builtin_registry());
    bench.open(sample_document());

    bench.set_selection(["billing".to_string(), "ledger".to_string()], []);
    let payload = clipboard::copy_selection(&bench).to_json().unwrap();
    let pasted = clipboard::paste(&mut bench, &payload).unwrap();

    assert_eq!(pasted.len(), 2);
    assert_eq!(bench.nodes().len(), 7);
    // The internal billing -> ledger edge came along, remapped.
    let copied_edge = bench
        .edges()
        .iter()
        .find(|e| pasted.contains(&e.source) && pasted.contains(&e.target));
    assert!(copied_edge.is_some());
}

#[test]
fn test_descriptor_and_report_over_live_document() {
    let mut bench = Workbench::new(builtin_registry());
    bench.open(sample_document());

    let model = bench.to_model();
    let descriptor = DiagramDescriptor::new(&model, bench.registry());

    // The customer reaches billing through the gateway.
    let billing = descriptor.find_node("billing").unwrap();
    let actors: Vec<_> = descriptor.upstream_actors(billing).map(|a| a.id()).collect();
    assert_eq!(actors, vec!["customer"]);

    // Containment surfaced on both sides.
    let gw = descriptor.find_node("gw").unwrap();
    assert_eq!(descriptor.children(gw).count(), 1);
    let orders = descriptor.find_node("orders").unwrap();
    assert_eq!(descriptor.parents(orders).count(), 1);

    let html = ReportBuilder::new(&descriptor).build();
    assert!(html.contains("Edge gateway"));
    assert!(html.contains("Orders API"));
    assert!(html.contains("<h2>Actors</h2>"));
}

#[test]
fn test_storage_round_trip() {
    let provider = MemoryProvider::new();
    let repo = provider.create_repository("architecture");

    let mut bench = Workbench::new(builtin_registry());
    bench.open(sample_document());
    let json = bench.serialize_at("2026-02-01T12:00:00Z").to_json().unwrap();

    let file = repo.create_file("app.json", &json).unwrap();

    // A second consumer lists and reloads the document.
    let repos = provider.list_repositories().unwrap();
    assert_eq!(repos.len(), 1);
    let files = repos[0].list_files().unwrap();
    assert_eq!(files.len(), 1);

    let reloaded = DiagramModel::from_json(&files[0].read().unwrap()).unwrap();
    assert_eq!(reloaded.nodes.len(), 5);

    file.delete().unwrap();
    assert!(repos[0].list_files().unwrap().is_empty());
}

#[test]
fn test_rejected_connection_leaves_document_unchanged() {
    let mut bench = Workbench::new(builtin_registry());
    bench.open(sample_document());
    let edges_before = bench.edges().len();

    // The ledger database cannot initiate a call.
    assert!(bench.connect("ledger", "billing", None, None).is_err());
    // A gateway cannot adopt a service as a child.
    assert!(
        bench
            .connect("gw", "billing", Some("children"), Some("parent"))
            .is_err()
    );

    assert_eq!(bench.edges().len(), edges_before);
}
