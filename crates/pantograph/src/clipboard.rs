//! Clipboard copy and paste.
//!
//! Copy produces a complete, self-contained [`DiagramModel`] holding the
//! selected nodes and the edges whose both endpoints are selected, so the
//! payload round-trips through the same schema as saved files. Paste
//! validates an untrusted payload, remaps ids that would collide with the
//! working set, and offsets positions slightly so the pasted copy does not
//! land exactly on top of its source.

use std::collections::{HashMap, HashSet};

use log::debug;
use uuid::Uuid;

use pantograph_core::model::DiagramModel;

use crate::error::PantographError;
use crate::workbench::Workbench;

/// Horizontal offset applied to pasted node positions.
pub const PASTE_OFFSET_X: f32 = 48.0;
/// Vertical offset applied to pasted node positions.
pub const PASTE_OFFSET_Y: f32 = 24.0;

/// Extracts the current selection as a standalone document.
///
/// Edges survive only when both endpoints are selected; a half-selected
/// edge would dangle in the payload.
pub fn copy_selection(bench: &Workbench) -> DiagramModel {
    let selected = bench.selected_nodes();
    let mut model = DiagramModel::empty();
    model.nodes = bench
        .nodes()
        .iter()
        .filter(|n| selected.contains(&n.id))
        .cloned()
        .collect();
    model.edges = bench
        .edges()
        .iter()
        .filter(|e| selected.contains(&e.source) && selected.contains(&e.target))
        .cloned()
        .collect();
    debug!(nodes = model.nodes.len(), edges = model.edges.len(); "Copied selection");
    model
}

/// Imports a clipboard payload into the working set.
///
/// The payload goes through full schema validation first; an invalid
/// payload is reported without touching the working set. Node ids that
/// collide with existing ids are remapped to fresh ones (edge endpoints
/// follow), edges referencing nodes outside the payload are dropped, and
/// every positioned node is shifted by the paste offset. The pasted nodes
/// become the new selection. Returns the pasted node ids.
pub fn paste(bench: &mut Workbench, payload: &str) -> Result<Vec<String>, PantographError> {
    let incoming = DiagramModel::from_json(payload)?;

    let existing: HashSet<String> = bench.nodes().iter().map(|n| n.id.clone()).collect();
    let mut remapped: HashMap<String, String> = HashMap::new();
    let pasted_ids: HashSet<String> = incoming.nodes.iter().map(|n| n.id.clone()).collect();

    let mut new_ids = Vec::with_capacity(incoming.nodes.len());
    for mut node in incoming.nodes {
        if existing.contains(&node.id) {
            let fresh = Uuid::new_v4().to_string();
            remapped.insert(node.id.clone(), fresh.clone());
            node.id = fresh;
        }
        node.position = node
            .position
            .map(|p| p.translate(PASTE_OFFSET_X, PASTE_OFFSET_Y));
        new_ids.push(node.id.clone());
        bench.push_node(node);
    }

    let mut kept_edges = 0;
    for mut edge in incoming.edges {
        // Edges referencing nodes outside the payload are dropped.
        if !pasted_ids.contains(&edge.source) || !pasted_ids.contains(&edge.target) {
            debug!(edge_id = edge.id.as_str(); "Dropping dangling clipboard edge");
            continue;
        }
        if let Some(fresh) = remapped.get(&edge.source) {
            edge.source = fresh.clone();
        }
        if let Some(fresh) = remapped.get(&edge.target) {
            edge.target = fresh.clone();
        }
        edge.id = Uuid::new_v4().to_string();
        bench.push_edge(edge);
        kept_edges += 1;
    }

    debug!(nodes = new_ids.len(), edges = kept_edges; "Pasted clipboard payload");
    bench.select_nodes(new_ids.iter().cloned());
    bench.mark_structural();
    Ok(new_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantograph_core::catalog::builtin_registry;
    use pantograph_core::geometry::Point;
    use pantograph_core::model::{DiagramEdge, DiagramNode};

    fn bench_with_chain() -> Workbench {
        let mut b = Workbench::new(builtin_registry());
        let mut model = DiagramModel::empty();
        for (id, kind, x) in [("u", "user", 0.0), ("s", "service", 200.0), ("d", "database", 400.0)] {
            let mut node = DiagramNode::new(id, kind);
            node.position = Some(Point::new(x, 100.0));
            model.nodes.push(node);
        }
        model.edges.push(DiagramEdge::new("e1", "u", "s"));
        model.edges.push(DiagramEdge::new("e2", "s", "d"));
        b.open(model);
        b
    }

    #[test]
    fn copy_keeps_only_fully_selected_edges() {
        let mut b = bench_with_chain();
        b.set_selection(["u".to_string(), "s".to_string()], []);

        let payload = copy_selection(&b);
        assert_eq!(payload.nodes.len(), 2);
        // e2 dangles outside the selection and is excluded.
        assert_eq!(payload.edges.len(), 1);
        assert_eq!(payload.edges[0].id, "e1");
    }

    #[test]
    fn paste_remaps_colliding_ids_and_offsets_positions() {
        let mut b = bench_with_chain();
        b.set_selection(["u".to_string(), "s".to_string()], []);
        let payload = copy_selection(&b).to_json().unwrap();

        let pasted = paste(&mut b, &payload).unwrap();
        assert_eq!(pasted.len(), 2);
        assert_eq!(b.nodes().len(), 5);
        // Colliding ids were replaced.
        for id in &pasted {
            assert_ne!(id, "u");
            assert_ne!(id, "s");
        }
        // The pasted edge follows the remapped endpoints.
        let pasted_edge = b
            .edges()
            .iter()
            .find(|e| pasted.contains(&e.source) && pasted.contains(&e.target))
            .expect("pasted edge present");
        assert_ne!(pasted_edge.id, "e1");

        // Offset applied relative to the originals.
        let original = b.find_node("u").unwrap().position.unwrap();
        let copy = b
            .nodes()
            .iter()
            .find(|n| pasted.contains(&n.id) && n.kind == "user")
            .unwrap();
        assert_eq!(
            copy.position.unwrap(),
            original.translate(PASTE_OFFSET_X, PASTE_OFFSET_Y)
        );
    }

    #[test]
    fn paste_selects_the_pasted_nodes() {
        let mut b = bench_with_chain();
        b.set_selection(["s".to_string()], []);
        let payload = copy_selection(&b).to_json().unwrap();

        let pasted = paste(&mut b, &payload).unwrap();
        assert_eq!(b.selected_nodes().len(), 1);
        assert!(b.selected_nodes().contains(&pasted[0]));
    }

    #[test]
    fn paste_drops_dangling_edges() {
        let mut b = bench_with_chain();
        let payload = r#"{
            "version": "1.0",
            "nodes": [{"id": "fresh", "kind": "service"}],
            "edges": [{"id": "e9", "source": "fresh", "target": "elsewhere"}]
        }"#;

        paste(&mut b, payload).unwrap();
        assert!(b.edges().iter().all(|e| e.id != "e9"));
        assert!(!b.edges().iter().any(|e| e.target == "elsewhere"));
    }

    #[test]
    fn invalid_payload_leaves_the_working_set_untouched() {
        let mut b = bench_with_chain();
        let nodes_before = b.nodes().to_vec();
        let edges_before = b.edges().to_vec();

        let err = paste(&mut b, "not json at all");
        assert!(matches!(err, Err(PantographError::Validation(_))));
        assert_eq!(b.nodes(), nodes_before.as_slice());
        assert_eq!(b.edges(), edges_before.as_slice());
    }

    #[test]
    fn non_colliding_ids_are_kept() {
        let mut b = bench_with_chain();
        let payload = r#"{
            "version": "1.0",
            "nodes": [{"id": "unique-42", "kind": "service"}],
            "edges": []
        }"#;
        let pasted = paste(&mut b, payload).unwrap();
        assert_eq!(pasted, vec!["unique-42".to_string()]);
    }
}
