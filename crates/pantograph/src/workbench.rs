//! The editing working set and its single mutation path.
//!
//! A [`Workbench`] owns the live node and edge arrays of one open diagram,
//! the transient selection, and the undo/redo history. Every mutation goes
//! through a workbench method so history capture is never bypassed; the
//! methods classify their change and let [`crate::history::History`] decide
//! what becomes a snapshot.
//!
//! Dialogs are reached through the [`DialogHost`] seam: the workbench asks
//! the host to run an edit dialog and applies the outcome only when the
//! user accepted it. Cancellation is an outcome, not an error.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use log::{debug, info};
use uuid::Uuid;

use pantograph_core::element::{ConnectContext, ConnectError, ElementRegistry, ElementType};
use pantograph_core::geometry::{Point, Size};
use pantograph_core::model::{
    DiagramEdge, DiagramModel, DiagramNode, DiagramView, HANDLE_CHILDREN, HANDLE_PARENT, Props,
};

use crate::error::PantographError;
use crate::history::{ChangeClass, History, Snapshot};
use crate::layout::{HydratedDiagram, Hydrator};

/// Result of an edit dialog.
///
/// `accepted` distinguishes confirmation from cancellation; a canceled
/// dialog carries no data worth applying and must not mutate anything.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub accepted: bool,
    pub data: Props,
    pub title: Option<String>,
}

impl EditOutcome {
    pub fn canceled() -> Self {
        Self {
            accepted: false,
            data: Props::new(),
            title: None,
        }
    }
}

/// Host-side dialog surface.
///
/// The workbench never renders anything itself; the embedding application
/// implements this trait with whatever UI it has.
pub trait DialogHost {
    /// Runs the property-edit dialog for a node and returns its outcome.
    fn show_edit(&mut self, node: &DiagramNode, element: &dyn ElementType) -> EditOutcome;

    /// Presents a rendered HTML report.
    fn show_report(&mut self, html: &str);
}

/// The open diagram and everything needed to edit it.
pub struct Workbench {
    registry: ElementRegistry,
    nodes: Vec<DiagramNode>,
    edges: Vec<DiagramEdge>,
    views: Vec<DiagramView>,
    version: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    selected_nodes: HashSet<String>,
    selected_edges: HashSet<String>,
    history: History,
    hydrator: Hydrator,
}

impl Workbench {
    pub fn new(registry: ElementRegistry) -> Self {
        let mut bench = Self {
            registry,
            nodes: Vec::new(),
            edges: Vec::new(),
            views: Vec::new(),
            version: "1.0".to_string(),
            created_at: None,
            updated_at: None,
            selected_nodes: HashSet::new(),
            selected_edges: HashSet::new(),
            history: History::new(),
            hydrator: Hydrator::default(),
        };
        bench.history.seed(bench.snapshot());
        bench
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn nodes(&self) -> &[DiagramNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DiagramEdge] {
        &self.edges
    }

    pub fn views(&self) -> &[DiagramView] {
        &self.views
    }

    /// Opens a document: hydrates it, adopts the positioned nodes as the
    /// working set, and reseeds history with the loaded state.
    pub fn open(&mut self, model: DiagramModel) -> HydratedDiagram {
        self.hydrator.invalidate();
        let hydrated = match self.hydrator.hydrate(&model, &self.registry) {
            Some(hydrated) => hydrated,
            // Unreachable after invalidate, but recomputing is always safe.
            None => self.hydrator.engine().layout(&model, &self.registry),
        };

        self.version = model.version;
        self.created_at = model.created_at;
        self.updated_at = model.updated_at;
        self.views = model.views;
        self.edges = model.edges;
        self.nodes = model.nodes;
        for (node, positioned) in self.nodes.iter_mut().zip(&hydrated.nodes) {
            node.position = Some(positioned.position);
        }

        self.selected_nodes.clear();
        self.selected_edges.clear();
        self.history.seed(self.snapshot());
        info!(nodes = self.nodes.len(), edges = self.edges.len(); "Opened diagram");
        hydrated
    }

    /// The working set as a persisted document, without touching timestamps.
    pub fn to_model(&self) -> DiagramModel {
        DiagramModel {
            version: self.version.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            views: self.views.clone(),
        }
    }

    /// Serializes for saving: the working set with `updated_at` refreshed
    /// to the current time (and `created_at` set on first save).
    pub fn serialize(&mut self) -> DiagramModel {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.serialize_at(&now)
    }

    pub fn serialize_at(&mut self, now_rfc3339: &str) -> DiagramModel {
        let mut model = self.to_model();
        model.touch(now_rfc3339);
        self.created_at = model.created_at.clone();
        self.updated_at = model.updated_at.clone();
        model
    }

    /// Adds a node of the given kind at a position, with the type's default
    /// properties. Returns the new node's id.
    pub fn add_element(
        &mut self,
        kind: &str,
        position: Point,
    ) -> Result<String, PantographError> {
        let element = self
            .registry
            .lookup(kind)
            .ok_or_else(|| PantographError::UnknownKind(kind.to_string()))?;

        let mut node = DiagramNode::new(Uuid::new_v4().to_string(), kind);
        node.props = element.default_props();
        node.position = Some(position);
        let id = node.id.clone();
        debug!(node_id = id.as_str(), kind = kind; "Added element");
        self.nodes.push(node);
        self.changed(ChangeClass::Structural);
        Ok(id)
    }

    /// Removes the selected nodes and edges, plus every edge incident to a
    /// removed node.
    pub fn delete_selection(&mut self) {
        if self.selected_nodes.is_empty() && self.selected_edges.is_empty() {
            return;
        }
        let removed_nodes = std::mem::take(&mut self.selected_nodes);
        let removed_edges = std::mem::take(&mut self.selected_edges);

        self.nodes.retain(|n| !removed_nodes.contains(&n.id));
        self.edges.retain(|e| {
            !removed_edges.contains(&e.id)
                && !removed_nodes.contains(&e.source)
                && !removed_nodes.contains(&e.target)
        });
        debug!(nodes = removed_nodes.len(), edges = removed_edges.len(); "Deleted selection");
        self.changed(ChangeClass::Structural);
    }

    /// Attempts a connection between two nodes.
    ///
    /// Vertical handles must pair exactly `children` (source, the parent)
    /// to `parent` (target, the child); every other combination involving a
    /// vertical handle is rejected. Capability flags are checked first,
    /// then both endpoint types' verify hooks. A rejected connection leaves
    /// the edge set untouched.
    pub fn connect(
        &mut self,
        source_id: &str,
        target_id: &str,
        source_handle: Option<&str>,
        target_handle: Option<&str>,
    ) -> Result<String, PantographError> {
        if source_id == target_id {
            return Err(ConnectError::new("a node cannot connect to itself").into());
        }
        let source = self
            .find_node(source_id)
            .ok_or_else(|| PantographError::NodeNotFound(source_id.to_string()))?
            .clone();
        let target = self
            .find_node(target_id)
            .ok_or_else(|| PantographError::NodeNotFound(target_id.to_string()))?
            .clone();
        let source_type = self
            .registry
            .lookup(&source.kind)
            .ok_or_else(|| PantographError::UnknownKind(source.kind.clone()))?;
        let target_type = self
            .registry
            .lookup(&target.kind)
            .ok_or_else(|| PantographError::UnknownKind(target.kind.clone()))?;

        let vertical_involved = [source_handle, target_handle]
            .iter()
            .flatten()
            .any(|h| *h == HANDLE_CHILDREN || *h == HANDLE_PARENT);
        let containment =
            source_handle == Some(HANDLE_CHILDREN) && target_handle == Some(HANDLE_PARENT);
        if vertical_involved && !containment {
            return Err(ConnectError::new(
                "containment must go from a children handle to a parent handle",
            )
            .into());
        }

        let model = self.to_model();
        if containment {
            if !source_type.accepts_children() {
                return Err(ConnectError::new(format!(
                    "'{}' cannot contain children",
                    source.kind
                ))
                .into());
            }
            if !target_type.accepts_parents() {
                return Err(ConnectError::new(format!(
                    "'{}' cannot be nested under a parent",
                    target.kind
                ))
                .into());
            }
            source_type.verify_nest_child(&ConnectContext {
                source: &source,
                target: &target,
                peer: target_type,
                model: &model,
            })?;
            target_type.verify_nest_into_parent(&ConnectContext {
                source: &source,
                target: &target,
                peer: source_type,
                model: &model,
            })?;
        } else {
            if !source_type.accepts_outgoing() {
                return Err(ConnectError::new(format!(
                    "'{}' cannot initiate connections",
                    source.kind
                ))
                .into());
            }
            if !target_type.accepts_incoming() {
                return Err(ConnectError::new(format!(
                    "'{}' cannot receive connections",
                    target.kind
                ))
                .into());
            }
            source_type.verify_connect_to(&ConnectContext {
                source: &source,
                target: &target,
                peer: target_type,
                model: &model,
            })?;
            target_type.verify_connect_from(&ConnectContext {
                source: &source,
                target: &target,
                peer: source_type,
                model: &model,
            })?;
        }

        let mut edge = DiagramEdge::new(Uuid::new_v4().to_string(), source_id, target_id);
        edge.source_handle = source_handle.map(str::to_string);
        edge.target_handle = target_handle.map(str::to_string);
        let id = edge.id.clone();
        debug!(
            edge_id = id.as_str(),
            source = source_id,
            target = target_id,
            containment = containment;
            "Connected nodes"
        );
        self.edges.push(edge);
        self.changed(ChangeClass::Structural);
        Ok(id)
    }

    /// Updates a node's position. In-progress moves are history noise;
    /// only the settled position schedules a snapshot.
    pub fn move_node(
        &mut self,
        id: &str,
        position: Point,
        settled: bool,
    ) -> Result<(), PantographError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| PantographError::NodeNotFound(id.to_string()))?;
        node.position = Some(position);
        self.changed(if settled {
            ChangeClass::DragSettled
        } else {
            ChangeClass::DragInProgress
        });
        Ok(())
    }

    /// Updates a node's persisted size. Same settled-vs-in-progress rules
    /// as [`Workbench::move_node`].
    pub fn resize_node(
        &mut self,
        id: &str,
        size: Size,
        settled: bool,
    ) -> Result<(), PantographError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| PantographError::NodeNotFound(id.to_string()))?;
        node.width = Some(size.width());
        node.height = Some(size.height());
        self.changed(if settled {
            ChangeClass::ResizeSettled
        } else {
            ChangeClass::ResizeInProgress
        });
        Ok(())
    }

    /// Runs the edit dialog for a node through the host and applies the
    /// outcome if it was accepted.
    pub fn edit_node(
        &mut self,
        id: &str,
        host: &mut dyn DialogHost,
    ) -> Result<(), PantographError> {
        let node = self
            .find_node(id)
            .ok_or_else(|| PantographError::NodeNotFound(id.to_string()))?
            .clone();
        let element = self
            .registry
            .lookup(&node.kind)
            .ok_or_else(|| PantographError::UnknownKind(node.kind.clone()))?;
        let outcome = host.show_edit(&node, element);
        self.apply_edit(id, outcome)
    }

    /// Applies an edit outcome to a node. A non-accepted outcome is a
    /// successful no-op.
    pub fn apply_edit(&mut self, id: &str, outcome: EditOutcome) -> Result<(), PantographError> {
        if !outcome.accepted {
            return Ok(());
        }
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| PantographError::NodeNotFound(id.to_string()))?;
        node.props = outcome.data;
        if outcome.title.is_some() {
            node.name = outcome.title;
        }
        self.changed(ChangeClass::Structural);
        Ok(())
    }

    // --- selection -------------------------------------------------------

    pub fn selected_nodes(&self) -> &HashSet<String> {
        &self.selected_nodes
    }

    pub fn selected_edges(&self) -> &HashSet<String> {
        &self.selected_edges
    }

    pub fn set_selection<I, J>(&mut self, nodes: I, edges: J)
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        self.selected_nodes = nodes.into_iter().collect();
        self.selected_edges = edges.into_iter().collect();
        self.changed(ChangeClass::Selection);
    }

    pub fn toggle_node_selection(&mut self, id: &str) {
        if !self.selected_nodes.remove(id) {
            self.selected_nodes.insert(id.to_string());
        }
        self.changed(ChangeClass::Selection);
    }

    pub fn clear_selection(&mut self) {
        self.selected_nodes.clear();
        self.selected_edges.clear();
        self.changed(ChangeClass::Selection);
    }

    pub(crate) fn select_nodes(&mut self, ids: impl IntoIterator<Item = String>) {
        self.selected_nodes = ids.into_iter().collect();
        self.selected_edges.clear();
        self.changed(ChangeClass::Selection);
    }

    // --- views -----------------------------------------------------------

    pub fn add_view(&mut self, view: DiagramView) {
        self.views.push(view);
        self.changed(ChangeClass::Structural);
    }

    pub fn remove_view(&mut self, id: &str) {
        self.views.retain(|v| v.id != id);
        self.changed(ChangeClass::Structural);
    }

    /// Node ids visible under a view, tolerating stale references.
    pub fn visible_nodes<'a>(&'a self, view: &'a DiagramView) -> impl Iterator<Item = &'a DiagramNode> {
        self.nodes.iter().filter(|n| view.shows(&n.id))
    }

    // --- history ---------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Drives the coalesced history capture; call from the host's event
    /// loop. Returns whether a snapshot was recorded.
    pub fn tick(&mut self, now: Instant) -> bool {
        let snapshot = self.snapshot();
        self.history.poll(now, || snapshot)
    }

    /// Captures any pending change immediately.
    pub fn commit_history(&mut self) -> bool {
        let snapshot = self.snapshot();
        self.history.commit(snapshot)
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        // Selection survives a restore; entries for elements that no
        // longer exist are dropped.
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let edge_ids: HashSet<&str> = self.edges.iter().map(|e| e.id.as_str()).collect();
        self.selected_nodes.retain(|id| node_ids.contains(id.as_str()));
        self.selected_edges.retain(|id| edge_ids.contains(id.as_str()));
        self.history.finish_restore();
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.nodes.clone(), self.edges.clone())
    }

    fn changed(&mut self, class: ChangeClass) {
        self.history.note_change(class, Instant::now());
    }

    pub fn find_node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn push_node(&mut self, node: DiagramNode) {
        self.nodes.push(node);
    }

    pub(crate) fn push_edge(&mut self, edge: DiagramEdge) {
        self.edges.push(edge);
    }

    pub(crate) fn mark_structural(&mut self) {
        self.changed(ChangeClass::Structural);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantograph_core::catalog::builtin_registry;
    use std::time::Duration;

    fn bench() -> Workbench {
        Workbench::new(builtin_registry())
    }

    fn bench_with(kinds: &[(&str, &str)]) -> Workbench {
        let mut b = bench();
        for (id, kind) in kinds {
            let mut node = DiagramNode::new(*id, *kind);
            node.position = Some(Point::new(0.0, 0.0));
            b.push_node(node);
        }
        b.commit_history();
        b
    }

    #[test]
    fn add_element_uses_default_props() {
        let mut b = bench();
        let id = b.add_element("service", Point::new(10.0, 20.0)).unwrap();
        let node = b.find_node(&id).unwrap();
        assert_eq!(node.kind, "service");
        assert!(node.props.contains_key("description"));
        assert_eq!(node.position, Some(Point::new(10.0, 20.0)));
    }

    #[test]
    fn add_element_rejects_unknown_kind() {
        let mut b = bench();
        let err = b.add_element("mystery", Point::new(0.0, 0.0));
        assert!(matches!(err, Err(PantographError::UnknownKind(k)) if k == "mystery"));
        assert!(b.nodes().is_empty());
    }

    #[test]
    fn lateral_connect_checks_capabilities() {
        let mut b = bench_with(&[("db", "database"), ("svc", "service")]);
        // Databases do not initiate calls.
        let err = b.connect("db", "svc", None, None);
        assert!(matches!(err, Err(PantographError::Connect(_))));
        assert!(b.edges().is_empty());

        b.connect("svc", "db", None, None).unwrap();
        assert_eq!(b.edges().len(), 1);
    }

    #[test]
    fn actor_to_actor_is_rejected_by_verify_hook() {
        let mut b = bench_with(&[("u1", "user"), ("u2", "user"), ("svc", "service")]);
        assert!(b.connect("u1", "u2", None, None).is_err());
        assert!(b.connect("u1", "svc", None, None).is_ok());
    }

    #[test]
    fn containment_requires_the_exact_handle_pair() {
        let mut b = bench_with(&[("g", "gateway"), ("a", "api")]);

        // Reversed pair is rejected.
        assert!(b.connect("a", "g", Some("parent"), Some("children")).is_err());
        // Mixed vertical/lateral is rejected.
        assert!(b.connect("g", "a", Some("children"), None).is_err());
        assert!(b.edges().is_empty());

        b.connect("g", "a", Some("children"), Some("parent")).unwrap();
        assert!(b.edges()[0].is_parent_child());
    }

    #[test]
    fn gateway_cannot_adopt_a_service() {
        let mut b = bench_with(&[("g", "gateway"), ("s", "service")]);
        let err = b.connect("g", "s", Some("children"), Some("parent"));
        assert!(matches!(err, Err(PantographError::Connect(_))));
        assert!(b.edges().is_empty());
    }

    #[test]
    fn api_rejects_a_second_parent() {
        let mut b = bench_with(&[("g1", "gateway"), ("g2", "gateway"), ("a", "api")]);
        b.connect("g1", "a", Some("children"), Some("parent")).unwrap();
        let err = b.connect("g2", "a", Some("children"), Some("parent"));
        assert!(matches!(err, Err(PantographError::Connect(_))));
        assert_eq!(b.edges().len(), 1);
    }

    #[test]
    fn self_connection_is_rejected() {
        let mut b = bench_with(&[("s", "service")]);
        assert!(b.connect("s", "s", None, None).is_err());
    }

    #[test]
    fn delete_selection_removes_incident_edges() {
        let mut b = bench_with(&[("u", "user"), ("s", "service"), ("d", "database")]);
        b.connect("u", "s", None, None).unwrap();
        b.connect("s", "d", None, None).unwrap();

        b.set_selection(["s".to_string()], []);
        b.delete_selection();

        assert_eq!(b.nodes().len(), 2);
        assert!(b.edges().is_empty());
    }

    #[test]
    fn rejected_edit_outcome_changes_nothing() {
        let mut b = bench_with(&[("s", "service")]);
        let before = b.find_node("s").unwrap().clone();
        b.apply_edit("s", EditOutcome::canceled()).unwrap();
        assert_eq!(b.find_node("s").unwrap(), &before);
    }

    #[test]
    fn accepted_edit_outcome_applies_props_and_title() {
        let mut b = bench_with(&[("s", "service")]);
        let mut data = Props::new();
        data.insert("description".into(), "billing".into());
        b.apply_edit(
            "s",
            EditOutcome {
                accepted: true,
                data,
                title: Some("Billing".to_string()),
            },
        )
        .unwrap();
        let node = b.find_node("s").unwrap();
        assert_eq!(node.name.as_deref(), Some("Billing"));
        assert_eq!(node.props["description"], "billing");
    }

    #[test]
    fn edit_goes_through_the_dialog_host() {
        struct AcceptAll;
        impl DialogHost for AcceptAll {
            fn show_edit(&mut self, _: &DiagramNode, _: &dyn ElementType) -> EditOutcome {
                let mut data = Props::new();
                data.insert("description".into(), "edited".into());
                EditOutcome {
                    accepted: true,
                    data,
                    title: None,
                }
            }
            fn show_report(&mut self, _: &str) {}
        }

        let mut b = bench_with(&[("s", "service")]);
        b.edit_node("s", &mut AcceptAll).unwrap();
        assert_eq!(b.find_node("s").unwrap().props["description"], "edited");
    }

    #[test]
    fn undo_redo_round_trip_preserves_selection_where_possible() {
        let mut b = bench();
        let a = b.add_element("service", Point::new(0.0, 0.0)).unwrap();
        b.commit_history();
        let z = b.add_element("database", Point::new(100.0, 0.0)).unwrap();
        b.commit_history();

        b.set_selection([a.clone(), z.clone()], []);

        assert!(b.undo());
        // The second node is gone; its selection entry is dropped, the
        // surviving one kept.
        assert_eq!(b.nodes().len(), 1);
        assert!(b.selected_nodes().contains(&a));
        assert!(!b.selected_nodes().contains(&z));

        assert!(b.redo());
        assert_eq!(b.nodes().len(), 2);
    }

    #[test]
    fn drag_in_progress_is_not_a_history_step() {
        let mut b = bench_with(&[("s", "service")]);
        for i in 0..10 {
            b.move_node("s", Point::new(i as f32, 0.0), false).unwrap();
        }
        assert!(!b.tick(Instant::now() + Duration::from_secs(1)));

        b.move_node("s", Point::new(99.0, 0.0), true).unwrap();
        assert!(b.tick(Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn open_positions_every_node() {
        let mut b = bench();
        let model = DiagramModel::from_json(
            r#"{
                "version": "1.0",
                "nodes": [
                    {"id": "u", "kind": "user"},
                    {"id": "s", "kind": "service"}
                ],
                "edges": [{"id": "e", "source": "u", "target": "s"}]
            }"#,
        )
        .unwrap();
        let hydrated = b.open(model);
        assert_eq!(hydrated.nodes.len(), 2);
        for node in b.nodes() {
            assert!(node.position.is_some());
        }
        // Loading is the history floor, not an undoable step.
        assert!(!b.can_undo());
    }

    #[test]
    fn serialize_refreshes_timestamps() {
        let mut b = bench_with(&[("s", "service")]);
        let first = b.serialize_at("2026-01-01T00:00:00Z");
        assert_eq!(first.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
        let second = b.serialize_at("2026-02-01T00:00:00Z");
        assert_eq!(second.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(second.updated_at.as_deref(), Some("2026-02-01T00:00:00Z"));
    }
}
