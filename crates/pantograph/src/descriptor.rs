//! Derived-relationship computation over a diagram snapshot.
//!
//! A [`DiagramDescriptor`] binds every node of a [`DiagramModel`] to its
//! resolved element type and pre-computes, in one pass, the relationship
//! sets needed for validation, export, and reporting: lateral
//! incoming/outgoing neighbors, parent/child containment, upstream actor
//! discovery, and note-to-node spatial overlap.
//!
//! Descriptors are constructed fresh from a snapshot each time derived data
//! is needed, never mutated in place, and discarded after use. Dangling edge
//! endpoints are skipped silently: partial imports must not block deriving
//! the rest of the diagram.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use log::trace;

use pantograph_core::element::{Category, ElementRegistry, ElementType, resolved_size};
use pantograph_core::geometry::{Point, Rect, Size};
use pantograph_core::model::{DiagramEdge, DiagramModel, DiagramNode, Props};

/// A node bound to its type definition and pre-computed relationships.
///
/// Relationship sets are stored as indices into the owning descriptor and
/// resolved through the [`DiagramDescriptor`] accessors.
pub struct NodeDescriptor<'a> {
    index: usize,
    node: &'a DiagramNode,
    element: Option<&'a dyn ElementType>,
    incoming: Vec<(usize, usize)>,
    outgoing: Vec<(usize, usize)>,
    parents: Vec<(usize, usize)>,
    children: Vec<(usize, usize)>,
    actors: Vec<usize>,
    overlaps: Vec<usize>,
}

impl<'a> NodeDescriptor<'a> {
    pub fn id(&self) -> &'a str {
        &self.node.id
    }

    pub fn node(&self) -> &'a DiagramNode {
        self.node
    }

    pub fn element(&self) -> Option<&'a dyn ElementType> {
        self.element
    }

    /// Category of this node, degrading to `Component` for unknown kinds so
    /// one bad node never blocks the rest of the diagram.
    pub fn category(&self) -> Category {
        self.element
            .map(|e| e.category())
            .unwrap_or(Category::Component)
    }

    pub fn is_background(&self) -> bool {
        self.element.is_some_and(|e| e.is_background())
    }

    /// Visible label: the type's label hook, falling back to name or id.
    pub fn label(&self) -> String {
        match self.element {
            Some(element) => element.label(self.node.name.as_deref(), &self.node.props),
            None => self
                .node
                .name
                .clone()
                .unwrap_or_else(|| self.node.id.clone()),
        }
    }

    /// Free-form description drawn from the property bag.
    pub fn description(&self) -> String {
        for key in ["description", "desc"] {
            if let Some(text) = self.node.props.get(key).and_then(|v| v.as_str())
                && !text.is_empty()
            {
                return text.to_string();
            }
        }
        String::new()
    }

    pub fn properties(&self) -> &'a Props {
        &self.node.props
    }

    /// Title of the node's type, falling back to the raw kind string.
    pub fn type_title(&self) -> &'a str {
        match self.element {
            Some(element) => element.title(),
            None => &self.node.kind,
        }
    }

    /// Numeric type-level export order; unknown kinds sort last.
    pub fn order(&self) -> i32 {
        self.element.map(|e| e.export_order()).unwrap_or(100)
    }

    /// Stable HTML anchor derived from the node id.
    pub fn anchor_id(&self) -> String {
        let clean: String = self
            .node
            .id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        format!("node-{clean}")
    }

    /// Effective size: persisted size, then the type default, then the
    /// background or standard fallback constant.
    pub fn size(&self) -> Size {
        resolved_size(self.node, self.element)
    }

    /// Bounding box used for overlap association. Nodes without a valid
    /// position are treated as sitting at the origin.
    pub fn bounding_box(&self) -> Rect {
        let origin = self.node.valid_position().unwrap_or_default();
        Rect::new(origin, self.size())
    }
}

/// Sorts descriptors for export: numeric type order first, ties broken by
/// case-insensitive label comparison.
pub fn export_cmp(a: &NodeDescriptor<'_>, b: &NodeDescriptor<'_>) -> Ordering {
    a.order()
        .cmp(&b.order())
        .then_with(|| a.label().to_lowercase().cmp(&b.label().to_lowercase()))
}

/// An edge resolved to its neighbor descriptor, preserving the edge payload
/// for reporting.
pub struct EdgeRef<'d, 'a> {
    pub edge: &'a DiagramEdge,
    pub node: &'d NodeDescriptor<'a>,
}

/// One export group: all nodes sharing a concrete type.
pub struct TypeGroup<'d> {
    pub kind: &'d str,
    pub title: &'d str,
    pub order: i32,
    pub nodes: Vec<&'d NodeDescriptor<'d>>,
}

/// The derived relationship graph of one diagram snapshot.
pub struct DiagramDescriptor<'a> {
    model: &'a DiagramModel,
    nodes: Vec<NodeDescriptor<'a>>,
    index: HashMap<&'a str, usize>,
}

impl<'a> DiagramDescriptor<'a> {
    /// Computes all derived relationships for `model` in one pass.
    pub fn new(model: &'a DiagramModel, registry: &'a ElementRegistry) -> Self {
        let index: HashMap<&str, usize> = model
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let elements: Vec<Option<&dyn ElementType>> = model
            .nodes
            .iter()
            .map(|n| registry.lookup(&n.kind))
            .collect();

        let categories: Vec<Category> = elements
            .iter()
            .map(|e| e.map(|e| e.category()).unwrap_or(Category::Component))
            .collect();

        // Partition edges once. Dangling endpoints contribute to neither
        // side's lists.
        let mut incoming = vec![Vec::new(); model.nodes.len()];
        let mut outgoing = vec![Vec::new(); model.nodes.len()];
        let mut parents = vec![Vec::new(); model.nodes.len()];
        let mut children = vec![Vec::new(); model.nodes.len()];

        for (edge_idx, edge) in model.edges.iter().enumerate() {
            let (Some(&source), Some(&target)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                trace!(edge_id = edge.id.as_str(); "Skipping dangling edge");
                continue;
            };
            if edge.is_parent_child() {
                // Containment convention: source is the parent, target the
                // child.
                children[source].push((edge_idx, target));
                parents[target].push((edge_idx, source));
            } else {
                outgoing[source].push((edge_idx, target));
                incoming[target].push((edge_idx, source));
            }
        }

        let actors: Vec<Vec<usize>> = (0..model.nodes.len())
            .map(|start| find_upstream_actors(start, &incoming, &categories))
            .collect();

        let overlaps = compute_note_overlaps(model, &elements, &categories);

        let nodes = model
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| NodeDescriptor {
                index: i,
                node,
                element: elements[i],
                incoming: std::mem::take(&mut incoming[i]),
                outgoing: std::mem::take(&mut outgoing[i]),
                parents: std::mem::take(&mut parents[i]),
                children: std::mem::take(&mut children[i]),
                actors: actors[i].clone(),
                overlaps: overlaps[i].clone(),
            })
            .collect();

        Self {
            model,
            nodes,
            index,
        }
    }

    pub fn model(&self) -> &'a DiagramModel {
        self.model
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor<'a>> {
        self.nodes.iter()
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeDescriptor<'a>> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Sources of lateral edges ending at `node`.
    pub fn incoming_lateral<'d>(
        &'d self,
        node: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = EdgeRef<'d, 'a>> {
        self.resolve_edges(&self.nodes[node.index].incoming)
    }

    /// Targets of lateral edges starting at `node`.
    pub fn outgoing_lateral<'d>(
        &'d self,
        node: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = EdgeRef<'d, 'a>> {
        self.resolve_edges(&self.nodes[node.index].outgoing)
    }

    /// Parents of `node` via containment edges.
    pub fn parents<'d>(
        &'d self,
        node: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = EdgeRef<'d, 'a>> {
        self.resolve_edges(&self.nodes[node.index].parents)
    }

    /// Children of `node` via containment edges.
    pub fn children<'d>(
        &'d self,
        node: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = EdgeRef<'d, 'a>> {
        self.resolve_edges(&self.nodes[node.index].children)
    }

    /// Actors discovered upstream of `node` along lateral edges, in order
    /// of first discovery.
    pub fn upstream_actors<'d>(
        &'d self,
        node: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = &'d NodeDescriptor<'a>> {
        self.nodes[node.index].actors.iter().map(|&i| &self.nodes[i])
    }

    /// Notes whose bounding box overlaps this (non-note) node.
    pub fn notes_under<'d>(
        &'d self,
        node: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = &'d NodeDescriptor<'a>> {
        self.nodes[node.index]
            .overlaps
            .iter()
            .map(|&i| &self.nodes[i])
    }

    /// Non-note nodes whose bounding box overlaps this note.
    pub fn nodes_over<'d>(
        &'d self,
        note: &NodeDescriptor<'_>,
    ) -> impl Iterator<Item = &'d NodeDescriptor<'a>> {
        self.nodes[note.index]
            .overlaps
            .iter()
            .map(|&i| &self.nodes[i])
    }

    pub fn actors(&self) -> impl Iterator<Item = &NodeDescriptor<'a>> {
        self.by_category(Category::Actor)
    }

    pub fn components(&self) -> impl Iterator<Item = &NodeDescriptor<'a>> {
        self.by_category(Category::Component)
    }

    pub fn notes(&self) -> impl Iterator<Item = &NodeDescriptor<'a>> {
        self.by_category(Category::Note)
    }

    fn by_category(&self, category: Category) -> impl Iterator<Item = &NodeDescriptor<'a>> {
        self.nodes.iter().filter(move |n| n.category() == category)
    }

    pub fn actors_by_group(&self) -> Vec<TypeGroup<'_>> {
        self.groups(Category::Actor)
    }

    pub fn components_by_group(&self) -> Vec<TypeGroup<'_>> {
        self.groups(Category::Component)
    }

    pub fn notes_by_group(&self) -> Vec<TypeGroup<'_>> {
        self.groups(Category::Note)
    }

    /// Groups nodes of one category by concrete type, groups sorted by
    /// export order then title, nodes within a group by the export
    /// comparator.
    fn groups(&self, category: Category) -> Vec<TypeGroup<'_>> {
        let mut groups: indexmap::IndexMap<&str, TypeGroup<'_>> = indexmap::IndexMap::new();
        for node in self.by_category(category) {
            let entry = groups.entry(node.node.kind.as_str()).or_insert_with(|| TypeGroup {
                kind: node.node.kind.as_str(),
                title: node.type_title(),
                order: node.order(),
                nodes: Vec::new(),
            });
            entry.nodes.push(node);
        }
        let mut groups: Vec<TypeGroup<'_>> = groups.into_values().collect();
        for group in &mut groups {
            group.nodes.sort_by(|a, b| export_cmp(a, b));
        }
        groups.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        });
        groups
    }

    fn resolve_edges<'d>(
        &'d self,
        refs: &'d [(usize, usize)],
    ) -> impl Iterator<Item = EdgeRef<'d, 'a>> {
        refs.iter().map(|&(edge_idx, node_idx)| EdgeRef {
            edge: &self.model.edges[edge_idx],
            node: &self.nodes[node_idx],
        })
    }
}

/// Depth-first traversal backward along lateral incoming edges only.
///
/// Actors are traversal boundaries: a discovered actor is recorded and the
/// walk does not continue past it. Notes and components are walked through.
/// The visited set guarantees termination on cyclic graphs. The result is
/// deduplicated by node, in order of first discovery, and never contains
/// the start node itself.
fn find_upstream_actors(
    start: usize,
    incoming: &[Vec<(usize, usize)>],
    categories: &[Category],
) -> Vec<usize> {
    let mut result = Vec::new();
    let mut discovered = HashSet::new();
    let mut visited = HashSet::new();

    fn walk(
        node: usize,
        incoming: &[Vec<(usize, usize)>],
        categories: &[Category],
        visited: &mut HashSet<usize>,
        discovered: &mut HashSet<usize>,
        result: &mut Vec<usize>,
    ) {
        if !visited.insert(node) {
            return;
        }
        for &(_, source) in &incoming[node] {
            if categories[source] == Category::Actor {
                if discovered.insert(source) {
                    result.push(source);
                }
            } else {
                walk(source, incoming, categories, visited, discovered, result);
            }
        }
    }

    walk(
        start,
        incoming,
        categories,
        &mut visited,
        &mut discovered,
        &mut result,
    );
    result
}

/// Associates every note with the non-note nodes its bounding box overlaps.
///
/// Returns, for each node index, the indices it is associated with: notes
/// for a regular node, regular nodes for a note. The relation is recorded
/// on both sides or neither.
fn compute_note_overlaps(
    model: &DiagramModel,
    elements: &[Option<&dyn ElementType>],
    categories: &[Category],
) -> Vec<Vec<usize>> {
    let mut overlaps = vec![Vec::new(); model.nodes.len()];

    let boxes: Vec<Rect> = model
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let origin = node.valid_position().unwrap_or(Point::new(0.0, 0.0));
            Rect::new(origin, resolved_size(node, elements[i]))
        })
        .collect();

    let notes: Vec<usize> = (0..model.nodes.len())
        .filter(|&i| categories[i] == Category::Note)
        .collect();
    let others: Vec<usize> = (0..model.nodes.len())
        .filter(|&i| categories[i] != Category::Note)
        .collect();

    for &other in &others {
        for &note in &notes {
            if boxes[other].intersects(boxes[note]) {
                overlaps[other].push(note);
                overlaps[note].push(other);
            }
        }
    }

    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantograph_core::catalog::builtin_registry;
    use pantograph_core::geometry::Point;
    use pantograph_core::model::{DiagramEdge, DiagramNode, EdgeKind};

    fn node(id: &str, kind: &str) -> DiagramNode {
        DiagramNode::new(id, kind)
    }

    fn placed(id: &str, kind: &str, x: f32, y: f32) -> DiagramNode {
        let mut n = DiagramNode::new(id, kind);
        n.position = Some(Point::new(x, y));
        n
    }

    fn lateral(id: &str, source: &str, target: &str) -> DiagramEdge {
        DiagramEdge::new(id, source, target)
    }

    fn containment(id: &str, parent: &str, child: &str) -> DiagramEdge {
        let mut e = DiagramEdge::new(id, parent, child);
        e.kind = Some(EdgeKind::ParentChild);
        e
    }

    fn model(nodes: Vec<DiagramNode>, edges: Vec<DiagramEdge>) -> DiagramModel {
        let mut m = DiagramModel::empty();
        m.nodes = nodes;
        m.edges = edges;
        m
    }

    #[test]
    fn binds_lateral_neighbors() {
        let registry = builtin_registry();
        let m = model(
            vec![node("u1", "user"), node("s1", "service")],
            vec![lateral("e1", "u1", "s1")],
        );
        let d = DiagramDescriptor::new(&m, &registry);

        let s1 = d.find_node("s1").unwrap();
        let incoming: Vec<_> = d.incoming_lateral(s1).map(|e| e.node.id()).collect();
        assert_eq!(incoming, vec!["u1"]);
        assert_eq!(m.edges[0].effective_kind(), EdgeKind::Lateral);

        let u1 = d.find_node("u1").unwrap();
        let outgoing: Vec<_> = d.outgoing_lateral(u1).map(|e| e.node.id()).collect();
        assert_eq!(outgoing, vec!["s1"]);
    }

    #[test]
    fn binds_containment_with_parent_source_convention() {
        let registry = builtin_registry();
        let m = model(
            vec![node("g1", "gateway"), node("a1", "api")],
            vec![containment("e1", "g1", "a1")],
        );
        let d = DiagramDescriptor::new(&m, &registry);

        let g1 = d.find_node("g1").unwrap();
        let children: Vec<_> = d.children(g1).map(|e| e.node.id()).collect();
        assert_eq!(children, vec!["a1"]);

        let a1 = d.find_node("a1").unwrap();
        let parents: Vec<_> = d.parents(a1).map(|e| e.node.id()).collect();
        assert_eq!(parents, vec!["g1"]);

        // Containment edges never show up in the lateral lists.
        assert_eq!(d.incoming_lateral(a1).count(), 0);
        assert_eq!(d.outgoing_lateral(g1).count(), 0);
    }

    #[test]
    fn actor_traversal_stops_at_actors() {
        // A(actor) -> B -> C -> D(actor), all lateral: upstream actors of D
        // are exactly {A}, not D itself, and the walk stops at A.
        let registry = builtin_registry();
        let m = model(
            vec![
                node("a", "user"),
                node("b", "service"),
                node("c", "service"),
                node("d", "user"),
            ],
            vec![
                lateral("e1", "a", "b"),
                lateral("e2", "b", "c"),
                lateral("e3", "c", "d"),
            ],
        );
        let d = DiagramDescriptor::new(&m, &registry);
        let target = d.find_node("d").unwrap();
        let actors: Vec<_> = d.upstream_actors(target).map(|n| n.id()).collect();
        assert_eq!(actors, vec!["a"]);
    }

    #[test]
    fn actor_traversal_walks_through_notes() {
        let registry = builtin_registry();
        let m = model(
            vec![node("a", "user"), node("n", "note"), node("s", "service")],
            vec![lateral("e1", "a", "n"), lateral("e2", "n", "s")],
        );
        let d = DiagramDescriptor::new(&m, &registry);
        let s = d.find_node("s").unwrap();
        let actors: Vec<_> = d.upstream_actors(s).map(|n| n.id()).collect();
        assert_eq!(actors, vec!["a"]);
    }

    #[test]
    fn actor_traversal_terminates_on_cycles() {
        let registry = builtin_registry();
        let m = model(
            vec![node("x", "service"), node("y", "service"), node("a", "user")],
            vec![
                lateral("e1", "x", "y"),
                lateral("e2", "y", "x"),
                lateral("e3", "a", "x"),
            ],
        );
        let d = DiagramDescriptor::new(&m, &registry);
        let y = d.find_node("y").unwrap();
        let actors: Vec<_> = d.upstream_actors(y).map(|n| n.id()).collect();
        assert_eq!(actors, vec!["a"]);
    }

    #[test]
    fn dangling_edges_are_skipped_silently() {
        let registry = builtin_registry();
        let m = model(
            vec![node("b", "service")],
            vec![lateral("e1", "a-missing", "b")],
        );
        let d = DiagramDescriptor::new(&m, &registry);
        let b = d.find_node("b").unwrap();
        assert_eq!(d.incoming_lateral(b).count(), 0);
    }

    #[test]
    fn note_overlap_is_symmetric() {
        let registry = builtin_registry();
        let mut note = placed("p", "note", 0.0, 0.0);
        note.width = Some(320.0);
        note.height = Some(220.0);
        let m = model(
            vec![note, placed("n", "service", 100.0, 100.0), placed("far", "service", 2000.0, 0.0)],
            vec![],
        );
        let d = DiagramDescriptor::new(&m, &registry);

        let p = d.find_node("p").unwrap();
        let n = d.find_node("n").unwrap();
        let far = d.find_node("far").unwrap();

        let over: Vec<_> = d.nodes_over(p).map(|x| x.id()).collect();
        let under: Vec<_> = d.notes_under(n).map(|x| x.id()).collect();
        assert_eq!(over, vec!["n"]);
        assert_eq!(under, vec!["p"]);
        assert_eq!(d.notes_under(far).count(), 0);
    }

    #[test]
    fn touching_note_does_not_associate() {
        let registry = builtin_registry();
        // Note spans x in [0, 320); node starts exactly at 320.
        let m = model(
            vec![placed("p", "note", 0.0, 0.0), placed("n", "service", 320.0, 0.0)],
            vec![],
        );
        let d = DiagramDescriptor::new(&m, &registry);
        let p = d.find_node("p").unwrap();
        assert_eq!(d.nodes_over(p).count(), 0);
    }

    #[test]
    fn groups_sort_by_order_then_title() {
        let registry = builtin_registry();
        let m = model(
            vec![
                node("db1", "database"),
                node("s2", "service"),
                node("s1", "service"),
                node("g1", "gateway"),
            ],
            vec![],
        );
        let d = DiagramDescriptor::new(&m, &registry);
        let groups = d.components_by_group();
        let kinds: Vec<_> = groups.iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec!["gateway", "service", "database"]);
    }

    #[test]
    fn unknown_kind_degrades_to_component() {
        let registry = builtin_registry();
        let m = model(vec![node("x", "quantum-mesh")], vec![]);
        let d = DiagramDescriptor::new(&m, &registry);
        let x = d.find_node("x").unwrap();
        assert_eq!(x.category(), Category::Component);
        assert_eq!(x.label(), "x");
        assert_eq!(x.type_title(), "quantum-mesh");
        assert_eq!(x.order(), 100);
    }

    #[test]
    fn export_cmp_breaks_ties_case_insensitively() {
        let registry = builtin_registry();
        let mut a = node("a", "service");
        a.name = Some("alpha".into());
        let mut b = node("b", "service");
        b.name = Some("Beta".into());
        let m = model(vec![b, a], vec![]);
        let d = DiagramDescriptor::new(&m, &registry);
        let groups = d.components_by_group();
        let labels: Vec<_> = groups[0].nodes.iter().map(|n| n.label()).collect();
        assert_eq!(labels, vec!["alpha", "Beta"]);
    }
}
