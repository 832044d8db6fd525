//! The persisted diagram document model.
//!
//! A [`DiagramModel`] is the sole persisted unit: it is the shape written to
//! files and repositories, and the shape validated on clipboard paste. The
//! schema is deliberately tolerant: unknown node kinds are accepted as
//! open-ended strings so documents produced by newer palettes still load,
//! and extra fields are ignored. Core structure violations fail closed.

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Point;

/// Property bag attached to nodes and edges.
///
/// Properties are schema-less at the model level; their meaning is given by
/// the node's element type definition.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Errors produced while validating an untrusted document.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node '{node}' has a non-positive persisted size")]
    NonPositiveSize { node: String },
}

/// Logical kind of an edge.
///
/// A `ParentChild` edge models containment: the edge source is the parent
/// and the edge target is the child. Everything else is a lateral
/// dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    #[serde(rename = "lateral")]
    Lateral,
    #[serde(rename = "parentChild")]
    ParentChild,
}

/// Handle id used by the child end of a containment connection.
pub const HANDLE_CHILDREN: &str = "children";
/// Handle id used by the parent end of a containment connection.
pub const HANDLE_PARENT: &str = "parent";

/// A serialized diagram node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNode {
    pub id: String,

    /// Element kind. Kept as an open string for forward compatibility with
    /// palettes this build does not know about.
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub props: Props,

    /// Canvas position. Absent for nodes that have never been placed; the
    /// hydration engine assigns one on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,

    /// Persisted size, present only if the user resized the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warns: Option<Vec<String>>,
}

impl DiagramNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            props: Props::new(),
            position: None,
            width: None,
            height: None,
            errors: None,
            warns: None,
        }
    }

    /// Returns the explicit position when it is present and finite.
    pub fn valid_position(&self) -> Option<Point> {
        self.position.filter(|p| p.is_finite())
    }

    /// Returns the persisted size when both dimensions are present.
    pub fn persisted_size(&self) -> Option<(f32, f32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }
}

/// A serialized diagram edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramEdge {
    pub id: String,
    pub source: String,
    pub target: String,

    /// Source handle id (e.g. `out`, `children`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    /// Target handle id (e.g. `in`, `parent`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    /// Explicit logical kind. When absent the kind is inferred from the
    /// handle pair, see [`DiagramEdge::effective_kind`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EdgeKind>,

    #[serde(default)]
    pub props: Props,
}

impl DiagramEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: None,
            props: Props::new(),
        }
    }

    /// Resolves the logical kind of this edge.
    ///
    /// The explicit `kind` wins. Otherwise the `children`/`parent` handle
    /// pair means containment, and anything else is lateral. There is no
    /// ambiguity: an edge's kind is fully determined by these two fields.
    pub fn effective_kind(&self) -> EdgeKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        if self.source_handle.as_deref() == Some(HANDLE_CHILDREN)
            && self.target_handle.as_deref() == Some(HANDLE_PARENT)
        {
            EdgeKind::ParentChild
        } else {
            EdgeKind::Lateral
        }
    }

    pub fn is_parent_child(&self) -> bool {
        self.effective_kind() == EdgeKind::ParentChild
    }
}

/// A named subset filter over the full node set.
///
/// A node is hidden in a view iff its id is absent from `include_node_ids`.
/// Stale ids referencing removed nodes are tolerated and simply inert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramView {
    pub id: String,
    pub name: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub include_node_ids: Vec<String>,

    #[serde(default)]
    pub include_types_ids: Vec<String>,
}

impl DiagramView {
    /// Whether the given node id is visible in this view.
    pub fn shows(&self, node_id: &str) -> bool {
        self.include_node_ids.iter().any(|id| id == node_id)
    }
}

/// The persisted diagram document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramModel {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,

    #[serde(default)]
    pub views: Vec<DiagramView>,
}

impl DiagramModel {
    /// Creates an empty document with the current schema version.
    pub fn empty() -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: None,
            updated_at: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            views: Vec::new(),
        }
    }

    /// Parses and validates an untrusted JSON document.
    ///
    /// Pure function: no side effects, the input is never mutated. Unknown
    /// `kind` values are accepted; extra fields are ignored; documents whose
    /// core shape does not conform are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the JSON is malformed, a required
    /// field is missing, or a persisted node size is non-positive.
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        let model: DiagramModel = serde_json::from_str(input)?;
        model.validate()?;
        Ok(model)
    }

    /// Parses an already-deserialized JSON value. Same semantics as
    /// [`DiagramModel::from_json`].
    pub fn from_value(input: serde_json::Value) -> Result<Self, ValidationError> {
        let model: DiagramModel = serde_json::from_value(input)?;
        model.validate()?;
        Ok(model)
    }

    /// Serializes the document to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ValidationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for node in &self.nodes {
            let bad_width = node.width.is_some_and(|w| w <= 0.0);
            let bad_height = node.height.is_some_and(|h| h <= 0.0);
            if bad_width || bad_height {
                return Err(ValidationError::NonPositiveSize {
                    node: node.id.clone(),
                });
            }
        }

        // Duplicate ids are a data-drift condition rather than a shape
        // violation; they are tolerated on load and surfaced in the log.
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                warn!(node_id = node.id.as_str(); "Duplicate node id in document");
            }
        }

        Ok(())
    }

    /// Refreshes `updated_at` with the given RFC 3339 timestamp, setting
    /// `created_at` on first save.
    pub fn touch(&mut self, now_rfc3339: &str) {
        if self.created_at.is_none() {
            self.created_at = Some(now_rfc3339.to_string());
        }
        self.updated_at = Some(now_rfc3339.to_string());
    }

    pub fn find_node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "version": "1.0",
            "nodes": [
                {"id": "u1", "kind": "user"},
                {"id": "s1", "kind": "service", "position": {"x": 100.0, "y": 40.0}}
            ],
            "edges": [
                {"id": "e1", "source": "u1", "target": "s1"}
            ]
        }"#
    }

    #[test]
    fn parses_minimal_document() {
        let model = DiagramModel::from_json(minimal_json()).unwrap();
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.edges.len(), 1);
        assert!(model.views.is_empty());
        assert_eq!(model.nodes[1].valid_position().unwrap().x(), 100.0);
    }

    #[test]
    fn rejects_missing_version() {
        let err = DiagramModel::from_json(r#"{"nodes": [], "edges": []}"#);
        assert!(matches!(err, Err(ValidationError::Json(_))));
    }

    #[test]
    fn tolerates_unknown_kinds_and_extra_fields() {
        let model = DiagramModel::from_json(
            r#"{
                "version": "1.0",
                "futureField": {"anything": true},
                "nodes": [{"id": "x", "kind": "quantum-mesh", "futureFlag": 1}],
                "edges": []
            }"#,
        )
        .unwrap();
        assert_eq!(model.nodes[0].kind, "quantum-mesh");
    }

    #[test]
    fn rejects_non_positive_persisted_size() {
        let err = DiagramModel::from_json(
            r#"{
                "version": "1.0",
                "nodes": [{"id": "x", "kind": "service", "width": 0.0, "height": 50.0}],
                "edges": []
            }"#,
        );
        assert!(matches!(
            err,
            Err(ValidationError::NonPositiveSize { node }) if node == "x"
        ));
    }

    #[test]
    fn infers_lateral_kind_without_handles() {
        let model = DiagramModel::from_json(minimal_json()).unwrap();
        assert_eq!(model.edges[0].effective_kind(), EdgeKind::Lateral);
    }

    #[test]
    fn infers_parent_child_from_handle_pair() {
        let mut edge = DiagramEdge::new("e1", "g1", "a1");
        edge.source_handle = Some(HANDLE_CHILDREN.to_string());
        edge.target_handle = Some(HANDLE_PARENT.to_string());
        assert_eq!(edge.effective_kind(), EdgeKind::ParentChild);

        // Any other handle combination stays lateral.
        edge.target_handle = Some("in".to_string());
        assert_eq!(edge.effective_kind(), EdgeKind::Lateral);
    }

    #[test]
    fn explicit_kind_wins_over_handles() {
        let mut edge = DiagramEdge::new("e1", "a", "b");
        edge.kind = Some(EdgeKind::ParentChild);
        assert_eq!(edge.effective_kind(), EdgeKind::ParentChild);
    }

    #[test]
    fn round_trips_through_json() {
        let model = DiagramModel::from_json(minimal_json()).unwrap();
        let json = model.to_json().unwrap();
        let back = DiagramModel::from_json(&json).unwrap();
        assert_eq!(model, back);
    }

    #[test]
    fn touch_sets_created_at_once() {
        let mut model = DiagramModel::empty();
        model.touch("2026-01-01T00:00:00Z");
        model.touch("2026-02-01T00:00:00Z");
        assert_eq!(model.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(model.updated_at.as_deref(), Some("2026-02-01T00:00:00Z"));
    }

    #[test]
    fn view_visibility_is_membership() {
        let view = DiagramView {
            id: "v1".into(),
            name: "Overview".into(),
            version: "1".into(),
            created_at: None,
            updated_at: None,
            include_node_ids: vec!["a".into(), "gone".into()],
            include_types_ids: vec![],
        };
        assert!(view.shows("a"));
        assert!(!view.shows("b"));
        // Stale references are inert.
        assert!(view.shows("gone"));
    }
}
