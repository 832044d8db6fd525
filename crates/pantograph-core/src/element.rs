//! The element type registry.
//!
//! Every diagram node carries a `kind` string; an [`ElementType`] is the
//! behavioral definition behind one such kind: default properties, sizing,
//! category, capability flags, and connection-legality hooks. Many node
//! instances share a single type definition.
//!
//! The registry is a closed, statically-checked trait-object map keyed by
//! kind. A registry additionally designates one special "note" type matched
//! by dedicated slot before the kind scan, since notes are the background
//! annotation category central to the overlap algorithm.

use indexmap::IndexMap;
use thiserror::Error;

use crate::geometry::Size;
use crate::model::{DiagramModel, DiagramNode, Props};

/// Fallback size for background elements without a persisted or computed
/// size.
pub const BACKGROUND_FALLBACK_SIZE: Size = Size::new(320.0, 220.0);

/// Fallback size for everything else.
pub const STANDARD_FALLBACK_SIZE: Size = Size::new(96.0, 96.0);

/// Category used for export grouping and traversal rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A person or external system initiating interactions.
    Actor,
    /// A software component.
    Component,
    /// A background annotation.
    Note,
}

/// Rejection raised by a connection-legality hook.
///
/// Any such signal means "connection rejected, do not mutate the edge set".
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConnectError(pub String);

impl ConnectError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Context handed to connection-legality hooks.
///
/// Hooks receive both endpoints, the peer's type definition, and the current
/// document so domain rules can inspect existing edges (e.g. a
/// single-parent constraint).
pub struct ConnectContext<'a> {
    pub source: &'a DiagramNode,
    pub target: &'a DiagramNode,
    pub peer: &'a dyn ElementType,
    pub model: &'a DiagramModel,
}

/// Behavioral definition of a node kind.
///
/// Capability predicates must be pure functions of the type, never of the
/// current graph state; graph-dependent rules belong in the `verify_*`
/// hooks, which do receive the document.
pub trait ElementType {
    /// Logical kind identifier, matched against [`DiagramNode::kind`].
    fn kind(&self) -> &str;

    /// Title shown in the palette and in exports.
    fn title(&self) -> &str;

    fn category(&self) -> Category;

    /// Properties assigned to a freshly created node of this type.
    fn default_props(&self) -> Props {
        Props::new()
    }

    /// Default node size as a function of its properties, if the type
    /// defines one. `None` falls back to the background or standard size.
    fn size(&self, _props: &Props) -> Option<Size> {
        None
    }

    /// Background elements render behind everything else.
    fn is_background(&self) -> bool {
        false
    }

    fn is_resizable(&self) -> bool {
        false
    }

    /// Whether lateral edges may end at nodes of this type.
    fn accepts_incoming(&self) -> bool {
        true
    }

    /// Whether lateral edges may start at nodes of this type.
    fn accepts_outgoing(&self) -> bool {
        true
    }

    /// Whether this type can contain children (bottom connection point).
    fn accepts_children(&self) -> bool {
        false
    }

    /// Whether this type can be nested under a parent (top connection
    /// point).
    fn accepts_parents(&self) -> bool {
        false
    }

    /// Validates a lateral connection leaving a node of this type.
    fn verify_connect_to(&self, _ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        Ok(())
    }

    /// Validates a lateral connection arriving at a node of this type.
    fn verify_connect_from(&self, _ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        Ok(())
    }

    /// Validates adopting a child, called on the parent's type.
    fn verify_nest_child(&self, _ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        Ok(())
    }

    /// Validates being nested under a parent, called on the child's type.
    fn verify_nest_into_parent(&self, _ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        Ok(())
    }

    /// Visible label for a node of this type.
    fn label(&self, name: Option<&str>, _props: &Props) -> String {
        name.unwrap_or(self.title()).to_string()
    }

    /// Export ordering; lower sorts earlier. Ties break on title.
    fn export_order(&self) -> i32 {
        100
    }

    /// Optional HTML fragment describing a node's properties in reports.
    /// `None` falls back to a pretty-printed JSON block.
    fn report_properties(&self, _props: &Props, _node: &DiagramNode) -> Option<String> {
        None
    }
}

/// String-keyed catalog of element types with a dedicated note slot.
#[derive(Default)]
pub struct ElementRegistry {
    types: IndexMap<String, Box<dyn ElementType>>,
    note: Option<Box<dyn ElementType>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type under its kind. A later registration for the same
    /// kind replaces the earlier one.
    pub fn register(&mut self, element: Box<dyn ElementType>) {
        self.types.insert(element.kind().to_string(), element);
    }

    /// Designates the registry's note type. The note is matched by this
    /// dedicated slot before the kind scan.
    pub fn register_note(&mut self, element: Box<dyn ElementType>) {
        self.note = Some(element);
    }

    /// Resolves a kind string to its type definition.
    pub fn lookup(&self, kind: &str) -> Option<&dyn ElementType> {
        if let Some(note) = &self.note
            && note.kind() == kind
        {
            return Some(note.as_ref());
        }
        self.types.get(kind).map(|t| t.as_ref())
    }

    /// The designated note type, if any.
    pub fn note(&self) -> Option<&dyn ElementType> {
        self.note.as_deref()
    }

    /// Iterates registered types in registration order, note last.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ElementType> {
        self.types
            .values()
            .map(|t| t.as_ref())
            .chain(self.note.as_deref())
    }
}

/// Resolves the effective size of a node.
///
/// Explicit persisted size takes priority over the type's computed default,
/// which in turn falls back to a background-specific or standard constant.
pub fn resolved_size(node: &DiagramNode, element: Option<&dyn ElementType>) -> Size {
    if let Some((w, h)) = node.persisted_size() {
        return Size::new(w, h);
    }
    if let Some(element) = element {
        if let Some(size) = element.size(&node.props) {
            return size;
        }
        if element.is_background() {
            return BACKGROUND_FALLBACK_SIZE;
        }
    }
    STANDARD_FALLBACK_SIZE
}
