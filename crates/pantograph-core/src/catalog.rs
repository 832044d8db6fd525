//! Built-in element types.
//!
//! The default palette for C4-style application diagrams: a user actor, the
//! common component kinds, and the background note. Applications can extend
//! or replace these through [`ElementRegistry`].

use serde_json::json;

use crate::element::{Category, ConnectContext, ConnectError, ElementRegistry, ElementType};
use crate::geometry::Size;
use crate::model::{DiagramNode, Props};

/// Builds a registry containing all built-in types, with the note installed
/// in the dedicated note slot.
pub fn builtin_registry() -> ElementRegistry {
    let mut registry = ElementRegistry::new();
    registry.register(Box::new(User));
    registry.register(Box::new(Gateway));
    registry.register(Box::new(Service));
    registry.register(Box::new(Api));
    registry.register(Box::new(Database));
    registry.register(Box::new(ExternalService));
    registry.register_note(Box::new(Note));
    registry
}

fn props_object(value: serde_json::Value) -> Props {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Props::new(),
    }
}

/// A person interacting with the system.
pub struct User;

impl ElementType for User {
    fn kind(&self) -> &str {
        "user"
    }

    fn title(&self) -> &str {
        "User"
    }

    fn category(&self) -> Category {
        Category::Actor
    }

    fn default_props(&self) -> Props {
        props_object(json!({ "description": "" }))
    }

    fn accepts_incoming(&self) -> bool {
        false
    }

    fn export_order(&self) -> i32 {
        10
    }

    fn verify_connect_to(&self, ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        if ctx.peer.category() == Category::Actor {
            return Err(ConnectError::new("an actor cannot depend on another actor"));
        }
        Ok(())
    }
}

/// An API gateway. The only built-in container: it may adopt `api` children.
pub struct Gateway;

impl ElementType for Gateway {
    fn kind(&self) -> &str {
        "gateway"
    }

    fn title(&self) -> &str {
        "Gateway"
    }

    fn category(&self) -> Category {
        Category::Component
    }

    fn default_props(&self) -> Props {
        props_object(json!({ "description": "", "technology": "" }))
    }

    fn accepts_children(&self) -> bool {
        true
    }

    fn export_order(&self) -> i32 {
        20
    }

    fn verify_nest_child(&self, ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        if ctx.peer.kind() != "api" {
            return Err(ConnectError::new(format!(
                "a gateway can only contain api nodes, not '{}'",
                ctx.peer.kind()
            )));
        }
        Ok(())
    }
}

/// A microservice.
pub struct Service;

impl ElementType for Service {
    fn kind(&self) -> &str {
        "service"
    }

    fn title(&self) -> &str {
        "Service"
    }

    fn category(&self) -> Category {
        Category::Component
    }

    fn default_props(&self) -> Props {
        props_object(json!({ "description": "", "technology": "" }))
    }

    fn export_order(&self) -> i32 {
        30
    }
}

/// A published API, nested under a gateway.
pub struct Api;

impl ElementType for Api {
    fn kind(&self) -> &str {
        "api"
    }

    fn title(&self) -> &str {
        "API"
    }

    fn category(&self) -> Category {
        Category::Component
    }

    fn default_props(&self) -> Props {
        props_object(json!({ "description": "", "path": "" }))
    }

    fn accepts_parents(&self) -> bool {
        true
    }

    fn export_order(&self) -> i32 {
        40
    }

    fn verify_nest_into_parent(&self, ctx: &ConnectContext<'_>) -> Result<(), ConnectError> {
        if ctx.peer.kind() != "gateway" {
            return Err(ConnectError::new(
                "an api can only be nested under a gateway",
            ));
        }
        // Containment is single-parent for apis: reject a second adoption.
        let child_id = &ctx.target.id;
        let has_parent = ctx
            .model
            .edges
            .iter()
            .any(|e| e.is_parent_child() && &e.target == child_id);
        if has_parent {
            return Err(ConnectError::new(format!(
                "api '{child_id}' already has a parent"
            )));
        }
        Ok(())
    }
}

/// A data store. Databases do not initiate calls.
pub struct Database;

impl ElementType for Database {
    fn kind(&self) -> &str {
        "database"
    }

    fn title(&self) -> &str {
        "Database"
    }

    fn category(&self) -> Category {
        Category::Component
    }

    fn default_props(&self) -> Props {
        props_object(json!({ "description": "", "engine": "" }))
    }

    fn accepts_outgoing(&self) -> bool {
        false
    }

    fn export_order(&self) -> i32 {
        50
    }
}

/// A system outside the boundary of this diagram.
pub struct ExternalService;

impl ElementType for ExternalService {
    fn kind(&self) -> &str {
        "external-service"
    }

    fn title(&self) -> &str {
        "External service"
    }

    fn category(&self) -> Category {
        Category::Component
    }

    fn default_props(&self) -> Props {
        props_object(json!({ "description": "", "owner": "" }))
    }

    fn export_order(&self) -> i32 {
        60
    }
}

/// A background annotation associated to the nodes it visually covers.
pub struct Note;

impl ElementType for Note {
    fn kind(&self) -> &str {
        "note"
    }

    fn title(&self) -> &str {
        "Note"
    }

    fn category(&self) -> Category {
        Category::Note
    }

    fn default_props(&self) -> Props {
        props_object(json!({
            "text": "## New note\n\nYou can write *Markdown* here.",
            "color": "yellow"
        }))
    }

    fn size(&self, _props: &Props) -> Option<Size> {
        None
    }

    fn is_background(&self) -> bool {
        true
    }

    fn is_resizable(&self) -> bool {
        true
    }

    fn label(&self, name: Option<&str>, _props: &Props) -> String {
        name.unwrap_or("Note").to_string()
    }

    fn export_order(&self) -> i32 {
        90
    }

    fn report_properties(&self, props: &Props, _node: &DiagramNode) -> Option<String> {
        let text = props.get("text").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() {
            Some("<em>(empty note)</em>".to_string())
        } else {
            Some(format!("<blockquote>{}</blockquote>", escape_html(text)))
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
