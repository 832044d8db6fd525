//! HTML report generation.
//!
//! A [`ReportBuilder`] renders a [`DiagramDescriptor`] into a standalone
//! HTML document: metadata header, table of contents, then one section per
//! category (actors, components, notes) with per-node property blocks and
//! relationship lists. Everything user-controlled is HTML-escaped.
//!
//! Per-type rendering can be customized through the element type's
//! `report_properties` hook; nodes without one fall back to a
//! pretty-printed JSON block.

use std::collections::HashSet;
use std::fmt::Write;

use log::debug;

use pantograph_core::element::Category;
use pantograph_core::model::Props;

use crate::descriptor::{DiagramDescriptor, EdgeRef, NodeDescriptor, TypeGroup, export_cmp};

const HEAD_STYLES: &str = r#"<style>
  :root { color-scheme: light dark; }
  body { font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial; margin: 24px; line-height: 1.55; }
  h1 { margin: 0 0 4px 0; font-size: 20px; }
  h2 { margin: 20px 0 6px 0; font-size: 18px; }
  h3 { margin: 14px 0 6px 0; font-size: 15px; color: #334155; }
  h4 { margin: 10px 0 6px 0; font-size: 14px; color: #111827; }
  h5 { margin: 8px 0 6px 0; font-size: 13px; color: #475569; }
  p { margin: 6px 0 8px 0; }
  pre { background: #0b1220; color: #e2e8f0; padding: 10px 12px; border-radius: 8px; overflow: auto; }
  small { color: #64748b; }
  ul { margin: 6px 0 10px 18px; }
  li { margin: 2px 0; }
  blockquote { margin: 10px 0; padding: 8px 10px; background: #f8fafc; border-left: 3px solid #94a3b8; }
  code { background: #f1f5f9; padding: 1px 4px; border-radius: 4px; }
  hr { border: 0; border-top: 1px solid #e5e7eb; margin: 18px 0; }
  .meta { color: #475569; font-size: 12px; margin-bottom: 14px; }
  .counts { margin-top: 8px; color: #334155; }
  .toc { margin-top: 10px; padding: 10px 12px; background: #f8fafc; border: 1px solid #e5e7eb; border-radius: 8px; }
  .toc h3 { margin: 0 0 6px 0; font-size: 14px; color: #334155; }
</style>"#;

/// Renders a descriptor as a standalone HTML report.
pub struct ReportBuilder<'d, 'a> {
    descriptor: &'d DiagramDescriptor<'a>,
    hidden: HashSet<String>,
}

impl<'d, 'a> ReportBuilder<'d, 'a> {
    pub fn new(descriptor: &'d DiagramDescriptor<'a>) -> Self {
        Self {
            descriptor,
            hidden: HashSet::new(),
        }
    }

    /// Excludes every node of the given kind from the report.
    pub fn hide_kind(&mut self, kind: impl Into<String>) -> &mut Self {
        self.hidden.insert(kind.into());
        self
    }

    /// Builds the full HTML document.
    pub fn build(&self) -> String {
        let model = self.descriptor.model();
        let actors = self.visible(self.descriptor.actors_by_group());
        let components = self.visible(self.descriptor.components_by_group());
        let notes = self.visible(self.descriptor.notes_by_group());

        let mut html = String::new();
        html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\"/>\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\"/>\n");
        html.push_str("<title>Diagram report</title>\n");
        html.push_str(HEAD_STYLES);
        html.push_str("\n</head>\n<body>\n");
        html.push_str("<h1>Diagram summary</h1>\n");

        let _ = write!(
            html,
            "<div class=\"meta\">Version: <strong>{}</strong> · Created: <strong>{}</strong> · Updated: <strong>{}</strong>\
             <div class=\"counts\">Nodes: <strong>{}</strong> · Edges: <strong>{}</strong></div></div>\n",
            escape_html(&model.version),
            escape_html(model.created_at.as_deref().unwrap_or("-")),
            escape_html(model.updated_at.as_deref().unwrap_or("-")),
            model.nodes.len(),
            model.edges.len(),
        );

        html.push_str("<div class=\"toc\">\n<h3>Contents</h3>\n");
        self.render_toc(&mut html, "Actors", &actors);
        self.render_toc(&mut html, "Components", &components);
        self.render_toc(&mut html, "Notes", &notes);
        html.push_str("</div>\n");

        if !actors.is_empty() {
            html.push_str("<section id=\"actors\">\n<h2>Actors</h2>\n");
            for group in &actors {
                self.render_group(&mut html, group, Category::Actor);
            }
            html.push_str("</section>\n");
        }
        if !components.is_empty() {
            html.push_str("<section id=\"components\">\n<h2>Components</h2>\n");
            for group in &components {
                self.render_group(&mut html, group, Category::Component);
            }
            html.push_str("</section>\n");
        }
        if !notes.is_empty() {
            html.push_str("<section id=\"notes\">\n<h2>Notes</h2>\n");
            for group in &notes {
                self.render_note_group(&mut html, group);
            }
            html.push_str("</section>\n");
        }

        html.push_str("</body>\n</html>\n");
        debug!(bytes = html.len(); "Built diagram report");
        html
    }

    fn visible(&self, groups: Vec<TypeGroup<'d>>) -> Vec<TypeGroup<'d>> {
        groups
            .into_iter()
            .filter(|g| !self.hidden.contains(g.kind))
            .collect()
    }

    fn render_toc(&self, html: &mut String, title: &str, groups: &[TypeGroup<'d>]) {
        if groups.is_empty() {
            return;
        }
        let _ = write!(html, "<div><strong>{}</strong><ul>", escape_html(title));
        for group in groups {
            let _ = write!(html, "<li><strong>{}</strong><ul>", escape_html(group.title));
            for node in &group.nodes {
                let _ = write!(
                    html,
                    "<li><a href=\"#{}\">{}</a></li>",
                    node.anchor_id(),
                    escape_html(&node.label())
                );
            }
            html.push_str("</ul></li>");
        }
        html.push_str("</ul></div>\n");
    }

    fn render_group(&self, html: &mut String, group: &TypeGroup<'d>, category: Category) {
        let _ = write!(html, "<section>\n<h3>{}</h3>\n", escape_html(group.title));
        for node in &group.nodes {
            self.render_node(html, node, category);
        }
        html.push_str("</section>\n");
    }

    fn render_node(&self, html: &mut String, node: &NodeDescriptor<'a>, category: Category) {
        let _ = write!(
            html,
            "<section id=\"{}\">\n<h4>{}</h4>\n",
            node.anchor_id(),
            escape_html(&node.label())
        );
        let description = node.description();
        if !description.is_empty() {
            let _ = write!(html, "<p>{}</p>\n", escape_html(&description));
        }

        html.push_str("<h5>Properties</h5>\n");
        html.push_str(&self.properties_html(node));
        html.push('\n');

        if category == Category::Component {
            let actors: Vec<_> = self.descriptor.upstream_actors(node).collect();
            if !actors.is_empty() {
                html.push_str("<h5>Actors</h5><ul>");
                for actor in actors {
                    let _ = write!(html, "<li>{}</li>", self.node_ref(actor));
                }
                html.push_str("</ul>\n");
            }
        }

        self.render_edge_list(html, "Dependencies", self.descriptor.outgoing_lateral(node));
        if category != Category::Actor {
            self.render_edge_list(html, "Dependents", self.descriptor.incoming_lateral(node));
        }
        self.render_edge_list(html, "Parents", self.descriptor.parents(node));
        self.render_edge_list(html, "Children", self.descriptor.children(node));

        let notes: Vec<_> = self.descriptor.notes_under(node).collect();
        if !notes.is_empty() {
            html.push_str("<h5>Notes</h5><ul>");
            for note in notes {
                let _ = write!(html, "<li><strong>{}</strong>", escape_html(&note.label()));
                let text = note_text(note.properties());
                if !text.is_empty() {
                    let _ = write!(html, "<div><blockquote>{}</blockquote></div>", escape_html(&text));
                }
                html.push_str("</li>");
            }
            html.push_str("</ul>\n");
        }

        html.push_str("<hr/>\n</section>\n");
    }

    fn render_note_group(&self, html: &mut String, group: &TypeGroup<'d>) {
        let _ = write!(html, "<section>\n<h3>{}</h3>\n", escape_html(group.title));
        for note in &group.nodes {
            let _ = write!(
                html,
                "<section id=\"{}\">\n<h4>{} · {}</h4>\n",
                note.anchor_id(),
                escape_html(group.title),
                escape_html(&note.label())
            );
            let description = note.description();
            if !description.is_empty() {
                let _ = write!(html, "<p>{}</p>\n", escape_html(&description));
            }
            html.push_str("<h5>Properties</h5>\n");
            html.push_str(&self.properties_html(note));
            html.push('\n');

            // Nodes the note visually covers, grouped by their type.
            let mut over: Vec<_> = self.descriptor.nodes_over(note).collect();
            over.sort_by(|a, b| export_cmp(a, b));
            if !over.is_empty() {
                html.push_str("<h5>Nodes over this note</h5>\n");
                let mut current_title: Option<&str> = None;
                for covered in over {
                    let title = covered.type_title();
                    if current_title != Some(title) {
                        if current_title.is_some() {
                            html.push_str("</ul></div>\n");
                        }
                        let _ = write!(
                            html,
                            "<div><strong>{}</strong><ul>",
                            escape_html(title)
                        );
                        current_title = Some(title);
                    }
                    let _ = write!(html, "<li>{}</li>", self.node_ref(covered));
                }
                if current_title.is_some() {
                    html.push_str("</ul></div>\n");
                }
            }
            html.push_str("<hr/>\n</section>\n");
        }
        html.push_str("</section>\n");
    }

    fn render_edge_list<'e>(
        &self,
        html: &mut String,
        title: &str,
        edges: impl Iterator<Item = EdgeRef<'e, 'a>>,
    ) where
        'a: 'e,
    {
        let items: Vec<String> = edges
            .map(|e| {
                let mut item = format!("<li>{}", self.node_ref(e.node));
                if !e.edge.props.is_empty() {
                    let _ = write!(item, " <pre>{}</pre>", pre_json(&e.edge.props));
                }
                item.push_str("</li>");
                item
            })
            .collect();
        if items.is_empty() {
            return;
        }
        let _ = write!(html, "<h5>{}</h5><ul>", escape_html(title));
        for item in items {
            html.push_str(&item);
        }
        html.push_str("</ul>\n");
    }

    fn node_ref(&self, node: &NodeDescriptor<'a>) -> String {
        let description = node.description();
        let mut html = format!(
            "<a href=\"#{}\"><strong>{}</strong></a> <small>({})</small>",
            node.anchor_id(),
            escape_html(&node.label()),
            escape_html(node.type_title())
        );
        if !description.is_empty() {
            let _ = write!(html, " — {}", escape_html(&description));
        }
        html
    }

    fn properties_html(&self, node: &NodeDescriptor<'a>) -> String {
        node.element()
            .and_then(|e| e.report_properties(node.properties(), node.node()))
            .unwrap_or_else(|| format!("<pre>{}</pre>", pre_json(node.properties())))
    }
}

fn note_text(props: &Props) -> String {
    for key in ["text", "markdown", "description"] {
        if let Some(text) = props.get(key).and_then(|v| v.as_str()) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    String::new()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn pre_json(props: &Props) -> String {
    let value = serde_json::Value::Object(props.clone());
    match serde_json::to_string_pretty(&value) {
        Ok(json) => escape_html(&json),
        Err(_) => String::new(),
    }
}
