//! Pantograph - an editing core for C4-style architecture diagrams.
//!
//! Loading, layout, derived-relationship computation, undo/redo, and export
//! for diagram documents. The crate is UI-agnostic: it owns the document and
//! its editing semantics while the embedding application provides rendering
//! and dialogs.
//!
//! # Examples
//!
//! ```rust
//! use pantograph::Workbench;
//! use pantograph_core::catalog::builtin_registry;
//! use pantograph_core::geometry::Point;
//!
//! let mut bench = Workbench::new(builtin_registry());
//! let user = bench.add_element("user", Point::new(0.0, 0.0)).unwrap();
//! let service = bench.add_element("service", Point::new(200.0, 0.0)).unwrap();
//! bench.connect(&user, &service, None, None).unwrap();
//!
//! let model = bench.serialize();
//! assert_eq!(model.nodes.len(), 2);
//! ```

pub mod clipboard;
pub mod config;
pub mod descriptor;
pub mod history;
pub mod layout;
pub mod report;
pub mod storage;
pub mod workbench;

mod error;

pub use error::PantographError;

pub use descriptor::DiagramDescriptor;
pub use history::History;
pub use layout::{Hydrator, LayoutEngine};
pub use report::ReportBuilder;
pub use workbench::Workbench;

pub use pantograph_core::{catalog, element, geometry, model};
