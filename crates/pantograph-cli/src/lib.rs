//! CLI logic for the Pantograph diagram tool.
//!
//! This module contains the core CLI logic for the Pantograph diagram tool.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::fs;

use log::info;
use thiserror::Error;

use pantograph::descriptor::DiagramDescriptor;
use pantograph::report::ReportBuilder;
use pantograph::{PantographError, catalog, model::DiagramModel};

/// Errors surfaced to the CLI user.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Pantograph(#[from] PantographError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Run the Pantograph CLI application
///
/// Dispatches the selected subcommand against the input document.
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Document validation errors
pub fn run(args: &Args) -> Result<(), CliError> {
    let app_config = config::load_config(args.config.as_ref())?;
    let registry = catalog::builtin_registry();

    match &args.command {
        Command::Validate { input } => {
            info!(input_path = input.as_str(); "Validating diagram");
            let model = load_model(input)?;
            println!(
                "{input}: OK ({} nodes, {} edges, {} views)",
                model.nodes.len(),
                model.edges.len(),
                model.views.len()
            );
        }
        Command::Layout { input, output } => {
            info!(input_path = input.as_str(), output_path = output.as_str(); "Hydrating diagram");
            let mut model = load_model(input)?;
            let engine = app_config.layout().engine();
            let hydrated = engine.layout(&model, &registry);
            for (node, positioned) in model.nodes.iter_mut().zip(&hydrated.nodes) {
                node.position = Some(positioned.position);
            }
            let json = model.to_json().map_err(PantographError::from)?;
            fs::write(output, json)?;
            info!(output_file = output.as_str(); "Positioned diagram written");
        }
        Command::Report { input, output } => {
            info!(input_path = input.as_str(), output_path = output.as_str(); "Building report");
            let model = load_model(input)?;
            let descriptor = DiagramDescriptor::new(&model, &registry);
            let mut builder = ReportBuilder::new(&descriptor);
            for kind in app_config.report().hidden_kinds() {
                builder.hide_kind(kind.clone());
            }
            let html = builder.build();
            fs::write(output, html)?;
            info!(output_file = output.as_str(); "Report written");
        }
    }

    Ok(())
}

fn load_model(path: &str) -> Result<DiagramModel, CliError> {
    let raw = fs::read_to_string(path)?;
    let model = DiagramModel::from_json(&raw).map_err(PantographError::from)?;
    Ok(model)
}
