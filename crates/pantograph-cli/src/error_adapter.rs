//! Adapters turning CLI errors into miette diagnostics.
//!
//! The graphical report handler renders one diagnostic at a time; this
//! module flattens an error and its source chain into independently
//! renderable items.

use miette::Diagnostic;
use thiserror::Error;

use pantograph::PantographError;

use crate::CliError;

/// A self-contained diagnostic for the graphical report handler.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct Reportable {
    message: String,

    #[help]
    help: Option<String>,
}

/// Flattens an error and its source chain into independent diagnostics,
/// outermost first.
pub fn to_reportables(err: &CliError) -> Vec<Reportable> {
    let mut reportables = vec![Reportable {
        message: err.to_string(),
        help: help_for(err),
    }];

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        reportables.push(Reportable {
            message: cause.to_string(),
            help: None,
        });
        source = cause.source();
    }

    reportables
}

fn help_for(err: &CliError) -> Option<String> {
    match err {
        CliError::Pantograph(PantographError::Validation(_)) => Some(
            "check that the input file is a diagram document with version, nodes, and edges"
                .to_string(),
        ),
        CliError::Config(_) => {
            Some("check the TOML configuration file for syntax errors".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_carry_a_hint() {
        let err = CliError::Pantograph(
            pantograph::model::DiagramModel::from_json("not json")
                .map_err(PantographError::from)
                .unwrap_err(),
        );
        let reportables = to_reportables(&err);
        assert!(!reportables.is_empty());
        assert!(reportables[0].help.is_some());
    }

    #[test]
    fn io_errors_flatten_without_hint() {
        let err = CliError::Io(std::io::Error::other("disk on fire"));
        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);
        assert!(reportables[0].help.is_none());
        assert!(reportables[0].to_string().contains("disk on fire"));
    }
}
