//! Command-line argument definitions for the Pantograph CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the subcommand, input/output paths,
//! configuration file, and logging verbosity.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Pantograph diagram tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Operations on diagram documents
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a diagram document against the schema
    Validate {
        /// Path to the input diagram JSON file
        input: String,
    },

    /// Hydrate a diagram, assigning positions to unplaced nodes
    Layout {
        /// Path to the input diagram JSON file
        input: String,

        /// Path to the output JSON file
        #[arg(short, long, default_value = "out.json")]
        output: String,
    },

    /// Build an HTML report from a diagram document
    Report {
        /// Path to the input diagram JSON file
        input: String,

        /// Path to the output HTML file
        #[arg(short, long, default_value = "out.html")]
        output: String,
    },
}
