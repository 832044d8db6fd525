//! Configuration types for the diagram editor.
//!
//! This module provides configuration structures that control layout
//! spacing, history retention, and report output. All types implement
//! [`serde::Deserialize`] for flexible loading from external sources.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level application configuration.
//! - [`LayoutConfig`] - Spacing knobs for the hydration layout engine.
//! - [`HistoryConfig`] - Undo stack depth and capture idle window.
//! - [`ReportConfig`] - Element kinds excluded from HTML reports.
//!
//! # Example
//!
//! ```
//! # use pantograph::config::AppConfig;
//! let config = AppConfig::default();
//! let engine = config.layout().engine();
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::history::History;
use crate::layout::LayoutEngine;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Layout configuration section.
    #[serde(default)]
    layout: LayoutConfig,

    /// History configuration section.
    #[serde(default)]
    history: HistoryConfig,

    /// Report configuration section.
    #[serde(default)]
    report: ReportConfig,
}

impl AppConfig {
    pub fn new(layout: LayoutConfig, history: HistoryConfig, report: ReportConfig) -> Self {
        Self {
            layout,
            history,
            report,
        }
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the history configuration.
    pub fn history(&self) -> &HistoryConfig {
        &self.history
    }

    /// Returns the report configuration.
    pub fn report(&self) -> &ReportConfig {
        &self.report
    }
}

/// Spacing configuration for the hydration layout engine.
///
/// Unset fields fall back to the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutConfig {
    /// Horizontal distance between computed columns.
    #[serde(default)]
    column_width: Option<f32>,

    /// Left margin applied to computed columns.
    #[serde(default)]
    pad_x: Option<f32>,

    /// Top margin used by the index fallback.
    #[serde(default)]
    pad_y: Option<f32>,

    /// Vertical spacing of the index fallback.
    #[serde(default)]
    row_step: Option<f32>,

    /// Minimum vertical gap between nodes in a column.
    #[serde(default)]
    vertical_padding: Option<f32>,
}

impl LayoutConfig {
    /// Builds a [`LayoutEngine`] with the configured overrides applied.
    pub fn engine(&self) -> LayoutEngine {
        let mut engine = LayoutEngine::new();
        if let Some(width) = self.column_width {
            engine.set_column_width(width);
        }
        if let Some(pad) = self.pad_x {
            engine.set_pad_x(pad);
        }
        if let Some(pad) = self.pad_y {
            engine.set_pad_y(pad);
        }
        if let Some(step) = self.row_step {
            engine.set_row_step(step);
        }
        if let Some(padding) = self.vertical_padding {
            engine.set_vertical_padding(padding);
        }
        engine
    }
}

/// Undo/redo history configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryConfig {
    /// Maximum retained snapshots.
    #[serde(default)]
    limit: Option<usize>,

    /// Idle window in milliseconds before a coalesced capture fires.
    #[serde(default)]
    idle_window_ms: Option<u64>,
}

impl HistoryConfig {
    /// Builds a [`History`] with the configured overrides applied.
    pub fn history(&self) -> History {
        let mut history = match self.limit {
            Some(limit) => History::with_limit(limit),
            None => History::new(),
        };
        if let Some(ms) = self.idle_window_ms {
            history.set_idle_window(Duration::from_millis(ms));
        }
        history
    }
}

/// Report output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Element kinds excluded from generated reports.
    #[serde(default)]
    hide: Vec<String>,
}

impl ReportConfig {
    /// Returns the element kinds excluded from reports.
    pub fn hidden_kinds(&self) -> &[String] {
        &self.hide
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_defaults() {
        let config = AppConfig::default();
        // Unset overrides leave the engine at its defaults.
        let engine = config.layout().engine();
        assert_eq!(format!("{engine:?}"), format!("{:?}", LayoutEngine::new()));
    }

    #[test]
    fn deserializes_partial_sections() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "layout": {"column_width": 240.0},
                "history": {"limit": 10, "idle_window_ms": 50},
                "report": {"hide": ["note"]}
            }"#,
        )
        .unwrap();
        assert_eq!(config.report().hidden_kinds(), ["note".to_string()]);
        let _ = config.layout().engine();
        let _ = config.history().history();
    }
}
