//! Pantograph Core Types and Definitions
//!
//! This crate provides the foundational types for the Pantograph diagram
//! editor. It includes:
//!
//! - **Model**: the persisted diagram document shape ([`model`] module) and
//!   its tolerant JSON validation
//! - **Geometry**: basic geometric types ([`geometry`] module)
//! - **Elements**: the element type registry mapping a node's `kind` string
//!   to its behavioral definition ([`element`] module), plus the built-in
//!   catalog ([`catalog`] module)

pub mod catalog;
pub mod element;
pub mod geometry;
pub mod model;
