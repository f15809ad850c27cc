//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - identifiers (`VariableId`, `EntityId`, `Time`, `ColumnSlug`)
//! - fetched variable payloads (`VariableMixedData`, `VariableMetadata`)
//! - chart bindings (`ChartDimension`, `VariableDisplayConfig`)

pub mod types;

pub use types::*;
