//! Dimension bindings: column slugs and display resolution.

pub mod display;

pub use display::*;

use crate::domain::{ChartDimension, ColumnSlug, Time, VariableId};

/// Column slug for a variable, optionally pinned to a target year.
///
/// Dimensions that need the same data (same variable, same target year) get the
/// same slug and therefore share one column.
pub fn column_slug(variable_id: VariableId, target_year: Option<Time>) -> ColumnSlug {
    match target_year {
        Some(year) => format!("{variable_id}-{year}"),
        None => variable_id.to_string(),
    }
}

impl ChartDimension {
    /// The slug this dimension reads from: explicit slug first, derived otherwise.
    pub fn column_slug(&self) -> ColumnSlug {
        match &self.slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => column_slug(self.variable_id, self.target_year),
        }
    }
}
