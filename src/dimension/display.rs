//! Effective display settings of a column.
//!
//! Resolution order per field:
//!
//! 1. the dimension's `display` override
//! 2. the variable's own `display`
//! 3. the variable's top-level metadata (`name`, `unit`, `shortUnit`)
//! 4. a fixed default

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{RoundingMode, TableDisplayConfig, VariableDisplayConfig, VariableMetadata};

pub const DEFAULT_NUM_SIGNIFICANT_FIGURES: u32 = 3;
/// Upper bound on decimal places; metadata asking for more is clamped.
pub const MAX_DECIMAL_PLACES: u32 = 20;
/// Significant figures are clamped to `1..=MAX_SIGNIFICANT_FIGURES`.
pub const MAX_SIGNIFICANT_FIGURES: u32 = 17;

/// Fully resolved display configuration used for formatting and colouring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveDisplay {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub short_unit: Option<String>,
    pub is_projection: bool,
    pub conversion_factor: f64,
    pub rounding_mode: RoundingMode,
    /// Unset means "pick from the value's magnitude" at format time.
    pub num_decimal_places: Option<u32>,
    pub num_significant_figures: u32,
    pub tolerance: u32,
    pub year_is_day: bool,
    pub zero_day: NaiveDate,
    pub entity_annotations_map: Option<String>,
    pub include_in_table: bool,
    pub table_display: TableDisplayConfig,
    pub color: Option<String>,
    pub plot_markers_only_in_line_chart: bool,
}

impl Default for EffectiveDisplay {
    fn default() -> Self {
        resolve_layers(&VariableDisplayConfig::default(), &VariableMetadata::default())
    }
}

impl VariableDisplayConfig {
    /// Layer `self` over `base`: every field set on `self` wins.
    pub fn merged_over(&self, base: &VariableDisplayConfig) -> VariableDisplayConfig {
        VariableDisplayConfig {
            name: self.name.clone().or_else(|| base.name.clone()),
            unit: self.unit.clone().or_else(|| base.unit.clone()),
            short_unit: self.short_unit.clone().or_else(|| base.short_unit.clone()),
            is_projection: self.is_projection.or(base.is_projection),
            conversion_factor: self.conversion_factor.or(base.conversion_factor),
            rounding_mode: self.rounding_mode.or(base.rounding_mode),
            num_decimal_places: self.num_decimal_places.or(base.num_decimal_places),
            num_significant_figures: self.num_significant_figures.or(base.num_significant_figures),
            tolerance: self.tolerance.or(base.tolerance),
            year_is_day: self.year_is_day.or(base.year_is_day),
            zero_day: self.zero_day.clone().or_else(|| base.zero_day.clone()),
            entity_annotations_map: self
                .entity_annotations_map
                .clone()
                .or_else(|| base.entity_annotations_map.clone()),
            include_in_table: self.include_in_table.or(base.include_in_table),
            table_display: self.table_display.clone().or_else(|| base.table_display.clone()),
            color: self.color.clone().or_else(|| base.color.clone()),
            plot_markers_only_in_line_chart: self
                .plot_markers_only_in_line_chart
                .or(base.plot_markers_only_in_line_chart),
        }
    }
}

/// Resolve the display settings of a dimension bound to `metadata`.
pub fn resolve_display(
    metadata: &VariableMetadata,
    dimension_override: Option<&VariableDisplayConfig>,
) -> EffectiveDisplay {
    let variable_display = metadata.display.clone().unwrap_or_default();
    let merged = match dimension_override {
        Some(over) => over.merged_over(&variable_display),
        None => variable_display,
    };
    resolve_layers(&merged, metadata)
}

fn resolve_layers(merged: &VariableDisplayConfig, metadata: &VariableMetadata) -> EffectiveDisplay {
    EffectiveDisplay {
        name: merged.name.clone().or_else(|| metadata.name.clone()),
        unit: merged.unit.clone().or_else(|| metadata.unit.clone()),
        short_unit: merged.short_unit.clone().or_else(|| metadata.short_unit.clone()),
        is_projection: merged.is_projection.unwrap_or(false),
        conversion_factor: merged.conversion_factor.unwrap_or(1.0),
        rounding_mode: merged.rounding_mode.unwrap_or_default(),
        num_decimal_places: merged.num_decimal_places.map(|p| p.min(MAX_DECIMAL_PLACES)),
        num_significant_figures: merged
            .num_significant_figures
            .unwrap_or(DEFAULT_NUM_SIGNIFICANT_FIGURES)
            .clamp(1, MAX_SIGNIFICANT_FIGURES),
        tolerance: merged.tolerance.unwrap_or(0),
        year_is_day: merged.year_is_day.unwrap_or(false),
        zero_day: resolve_zero_day(merged.zero_day.as_deref()),
        entity_annotations_map: merged.entity_annotations_map.clone(),
        include_in_table: merged.include_in_table.unwrap_or(true),
        table_display: merged.table_display.clone().unwrap_or_default(),
        color: merged.color.clone(),
        plot_markers_only_in_line_chart: merged.plot_markers_only_in_line_chart.unwrap_or(false),
    }
}

/// Day zero for variables whose times are day offsets.
pub fn default_zero_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 21).unwrap_or(NaiveDate::MIN)
}

fn resolve_zero_day(raw: Option<&str>) -> NaiveDate {
    let Some(raw) = raw else {
        return default_zero_day();
    };
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date,
        Err(e) => {
            tracing::warn!(zero_day = raw, "ignoring unparseable zeroDay: {e}");
            default_zero_day()
        }
    }
}
