//! Terminal output for the `grapher` binary.
//!
//! Formatting lives here so the table/fetch code stays free of presentation
//! and output changes stay localized.

use crate::dimension::EffectiveDisplay;
use crate::domain::{VariableDataMetadata, VariableId};
use crate::table::{ResolvedDimension, Table};
use crate::url::{GrapherQueryState, UrlParts, join_url};

pub mod format;

pub use format::*;

const ENTITY_WIDTH: usize = 24;
const CELL_WIDTH: usize = 14;

/// Shape of the table plus one line per column.
pub fn format_table_summary(table: &Table, dimensions: &[ResolvedDimension]) -> String {
    let mut out = String::new();

    out.push_str("=== grapher table ===\n");
    out.push_str(&format!(
        "Rows: {} | entities: {} | columns: {}\n",
        table.num_rows(),
        table.entities().count(),
        table.num_columns()
    ));
    let times = table.times();
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        out.push_str(&format!("Times: {first}..{last} ({} distinct)\n", times.len()));
    }

    out.push_str("\nDimensions:\n");
    for dim in dimensions {
        out.push_str(&format!(
            "- {:<6} variable {} -> {}\n",
            dim.property, dim.variable_id, dim.slug
        ));
    }

    out.push_str("\nColumns:\n");
    for column in table.columns() {
        let range = column
            .numeric_range()
            .map(|(lo, hi)| {
                format!(
                    " | range=[{}, {}]",
                    format_value(lo, &column.display),
                    format_value(hi, &column.display)
                )
            })
            .unwrap_or_default();
        let target = column
            .target_year
            .map(|y| format!(" | target year {y} (±{})", column.display.tolerance))
            .unwrap_or_default();
        out.push_str(&format!(
            "- {:<12} {} | valid={}/{}{range}{target}\n",
            column.slug,
            column.name,
            column.num_valid(),
            column.len()
        ));
    }

    out
}

/// The first `limit` rows, one column per slug.
pub fn format_table_rows(table: &Table, limit: usize) -> String {
    let mut out = String::new();

    let mut header = format!("{:<ENTITY_WIDTH$} {:>8}", "entity", "time");
    for slug in table.column_slugs() {
        header.push_str(&format!(" {:>CELL_WIDTH$}", truncate(slug, CELL_WIDTH)));
    }
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(&"-".repeat(header.trim_end().chars().count()));
    out.push('\n');

    // Time formatting follows the first column (all columns of a table share
    // one time axis).
    let time_display = table.columns().next().map(|c| c.display.clone()).unwrap_or_default();

    for (idx, row) in table.rows().iter().take(limit).enumerate() {
        let entity = table
            .entity_name(row.entity_id)
            .map(str::to_string)
            .unwrap_or_else(|| row.entity_id.to_string());
        let mut line = format!(
            "{:<ENTITY_WIDTH$} {:>8}",
            truncate(&entity, ENTITY_WIDTH),
            format_time(row.time, &time_display)
        );
        for column in table.columns() {
            let cell = format_cell(&column.values[idx], &column.display);
            line.push_str(&format!(" {:>CELL_WIDTH$}", truncate(&cell, CELL_WIDTH)));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if table.num_rows() > limit {
        out.push_str(&format!("... {} more rows\n", table.num_rows() - limit));
    }

    out
}

/// Metadata and effective display settings of one variable.
pub fn format_variable(variable_id: VariableId, variable: &VariableDataMetadata, display: &EffectiveDisplay) -> String {
    let metadata = &variable.metadata;
    let mut out = String::new();

    out.push_str(&format!("=== variable {variable_id} ===\n"));
    out.push_str(&format!("Name: {}\n", metadata.name.as_deref().unwrap_or("(unnamed)")));
    if let Some(description) = &metadata.description {
        out.push_str(&format!("Description: {}\n", description.trim()));
    }
    if let Some(dataset) = &metadata.dataset_name {
        out.push_str(&format!("Dataset: {dataset}\n"));
    }
    if let Some(timespan) = &metadata.timespan {
        out.push_str(&format!("Timespan: {timespan}\n"));
    }
    out.push_str(&format!(
        "Data points: {} | entities: {} | years: {}\n",
        variable.data.len(),
        metadata.dimensions.entities.values.len(),
        metadata.dimensions.years.values.len()
    ));

    out.push_str("\nEffective display:\n");
    out.push_str(&format!("- name: {}\n", display.name.as_deref().unwrap_or("")));
    out.push_str(&format!(
        "- unit: {} (short: {})\n",
        display.unit.as_deref().unwrap_or(""),
        display.short_unit.as_deref().unwrap_or("")
    ));
    out.push_str(&format!("- rounding: {:?}", display.rounding_mode));
    match display.num_decimal_places {
        Some(places) => out.push_str(&format!(", {places} decimal places\n")),
        None => out.push_str(", decimal places from magnitude\n"),
    }
    out.push_str(&format!("- significant figures: {}\n", display.num_significant_figures));
    out.push_str(&format!("- conversion factor: {}\n", display.conversion_factor));
    out.push_str(&format!("- tolerance: {}\n", display.tolerance));
    if display.year_is_day {
        out.push_str(&format!("- times are days since {}\n", display.zero_day));
    }
    out.push_str(&format!("- include in table: {}\n", display.include_in_table));

    out
}

/// Before/after of a URL migration.
pub fn format_migration(before: &UrlParts, after: &UrlParts, state: &GrapherQueryState) -> String {
    let mut out = String::new();
    let changed = before.params != after.params;

    out.push_str(&format!("Input:    {}\n", join_url(before)));
    out.push_str(&format!("Migrated: {}\n", join_url(after)));
    if !changed {
        out.push_str("(already current)\n");
    }

    out.push_str("\nRecognized state:\n");
    if let Some(entities) = &state.selected_entities {
        out.push_str(&format!("- entities: {}\n", entities.join(", ")));
    }
    if let Some(time) = &state.time {
        out.push_str(&format!("- time: {}\n", time.as_param()));
    }
    if let Some(tab) = state.tab {
        out.push_str(&format!("- tab: {}\n", tab.as_param()));
    }
    if let Some(scale) = state.x_scale {
        out.push_str(&format!("- xScale: {}\n", scale.as_param()));
    }
    if let Some(scale) = state.y_scale {
        out.push_str(&format!("- yScale: {}\n", scale.as_param()));
    }
    if let Some(scheme) = &state.color_scale.scheme {
        out.push_str(&format!("- colorScheme: {scheme}\n"));
    }
    if let Some(invert) = state.color_scale.invert {
        out.push_str(&format!("- colorSchemeInvert: {invert}\n"));
    }
    if let Some(bins) = &state.color_scale.bins {
        let bins: Vec<String> = bins.iter().map(f64::to_string).collect();
        out.push_str(&format!("- colorScaleBins: {}\n", bins.join(", ")));
    }

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
