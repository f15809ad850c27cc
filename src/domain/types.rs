//! Shared domain types.
//!
//! The wire types mirror the JSON documents served by the data API
//! (`{id}.data.json` and `{id}.metadata.json`), so they derive `Deserialize`
//! with camelCase field names. Unset optional fields are skipped on output.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a remotely-sourced indicator.
pub type VariableId = u64;

/// Identifier of a row subject (country, region, ...). The join key everywhere.
pub type EntityId = i64;

/// A year, or a day offset from `zeroDay` when the display sets `yearIsDay`.
pub type Time = i32;

/// Stable identifier of a column in a `Table`.
pub type ColumnSlug = String;

/// Loaded variables keyed by id.
pub type VariableDataMap = BTreeMap<VariableId, Arc<VariableDataMetadata>>;

/// A chart role a variable can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionProperty {
    Y,
    X,
    Size,
    Color,
    Table,
}

impl DimensionProperty {
    pub const ALL: [DimensionProperty; 5] = [
        DimensionProperty::Y,
        DimensionProperty::X,
        DimensionProperty::Size,
        DimensionProperty::Color,
        DimensionProperty::Table,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DimensionProperty::Y => "y",
            DimensionProperty::X => "x",
            DimensionProperty::Size => "size",
            DimensionProperty::Color => "color",
            DimensionProperty::Table => "table",
        }
    }
}

impl std::fmt::Display for DimensionProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for DimensionProperty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DimensionProperty::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown dimension property '{s}'. Expected one of: y, x, size, color, table."))
    }
}

/// How numbers of a variable are rounded for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundingMode {
    #[default]
    DecimalPlaces,
    SignificantFigures,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDisplayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_absolute_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_relative_change: Option<bool>,
}

/// Display settings of a variable, or a per-dimension override of them.
///
/// Every field is optional: `None` means "unset" and falls through to the next
/// layer during resolution (see `dimension::resolve_display`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDisplayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_projection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding_mode: Option<RoundingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_decimal_places: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_significant_figures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_is_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_annotations_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_in_table: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_display: Option<TableDisplayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_markers_only_in_line_chart: Option<bool>,
}

/// A binding of a chart role to a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDimension {
    pub property: DimensionProperty,
    pub variable_id: VariableId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_year: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<VariableDisplayConfig>,
    /// Explicit column slug; derived from the variable id otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<ColumnSlug>,
}

impl ChartDimension {
    pub fn new(property: DimensionProperty, variable_id: VariableId) -> Self {
        Self {
            property,
            variable_id,
            target_year: None,
            display: None,
            slug: None,
        }
    }

    pub fn with_target_year(mut self, target_year: Time) -> Self {
        self.target_year = Some(target_year);
        self
    }

    pub fn with_display(mut self, display: VariableDisplayConfig) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_slug(mut self, slug: impl Into<ColumnSlug>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// A single datum: numeric or categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatumValue {
    Number(f64),
    Text(String),
}

/// The `{id}.data.json` payload: three parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMixedData {
    pub years: Vec<Time>,
    pub entities: Vec<EntityId>,
    pub values: Vec<DatumValue>,
}

impl VariableMixedData {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the three arrays line up.
    pub fn is_aligned(&self) -> bool {
        self.years.len() == self.entities.len() && self.entities.len() == self.values.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Float,
    Int,
    Mixed,
    Ordinal,
    #[serde(other)]
    Unknown,
}

/// One value of a metadata dimension (an entity, or a year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionValue {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDimension {
    #[serde(default)]
    pub values: Vec<DimensionValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDimensions {
    #[serde(default)]
    pub years: VariableDimension,
    #[serde(default)]
    pub entities: VariableDimension,
}

/// The `{id}.metadata.json` payload.
///
/// `id` is required by the converter but optional on the wire so that a
/// document without it is reported as a configuration error instead of a
/// parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMetadata {
    #[serde(default)]
    pub id: Option<VariableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timespan: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<VariableType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<VariableDisplayConfig>,
    #[serde(default)]
    pub dimensions: VariableDimensions,
}

/// Data and metadata of one variable, as fetched together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDataMetadata {
    pub data: VariableMixedData,
    pub metadata: VariableMetadata,
}

/// A row subject resolved from metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_display_config_serializes_empty() {
        let config = VariableDisplayConfig::default();
        assert_eq!(serde_json::to_string(&config).unwrap(), "{}");

        let config = VariableDisplayConfig {
            short_unit: Some("kwh".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"shortUnit":"kwh"}"#);
    }

    #[test]
    fn dimension_serializes_without_unset_fields() {
        let dim = ChartDimension::new(DimensionProperty::X, 1);
        assert_eq!(
            serde_json::to_value(&dim).unwrap(),
            serde_json::json!({ "property": "x", "variableId": 1 })
        );
    }

    #[test]
    fn parses_mixed_data_payload() {
        let json = r#"{"years":[2000,2001],"entities":[1,2],"values":[1.5,"high"]}"#;
        let data: VariableMixedData = serde_json::from_str(json).unwrap();
        assert_eq!(data.values[0], DatumValue::Number(1.5));
        assert_eq!(data.values[1], DatumValue::Text("high".to_string()));
        assert!(data.is_aligned());
    }

    #[test]
    fn parses_metadata_with_unknown_type_and_fields() {
        let json = r#"{
            "id": 42,
            "name": "GDP",
            "type": "something-new",
            "display": {"numDecimalPlaces": 2, "roundingMode": "significantFigures"},
            "dimensions": {"entities": {"values": [{"id": 1, "name": "Canada", "code": "CAN"}]}},
            "origins": []
        }"#;
        let meta: VariableMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.id, Some(42));
        assert_eq!(meta.variable_type, Some(VariableType::Unknown));
        let display = meta.display.unwrap();
        assert_eq!(display.num_decimal_places, Some(2));
        assert_eq!(display.rounding_mode, Some(RoundingMode::SignificantFigures));
        assert_eq!(meta.dimensions.entities.values[0].code.as_deref(), Some("CAN"));
    }

    #[test]
    fn dimension_property_parses_case_insensitively() {
        assert_eq!("Y".parse::<DimensionProperty>().unwrap(), DimensionProperty::Y);
        assert_eq!("color".parse::<DimensionProperty>().unwrap(), DimensionProperty::Color);
        assert!("z".parse::<DimensionProperty>().is_err());
    }
}
