//! Legacy variables + dimensions → columnar `Table`.
//!
//! The conversion is a pure function of its inputs:
//!
//! 1. every dimension must reference a loaded, well-formed variable
//! 2. each dimension gets a column slug (explicit, or derived from
//!    `variableId` / `targetYear`)
//! 3. rows are the union of `(entity, year)` pairs over the referenced variables
//! 4. one column per distinct slug; cells without a datum are `NoData`

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::Serialize;

use crate::dimension::resolve_display;
use crate::domain::{
    ChartDimension, ColumnSlug, DatumValue, DimensionProperty, Entity, EntityId, Time, VariableDataMap,
    VariableDataMetadata, VariableDisplayConfig, VariableId,
};
use crate::error::TableError;
use crate::table::{CellValue, Column, RowKey, Table};

/// A dimension whose column slug is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDimension {
    pub property: DimensionProperty,
    pub variable_id: VariableId,
    pub target_year: Option<Time>,
    pub display: Option<VariableDisplayConfig>,
    pub slug: ColumnSlug,
}

impl ResolvedDimension {
    fn from_dimension(dim: &ChartDimension) -> Self {
        Self {
            property: dim.property,
            variable_id: dim.variable_id,
            target_year: dim.target_year,
            display: dim.display.clone(),
            slug: dim.column_slug(),
        }
    }

    pub fn to_dimension(&self) -> ChartDimension {
        ChartDimension {
            property: self.property,
            variable_id: self.variable_id,
            target_year: self.target_year,
            display: self.display.clone(),
            slug: Some(self.slug.clone()),
        }
    }
}

/// Join `data` into a table according to `dimensions`.
///
/// Fails on configuration errors (unknown variable, metadata without an id,
/// misaligned data arrays, one slug bound to two variables). A referenced
/// variable without data points is fine: its column is all `NoData`.
pub fn legacy_to_table(
    data: &VariableDataMap,
    dimensions: &[ChartDimension],
) -> Result<(Table, Vec<ResolvedDimension>), TableError> {
    let mut referenced: BTreeMap<VariableId, &VariableDataMetadata> = BTreeMap::new();
    for dim in dimensions {
        let variable = data
            .get(&dim.variable_id)
            .ok_or(TableError::UnknownVariable {
                variable_id: dim.variable_id,
                property: dim.property,
            })?;
        validate_variable(dim.variable_id, variable)?;
        referenced.insert(dim.variable_id, variable.as_ref());
    }

    let resolved: Vec<ResolvedDimension> = dimensions.iter().map(ResolvedDimension::from_dimension).collect();
    ensure_unique_slug_owners(&resolved)?;

    let rows: Vec<RowKey> = referenced
        .values()
        .flat_map(|variable| {
            variable
                .data
                .entities
                .iter()
                .zip(&variable.data.years)
                .map(|(&entity_id, &time)| RowKey { entity_id, time })
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let row_index: HashMap<RowKey, usize> = rows.iter().enumerate().map(|(idx, key)| (*key, idx)).collect();

    let entities = collect_entities(&referenced, &rows);

    let mut columns: IndexMap<ColumnSlug, Column> = IndexMap::new();
    for (dim, res) in dimensions.iter().zip(&resolved) {
        if columns.contains_key(&res.slug) {
            continue;
        }
        // Presence was checked above.
        let Some(variable) = referenced.get(&dim.variable_id) else {
            continue;
        };
        let column = build_column(res, variable, &row_index, rows.len());
        columns.insert(res.slug.clone(), column);
    }

    tracing::debug!(
        rows = rows.len(),
        columns = columns.len(),
        variables = referenced.len(),
        "built table from legacy variables"
    );

    Ok((Table::from_parts(rows, entities, columns), resolved))
}

fn validate_variable(variable_id: VariableId, variable: &VariableDataMetadata) -> Result<(), TableError> {
    let found = variable.metadata.id.ok_or(TableError::MissingMetadataField {
        variable_id,
        field: "id",
    })?;
    if found != variable_id {
        return Err(TableError::MetadataIdMismatch { variable_id, found });
    }
    if !variable.data.is_aligned() {
        return Err(TableError::MalformedData {
            variable_id,
            years: variable.data.years.len(),
            entities: variable.data.entities.len(),
            values: variable.data.values.len(),
        });
    }
    Ok(())
}

fn ensure_unique_slug_owners(resolved: &[ResolvedDimension]) -> Result<(), TableError> {
    let mut owners: HashMap<&str, VariableId> = HashMap::new();
    for dim in resolved {
        match owners.get(dim.slug.as_str()) {
            Some(&first) if first != dim.variable_id => {
                return Err(TableError::SlugConflict {
                    slug: dim.slug.clone(),
                    first,
                    second: dim.variable_id,
                });
            }
            Some(_) => {}
            None => {
                owners.insert(dim.slug.as_str(), dim.variable_id);
            }
        }
    }
    Ok(())
}

fn collect_entities(
    referenced: &BTreeMap<VariableId, &VariableDataMetadata>,
    rows: &[RowKey],
) -> BTreeMap<EntityId, Entity> {
    let mut known: HashMap<EntityId, Entity> = HashMap::new();
    for variable in referenced.values() {
        for value in &variable.metadata.dimensions.entities.values {
            let entry = known.entry(value.id).or_insert_with(|| Entity {
                id: value.id,
                name: value.name.clone().unwrap_or_else(|| value.id.to_string()),
                code: None,
            });
            if entry.code.is_none() {
                entry.code = value.code.clone();
            }
        }
    }

    rows.iter()
        .map(|row| row.entity_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|id| {
            let entity = known.remove(&id).unwrap_or_else(|| Entity {
                id,
                name: id.to_string(),
                code: None,
            });
            (id, entity)
        })
        .collect()
}

fn build_column(
    dim: &ResolvedDimension,
    variable: &VariableDataMetadata,
    row_index: &HashMap<RowKey, usize>,
    num_rows: usize,
) -> Column {
    let display = resolve_display(&variable.metadata, dim.display.as_ref());
    let factor = display.conversion_factor;

    let mut values = vec![CellValue::NoData; num_rows];
    let data = &variable.data;
    for ((&entity_id, &time), value) in data.entities.iter().zip(&data.years).zip(&data.values) {
        let Some(&idx) = row_index.get(&RowKey { entity_id, time }) else {
            continue;
        };
        // Later points overwrite earlier ones for the same (entity, year).
        values[idx] = match value {
            DatumValue::Number(v) if factor != 1.0 => CellValue::Number(v * factor),
            other => CellValue::from(other.clone()),
        };
    }

    let name = display.name.clone().unwrap_or_else(|| dim.slug.clone());
    Column {
        slug: dim.slug.clone(),
        variable_id: dim.variable_id,
        target_year: dim.target_year,
        name,
        display,
        values,
    }
}
