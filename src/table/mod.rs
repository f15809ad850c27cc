//! Columnar table built from loaded variables.
//!
//! A `Table` has one row per `(entity, time)` pair and one `Column` per
//! resolved slug. Cells that have no datum hold `CellValue::NoData`; rows are
//! never dropped for missing values.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::Serialize;

use crate::dimension::EffectiveDisplay;
use crate::domain::{ColumnSlug, DatumValue, Entity, EntityId, Time, VariableId};

pub mod convert;

pub use convert::{ResolvedDimension, legacy_to_table};

/// Row identity: unique per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowKey {
    pub entity_id: EntityId,
    pub time: Time,
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    NoData,
}

impl CellValue {
    pub fn is_no_data(&self) -> bool {
        matches!(self, CellValue::NoData)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::Text(_) | CellValue::NoData => None,
        }
    }
}

impl From<DatumValue> for CellValue {
    fn from(value: DatumValue) -> Self {
        match value {
            DatumValue::Number(v) => CellValue::Number(v),
            DatumValue::Text(s) => CellValue::Text(s),
        }
    }
}

static NO_DATA: CellValue = CellValue::NoData;

/// A derived column: one cell per table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub slug: ColumnSlug,
    pub variable_id: VariableId,
    /// Consumers that need a cross-section read this year (see
    /// `Table::values_at_target_year`); the column itself covers every year.
    pub target_year: Option<Time>,
    pub name: String,
    pub display: EffectiveDisplay,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of cells that hold a value.
    pub fn num_valid(&self) -> usize {
        self.values.iter().filter(|v| !v.is_no_data()).count()
    }

    /// Min/max over the numeric cells, if any.
    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter_map(CellValue::as_f64)
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// A value picked for one entity from a target-year column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetYearValue<'a> {
    /// The year the value was actually observed in (within tolerance).
    pub time: Time,
    pub value: &'a CellValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    rows: Vec<RowKey>,
    #[serde(skip)]
    row_index: HashMap<RowKey, usize>,
    entities: BTreeMap<EntityId, Entity>,
    columns: IndexMap<ColumnSlug, Column>,
}

impl Table {
    /// Assemble a table. Rows must be unique and every column must have one
    /// cell per row; `legacy_to_table` guarantees both.
    pub(crate) fn from_parts(
        rows: Vec<RowKey>,
        entities: BTreeMap<EntityId, Entity>,
        columns: IndexMap<ColumnSlug, Column>,
    ) -> Self {
        debug_assert!(columns.values().all(|c| c.len() == rows.len()));
        let row_index = rows.iter().enumerate().map(|(idx, key)| (*key, idx)).collect();
        Self {
            rows,
            row_index,
            entities,
            columns,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[RowKey] {
        &self.rows
    }

    pub fn row_index(&self, entity_id: EntityId, time: Time) -> Option<usize> {
        self.row_index.get(&RowKey { entity_id, time }).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column_slugs(&self) -> impl Iterator<Item = &ColumnSlug> {
        self.columns.keys()
    }

    pub fn column(&self, slug: &str) -> Option<&Column> {
        self.columns.get(slug)
    }

    pub fn has_column(&self, slug: &str) -> bool {
        self.columns.contains_key(slug)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.entities.get(&id).map(|e| e.name.as_str())
    }

    /// Distinct times, ascending.
    pub fn times(&self) -> Vec<Time> {
        self.rows
            .iter()
            .map(|r| r.time)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Cell for `(entity, time)` in `slug`; `NoData` if the row or column is absent.
    pub fn get(&self, entity_id: EntityId, time: Time, slug: &str) -> &CellValue {
        let Some(column) = self.columns.get(slug) else {
            return &NO_DATA;
        };
        self.row_index(entity_id, time)
            .and_then(|idx| column.values.get(idx))
            .unwrap_or(&NO_DATA)
    }

    /// Per-entity values of a target-year column.
    ///
    /// For every entity the value observed exactly at the column's target year
    /// is used; otherwise the closest year within the column's display
    /// tolerance (ties prefer the later year). Entities with nothing in range
    /// are omitted. Returns `None` when the column is missing or has no target
    /// year.
    pub fn values_at_target_year(&self, slug: &str) -> Option<BTreeMap<EntityId, TargetYearValue<'_>>> {
        let column = self.columns.get(slug)?;
        let target = column.target_year?;
        let tolerance = i64::from(column.display.tolerance);

        let mut out: BTreeMap<EntityId, TargetYearValue<'_>> = BTreeMap::new();
        for (row, value) in self.rows.iter().zip(&column.values) {
            if value.is_no_data() {
                continue;
            }
            let distance = (i64::from(row.time) - i64::from(target)).abs();
            if distance > tolerance {
                continue;
            }
            let better = match out.get(&row.entity_id) {
                None => true,
                Some(current) => {
                    let current_distance = (i64::from(current.time) - i64::from(target)).abs();
                    distance < current_distance || (distance == current_distance && row.time > current.time)
                }
            };
            if better {
                out.insert(
                    row.entity_id,
                    TargetYearValue {
                        time: row.time,
                        value,
                    },
                );
            }
        }
        Some(out)
    }
}
