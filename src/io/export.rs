//! Export a built table to CSV.
//!
//! One line per row: entity name, entity id, time, then one cell per column
//! (header = column slug). Missing data is an empty cell; numbers are written
//! unformatted so the file round-trips through spreadsheets.

use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::table::{CellValue, Table};

/// Write `table` to a CSV file at `path`.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), AppError> {
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_table(file, table)
}

/// Write `table` as CSV to any writer.
pub fn write_table<W: Write>(writer: W, table: &Table) -> Result<(), AppError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["entityName".to_string(), "entityId".to_string(), "time".to_string()];
    header.extend(table.column_slugs().cloned());
    csv.write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for (idx, row) in table.rows().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(table.entity_name(row.entity_id).unwrap_or_default().to_string());
        record.push(row.entity_id.to_string());
        record.push(row.time.to_string());
        for column in table.columns() {
            record.push(match &column.values[idx] {
                CellValue::Number(v) => v.to_string(),
                CellValue::Text(s) => s.clone(),
                CellValue::NoData => String::new(),
            });
        }
        csv.write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    csv.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}
