//! Merging validation results back into a table

use super::ReportError;
use crate::core::{Cell, Table};
use crate::schema::ValidationResult;

/// Names of the diagnostic columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportColumns {
    /// Violation messages, one per line
    pub errors: String,
    /// Number of violations
    pub count: String,
}

impl Default for ReportColumns {
    fn default() -> Self {
        Self {
            errors: "schema_errors".to_string(),
            count: "nb_schema_errors".to_string(),
        }
    }
}

/// Append `schema_errors` and `nb_schema_errors` to every row
pub fn attach_report(table: Table, results: &[ValidationResult]) -> Result<Table, ReportError> {
    attach_report_with(table, results, &ReportColumns::default())
}

/// Append the diagnostic columns under the given names
///
/// Valid rows get `Missing` in both columns. Existing columns keep their
/// order and values. When the table already carries the diagnostic columns
/// (it was checked before) they are overwritten where they stand.
pub fn attach_report_with(
    mut table: Table,
    results: &[ValidationResult],
    columns: &ReportColumns,
) -> Result<Table, ReportError> {
    if table.len() != results.len() {
        return Err(ReportError::Alignment {
            records: table.len(),
            results: results.len(),
        });
    }

    table.add_column(columns.errors.as_str());
    table.add_column(columns.count.as_str());

    for (row, result) in table.rows_mut().iter_mut().zip(results) {
        if result.is_valid() {
            row.set(columns.errors.as_str(), Cell::Missing);
            row.set(columns.count.as_str(), Cell::Missing);
        } else {
            row.set(columns.errors.as_str(), Cell::text(result.summary()));
            row.set(
                columns.count.as_str(),
                Cell::integer(result.violation_count() as i64),
            );
        }
    }
    Ok(table)
}
