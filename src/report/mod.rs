//! Validation reports: diagnostic columns and the allowed-values table

pub mod enums;
pub mod merge;

pub use enums::{derive_enumeration_table, EnumerationRow, EnumerationTable};
pub use merge::{attach_report, attach_report_with, ReportColumns};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::Table;
use crate::schema::{ValidationResult, Validator};

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    /// Results were not produced from these records
    #[error("Cannot attach {results} validation result(s) to {records} record(s)")]
    #[diagnostic(
        code(rsdb::report::alignment),
        help("Validate the same records that the report is attached to")
    )]
    Alignment { records: usize, results: usize },
}

/// A validated table together with its per-row results
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// The input table with the diagnostic columns attached
    pub table: Table,
    pub results: Vec<ValidationResult>,
}

impl CheckOutcome {
    /// Total number of violations across all rows
    pub fn error_count(&self) -> usize {
        self.results.iter().map(ValidationResult::violation_count).sum()
    }

    /// Indices of the rows with at least one violation
    pub fn invalid_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_valid())
            .map(|(i, _)| i)
    }

    pub fn is_valid(&self) -> bool {
        self.results.iter().all(ValidationResult::is_valid)
    }
}

/// Validate every row of a table and attach the diagnostic columns
///
/// Each violation is logged as a warning with its row index; the total is
/// logged once at the end.
pub fn check_table(
    table: Table,
    validator: &Validator<'_>,
    columns: &ReportColumns,
) -> Result<CheckOutcome, ReportError> {
    let results = validator.validate_parallel(table.rows());

    for (row, result) in results.iter().enumerate() {
        for violation in &result.violations {
            warn!(
                row,
                field = %violation.field,
                kind = violation.kind.name(),
                "{}",
                violation.message
            );
        }
    }

    let table = attach_report_with(table, &results, columns)?;
    let outcome = CheckOutcome { table, results };
    info!(
        "{} errors when validating cases against the schema",
        outcome.error_count()
    );
    Ok(outcome)
}
