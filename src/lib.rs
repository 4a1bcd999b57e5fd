//! RSDB: Regime Shifts DataBase toolkit
//!
//! Reads and writes RSDB datasets (CSV or Parquet), validates them against
//! the RSDB JSON schema and derives the reference table of allowed values.

pub mod cli;
pub mod core;
pub mod io;
pub mod report;
pub mod schema;

pub use crate::core::{Cell, Config, Record, Scalar, Table};
pub use crate::io::{read_table, write_table, TableError, TableFormat};
pub use crate::report::{
    attach_report, check_table, derive_enumeration_table, CheckOutcome, EnumerationTable,
    ReportColumns, ReportError,
};
pub use crate::schema::{
    load_schema, validate, Schema, SchemaError, SchemaSource, ValidationResult, Validator,
    Violation, ViolationKind,
};
