//! Core module - tabular model and configuration

pub mod config;
pub mod table;

pub use config::Config;
pub use table::{Cell, Record, Scalar, Table};
