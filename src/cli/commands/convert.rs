//! `rsdb convert` command - Convert a dataset between CSV and Parquet

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::io::{read_table, write_table, TableFormat};

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Dataset to read (.csv or .parquet)
    pub input: PathBuf,

    /// Dataset to write (.csv or .parquet)
    pub output: PathBuf,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let target = TableFormat::from_path(&args.output)?;
    let table = read_table(&args.input)?;
    write_table(&table, &args.output)?;

    println!(
        "{} Converted {} row(s) from {} to {} ({})",
        style("✓").green(),
        table.len(),
        args.input.display(),
        args.output.display(),
        target
    );
    Ok(())
}
