//! `rsdb enums` command - List the allowed values of every enumerated field

use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;

use crate::cli::helpers::{load_config, load_configured_schema};
use crate::cli::GlobalOpts;
use crate::report::derive_enumeration_table;

#[derive(clap::Args, Debug)]
pub struct EnumsArgs {
    /// Write the table as CSV (field,value,description) instead of printing it
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: EnumsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let schema = load_configured_schema(&config)?;
    let table = derive_enumeration_table(&schema);

    if let Some(path) = &args.output {
        let file = File::create(path).into_diagnostic()?;
        table.write_csv(file).into_diagnostic()?;
        println!(
            "{} Wrote {} allowed value(s) to {}",
            style("✓").green(),
            table.len(),
            path.display()
        );
        return Ok(());
    }

    if table.is_empty() {
        println!("No enumerated fields in {}", schema.source());
        return Ok(());
    }

    println!("{}", table.to_table());
    println!(
        "\n{} allowed value(s) across {} field(s)",
        style(table.len()).cyan(),
        style(table.fields().len()).cyan()
    );
    Ok(())
}
