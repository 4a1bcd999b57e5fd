//! `rsdb check` command - Validate a dataset against the schema

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{load_config, load_configured_schema, parse_delimiter};
use crate::cli::GlobalOpts;
use crate::io::{read_table, write_table, TableFormat};
use crate::report::check_table;
use crate::schema::Validator;

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Dataset to validate (.csv or .parquet)
    pub input: PathBuf,

    /// Write the dataset with the diagnostic columns attached (.csv or .parquet)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Delimiter of list-valued fields stored as plain text (default: ';')
    #[arg(long, short = 'd', value_parser = parse_delimiter)]
    pub delimiter: Option<char>,

    /// Exit with an error when any row has violations
    #[arg(long)]
    pub strict: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

pub fn run(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let mut config = load_config(global);
    if args.delimiter.is_some() {
        config.list_delimiter = args.delimiter;
    }

    // Fail on a bad output name before doing any work
    if let Some(output) = &args.output {
        TableFormat::from_path(output)?;
    }

    let schema = load_configured_schema(&config)?;
    let validator = Validator::new(&schema)?.with_list_delimiter(config.list_delimiter());
    let table = read_table(&args.input)?;

    println!(
        "{} Validating {} row(s) of {} against {}...\n",
        style("→").blue(),
        table.len(),
        args.input.display(),
        schema.source()
    );

    let outcome = check_table(table, &validator, &config.report_columns())?;
    let failed_rows = outcome.invalid_rows().count();

    if !args.summary {
        for row in outcome.invalid_rows() {
            let result = &outcome.results[row];
            println!(
                "{} row {} - {} error(s)",
                style("✗").red(),
                row,
                result.violation_count()
            );
            for violation in &result.violations {
                println!("    {}", style(&violation.message).yellow());
            }
        }
        if failed_rows > 0 {
            println!();
        }
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Rows checked:   {}", style(outcome.results.len()).cyan());
    println!(
        "  Rows passed:    {}",
        style(outcome.results.len() - failed_rows).green()
    );
    println!("  Rows failed:    {}", style(failed_rows).red());
    println!("  Total errors:   {}", style(outcome.error_count()).red());
    println!();

    if let Some(output) = &args.output {
        write_table(&outcome.table, output)?;
        println!(
            "{} Wrote annotated dataset to {}",
            style("✓").green(),
            output.display()
        );
    }

    if outcome.is_valid() {
        println!("{} All rows passed validation!", style("✓").green().bold());
        Ok(())
    } else if args.strict {
        Err(miette::miette!(
            "Validation failed: {} row(s) have errors",
            failed_rows
        ))
    } else {
        Ok(())
    }
}
