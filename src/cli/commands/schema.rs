//! Schema introspection
//!
//! Shows the fields of the resolved schema, making it easier to prepare a
//! dataset without reading the JSON Schema documents themselves.

use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_config, load_configured_schema, truncate_str};
use crate::cli::GlobalOpts;
use crate::report::derive_enumeration_table;

#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
    /// Show the resolved JSON schema instead of a formatted summary
    #[arg(long)]
    pub raw: bool,
}

pub fn run(args: SchemaArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let schema = load_configured_schema(&config)?;

    if args.raw {
        let json = serde_json::to_string_pretty(schema.document()).into_diagnostic()?;
        println!("{}", json);
        return Ok(());
    }

    // Print header
    let title = schema.title().unwrap_or("RSDB schema");
    println!("{}", title);
    println!("{}", "=".repeat(title.chars().count()));
    if let Some(desc) = schema.description() {
        println!("{}", desc);
    }
    println!("Source: {}\n", schema.source());

    println!("Fields:");
    println!("{:<20} {:<12} {:<8} {}", "NAME", "TYPE", "REQ", "DESCRIPTION");
    println!("{}", "-".repeat(80));
    for property in schema.fields() {
        let is_required = if property.required { "yes" } else { "" };
        let desc = property.node.description.as_deref().unwrap_or("");
        println!(
            "{:<20} {:<12} {:<8} {}",
            property.name,
            property.node.type_label(),
            is_required,
            truncate_str(desc, 38)
        );
    }

    // Show enum values for relevant fields
    let enums = derive_enumeration_table(&schema);
    if !enums.is_empty() {
        println!("\nEnum Values:");
        for field in enums.fields() {
            let values: Vec<String> = enums.values_of(field).map(|r| r.value_label()).collect();
            println!("  {}: {}", field, values.join(", "));
        }
    }

    println!("\nUse --raw for the full resolved JSON schema");
    Ok(())
}
