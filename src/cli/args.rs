//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand};

use crate::cli::commands::{
    check::CheckArgs, completions::CompletionsArgs, convert::ConvertArgs, enums::EnumsArgs,
    schema::SchemaArgs,
};

#[derive(Parser)]
#[command(name = "rsdb")]
#[command(author, version, about = "Regime Shifts DataBase toolkit")]
#[command(long_about = "Read, write and validate Regime Shifts DataBase datasets (CSV or Parquet) against the RSDB JSON schema.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Schema to use: `bundled`, a file path or a URL (default: from config, else bundled)
    #[arg(long, short = 's', global = true)]
    pub schema: Option<String>,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log debug details (schema resolution, file I/O)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a dataset against the schema
    Check(CheckArgs),

    /// List the allowed values of every enumerated field
    Enums(EnumsArgs),

    /// Convert a dataset between CSV and Parquet
    Convert(ConvertArgs),

    /// Show the resolved schema
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
