//! CLI argument parsing for sessionstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sessionstore")]
#[command(author, version, about = "Inspect a sessionstore directory", long_about = None)]
pub struct Cli {
    /// Path to the store directory
    #[arg(short, long, default_value = ".sessionstore")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all collections
    Collections,

    /// Dump all records of a collection as JSON lines
    List {
        /// Collection name
        #[arg(required = true)]
        collection: String,
    },

    /// Print a single record as pretty JSON
    Get {
        /// Collection name
        #[arg(required = true)]
        collection: String,

        /// Record ID
        #[arg(required = true)]
        id: String,
    },

    /// Show record counts per collection
    Stats,

    /// Rewrite collection logs down to live records
    Compact,
}
