//! CLI argument definitions using clap
//!
//! Commands:
//! - stayindex init
//! - stayindex create --index <id> --field <f>...
//! - stayindex add/update/get/remove --index <id> --id <doc>
//! - stayindex search --index <id>... --where field:op:value
//! - stayindex list | rebuild | stats | drop

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// stayindex - an embedded, file-backed search index
#[derive(Parser, Debug)]
#[command(name = "stayindex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./stayindex.json")]
    pub config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Target index and document
#[derive(Args, Debug, Clone)]
pub struct DocumentTarget {
    /// Index ID
    #[arg(long)]
    pub index: String,

    /// Document ID
    #[arg(long)]
    pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a configuration file and create the data directory
    Init {
        /// Directory holding every index
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Create a new index
    Create {
        #[arg(long)]
        index: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Field to keep a field index for (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Field to tokenize into the full-text index (repeatable)
        #[arg(long = "text-field")]
        text_fields: Vec<String>,

        /// Maximum number of documents, 0 for unbounded
        #[arg(long, default_value_t = 0)]
        max_items: u64,
    },

    /// List indices
    List,

    /// Add a document from a JSON file ("-" reads stdin)
    Add {
        #[command(flatten)]
        target: DocumentTarget,

        #[arg(long)]
        file: PathBuf,
    },

    /// Replace a document from a JSON file ("-" reads stdin)
    Update {
        #[command(flatten)]
        target: DocumentTarget,

        #[arg(long)]
        file: PathBuf,
    },

    /// Print a document
    Get {
        #[command(flatten)]
        target: DocumentTarget,
    },

    /// Remove a document
    Remove {
        #[command(flatten)]
        target: DocumentTarget,
    },

    /// Search one or more indices
    Search {
        /// Index ID (repeatable)
        #[arg(long = "index", required = true)]
        indices: Vec<String>,

        /// Criterion as field:op[:value] (repeatable)
        #[arg(long = "where")]
        criteria: Vec<String>,

        /// Sort as field[:asc|desc] (repeatable, in priority order)
        #[arg(long)]
        sort: Vec<String>,

        /// Full-text query
        #[arg(long)]
        text: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Page size, 0 for every match
        #[arg(long, default_value_t = 0)]
        size: usize,
    },

    /// Recompute every derived file of an index
    Rebuild {
        #[arg(long)]
        index: String,
    },

    /// Print index statistics
    Stats {
        #[arg(long)]
        index: String,
    },

    /// Delete an index and everything in it
    Drop {
        #[arg(long)]
        index: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
