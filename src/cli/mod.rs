//! CLI module for stayindex
//!
//! Provides command-line access to a registry of indices:
//! - init: Write a configuration file
//! - create / list / drop: Manage indices
//! - add / update / get / remove: Manage documents
//! - search: Query one or several indices
//! - rebuild / stats: Maintenance

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, DocumentTarget};
pub use commands::{build_request, init, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_document, write_error, write_response};
