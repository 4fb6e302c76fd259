//! CLI module
//!
//! Provides command-line interface for:
//! - init: create the database and its tables
//! - serve: boot and serve the REST API
//! - token: mint a development bearer token

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command, serve, token, AppConfig};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
