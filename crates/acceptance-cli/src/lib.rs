//! Acceptance CLI library
//!
//! Command-line front end for the acceptance harness.

#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod error;
mod logging;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, DriverArg, LogFormat, RunArgs};
pub use error::{CliError, CliResult};
pub use logging::{default_directive, init as init_logging};
pub use output::ProgressReporter;
pub use runner::{run, show_config, DEFAULT_KEYWORD};
