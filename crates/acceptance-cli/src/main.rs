//! accept: browser acceptance tests from the command line
//!
//! ## Usage
//!
//! ```bash
//! accept run                          # Run the search feature (dev environment)
//! accept run --env staging --headed   # Another environment, visible browser
//! accept run --keyword rust --dry-run # Print the plan only
//! accept config --json                # Show the resolved configuration
//! ```

use acceptance_cli::{init_logging, run, show_config, Cli, CliResult, Commands};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match dispatch() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch() -> CliResult<u8> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_format)?;

    match cli.command {
        Commands::Run(args) => run(&args, cli.color, cli.quiet),
        Commands::Config(args) => {
            show_config(&args)?;
            Ok(0)
        }
    }
}
