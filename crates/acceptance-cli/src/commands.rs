//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// accept: browser acceptance tests with screenshot evidence and run reports
#[derive(Parser, Debug)]
#[command(name = "accept")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the search feature and write reports
    Run(RunArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Environment name (defaults to TEST_ENV, then dev)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Show the browser window
    #[arg(long, conflicts_with = "headless")]
    pub headed: bool,

    /// Hide the browser window
    #[arg(long)]
    pub headless: bool,

    /// Project root holding test_data/
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory for reports and screenshots
    #[arg(long, default_value = "reports")]
    pub reports: PathBuf,

    /// Keyword to search for (defaults to test data, then AI)
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Print the plan without starting a browser
    #[arg(long)]
    pub dry_run: bool,

    /// HTML report title
    #[arg(long, default_value = acceptance::DEFAULT_TITLE)]
    pub title: String,

    /// Browser backend
    #[arg(long, default_value = "auto")]
    pub driver: DriverArg,
}

impl RunArgs {
    /// Headless override requested on the command line
    #[must_use]
    pub const fn headless_override(&self) -> Option<bool> {
        if self.headed {
            Some(false)
        } else if self.headless {
            Some(true)
        } else {
            None
        }
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Environment name (defaults to TEST_ENV, then dev)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Project root holding test_data/
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Browser backend selection
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverArg {
    /// CDP when compiled in, otherwise the mock
    #[default]
    Auto,
    /// Chromium over CDP
    Cdp,
    /// In-memory mock browser
    Mock,
}

/// Log line format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorArg {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stderr().features().colors_supported(),
        }
    }
}
