use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Parse a humantime duration ("90s", "2h", "1day").
fn parse_age(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(
    name = "extedit",
    version,
    about = "Edit a value in its default desktop application and write the changes back"
)]
pub(crate) struct Cli {
    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<extedit::ColorMode>,

    /// Override the temp directory used for edit sessions
    #[arg(long = "temp-dir", global = true)]
    pub(crate) temp_dir: Option<PathBuf>,

    /// Override the opener command (e.g. "gio open")
    #[arg(long = "opener", global = true)]
    pub(crate) opener: Option<String>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct FieldArgs {
    /// File holding the value; a missing file means "no value"
    pub(crate) field: PathBuf,

    /// Treat the value as UTF-8 text instead of raw bytes
    #[arg(long)]
    pub(crate) text: bool,

    /// Never write changes back into the value
    #[arg(long = "read-only")]
    pub(crate) read_only: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Open the value in its default application and save changes when it is closed
    Edit {
        #[command(flatten)]
        field: FieldArgs,
        /// Suggested file name stem (defaults to the value file's stem)
        #[arg(long)]
        name: Option<String>,
        /// File extension selecting the application (defaults to the value file's extension)
        #[arg(long = "ext")]
        extension: Option<String>,
        /// Ask before reusing an existing temp file name instead of numbering it
        #[arg(long = "no-auto-rename")]
        no_auto_rename: bool,
        /// Emit the final session state as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Replace the value with the contents of a file
    Load {
        #[command(flatten)]
        field: FieldArgs,
        /// Source file (prompted when omitted)
        #[arg(long = "from")]
        from: Option<PathBuf>,
    },
    /// Write the value to a file
    Save {
        #[command(flatten)]
        field: FieldArgs,
        /// Destination file (prompted when omitted)
        #[arg(long = "to")]
        to: Option<PathBuf>,
    },
    /// Clear the value
    Clear {
        #[command(flatten)]
        field: FieldArgs,
    },
    /// Remove leftover temp files from interrupted sessions
    Clean {
        /// Only remove files older than this (e.g. "1h", "2days")
        #[arg(long = "older-than", value_parser = parse_age, default_value = "1h")]
        older_than: Duration,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Show opener, temp directory and build diagnostics
    Doctor,
}
