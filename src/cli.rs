//! Command-line surface: `ascript-broker run <file>` for a one-shot local
//! execution, `ascript-broker serve` for the NDJSON broker↔runtime wire
//! protocol over stdin/stdout.

use std::path::PathBuf;

use ascript_presets::SecurityLevel;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "ascript-broker", version, about = "Sandboxed execution broker for LLM-generated agent scripts")]
pub struct Cli {
    /// Path to a TOML config file. Falls back to built-in defaults if unset
    /// or the file doesn't exist.
    #[arg(long, env = "ASCRIPT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or
    /// `ascript_broker=debug,ascript_runtime=trace`.
    #[arg(long, env = "ASCRIPT_LOG", default_value = "info", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs a single script file to completion, printing its event stream
    /// as NDJSON on stdout. No tool handler is attached, so `callTool`
    /// resolves every call as `UNKNOWN_TOOL`.
    Run {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = SecurityLevelArg::Standard)]
        level: SecurityLevelArg,
    },
    /// Reads one `create_session` request from the first line of stdin,
    /// streams `Event`s to stdout, and applies `ControlMessage`s read from
    /// the remaining lines of stdin.
    Serve,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SecurityLevelArg {
    Strict,
    Secure,
    Standard,
    Permissive,
}

impl From<SecurityLevelArg> for SecurityLevel {
    fn from(value: SecurityLevelArg) -> Self {
        match value {
            SecurityLevelArg::Strict => SecurityLevel::Strict,
            SecurityLevelArg::Secure => SecurityLevel::Secure,
            SecurityLevelArg::Standard => SecurityLevel::Standard,
            SecurityLevelArg::Permissive => SecurityLevel::Permissive,
        }
    }
}
