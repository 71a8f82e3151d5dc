//! CLI argument surface (§6): `ergo <file>` type-checks and dumps the lowered, typed program as
//! JSON; `--emit-c` additionally (or instead) writes generated C; `ergo run <file>` compiles via
//! `$CC` and executes the result, passing its exit status through.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// The source file to check (and optionally emit C for), when no subcommand is given.
    #[arg(index = 1, required_unless_present = "command")]
    pub file: Option<PathBuf>,

    /// Writes the generated C11 source to this path instead of (or in addition to) the JSON
    /// dump to stdout.
    #[arg(long, value_name = "OUT")]
    pub emit_c: Option<PathBuf>,

    /// Specifies the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    #[default]
    #[value(alias("0"))]
    Error,
    #[value(alias("1"))]
    Warn,
    #[value(alias("2"))]
    Info,
    #[value(alias("3"))]
    Debug,
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compiles the program, invokes `$CC` on the generated C, and runs the result.
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(index = 1)]
    pub file: PathBuf,
}
