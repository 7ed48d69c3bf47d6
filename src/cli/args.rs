//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

/// Annotation-driven dependency-injection container generator
#[derive(Parser, Debug)]
#[command(name = "saber")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log level, overrides -v
    #[arg(long, global = true, value_enum, env = "SABER_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Working directory relative paths resolve against (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub work_dir: Option<PathBuf>,

    /// Settings file layered over the global config
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print author and version
    #[arg(long)]
    pub info: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate containers from all sources under a directory
    Sources {
        /// Directory to scan
        #[arg(long, value_hint = ValueHint::DirPath)]
        from: PathBuf,
        /// Output directory
        #[arg(long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
    },

    /// Generate containers for targets of a package (`Sources/<Target>`)
    Package {
        /// Package directory
        #[arg(long, value_hint = ValueHint::DirPath)]
        path: PathBuf,
        /// Comma-separated target names, e.g. "App, Core"
        #[arg(long)]
        targets: String,
        /// Output directory
        #[arg(long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
    },

    /// Print each container's dependency tree
    Graph {
        /// Directory to scan
        #[arg(long, value_hint = ValueHint::DirPath)]
        from: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
