//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every phase run with its results, conflicts and the audit trail
    Full,
    /// Final state and one line per phase run
    Summary,
    /// The complete report as JSON
    Json,
}

/// CLI arguments for phasegate
#[derive(Parser, Debug)]
#[command(name = "phasegate")]
#[command(author, version, about = "Multi-phase workflow orchestrator with quality gates")]
#[command(long_about = r#"
phasegate runs an ordered list of phases. Each phase dispatches tasks to the
workers registered for its capabilities, scores the results against a
weighted rubric, and either advances, re-enters a phase, or aborts.

Configuration files are loaded from (in priority order):
1. PHASEGATE_* environment variables
2. --config <path>       Explicit config file
3. ./phasegate.toml      Project-level config
4. ~/.config/phasegate/config.toml   Global config

Exit codes:
  0 completed, 1 quality failure, 2 iteration limit exceeded,
  3 invalid definition, 4 cancelled

Example:
  phasegate validate sprint.toml
  phasegate run sprint.toml --project acme -o summary
  phasegate explain runs/<run-id>.run.jsonl --phase visual
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a workflow definition to completion
    Run {
        /// Workflow definition file (TOML)
        definition: PathBuf,

        /// Project the run belongs to
        #[arg(short, long, default_value = "default")]
        project: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "summary")]
        output: OutputFormat,

        /// Directory for the JSONL run log (overrides [logging] run_log_dir)
        #[arg(long, value_name = "DIR")]
        run_log_dir: Option<PathBuf>,
    },

    /// Check a workflow definition against the configured workers
    Validate {
        /// Workflow definition file (TOML)
        definition: PathBuf,
    },

    /// Replay the decisions recorded in a run log
    Explain {
        /// Run log written by `run` (<run-id>.run.jsonl)
        log: PathBuf,

        /// Only show decisions for this phase
        #[arg(long, value_name = "PHASE")]
        phase: Option<String>,
    },
}
