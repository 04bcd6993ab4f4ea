//! # Waypoint CLI Module
//!
//! This module implements the CLI interface for Waypoint.
//!
//! ## Available Commands
//!
//! - `check` - Load and validate a model
//! - `plan` - Show the cheapest path to a state
//! - `navigate` - Navigate to a state against recorded history
//! - `sample` - Draw recorded snapshots for a pattern
//! - `history` - Inspect or convert history files
//! - `monitor` - Watch a state and recover to a fallback

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use waypoint_core::WaypointError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Waypoint - model-based GUI automation
///
/// Describes an application as states and transitions, plans the cheapest
/// route between screens and replays recorded perception for testing.
#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the model file
    #[arg(short = 'M', long, global = true, default_value = "waypoint.toml")]
    pub model: PathBuf,

    /// Recorded history used by the replay provider (binary or JSON)
    #[arg(short = 'H', long, global = true)]
    pub history: Option<PathBuf>,

    /// Replay seed; overrides the model's `settings.seed`
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate the model
    Check,

    /// Show the cheapest path to a state
    Plan {
        /// Target state
        #[arg(short, long)]
        to: String,

        /// Active states to start from (defaults to `settings.initial`)
        #[arg(short, long)]
        from: Vec<String>,
    },

    /// Navigate to a state, replaying recorded perception
    Navigate {
        /// Target state
        #[arg(short, long)]
        to: String,

        /// Active states to start from (defaults to `settings.initial`)
        #[arg(short, long)]
        from: Vec<String>,

        /// Print every emitted event
        #[arg(long)]
        events: bool,

        /// Write the perception outcomes observed during navigation here
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Draw recorded snapshots for a pattern
    Sample {
        /// Pattern name
        #[arg(short, long)]
        pattern: String,

        /// Action kind (find, click, type, ...)
        #[arg(short, long, default_value = "find")]
        kind: String,

        /// Number of draws
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Prefer snapshots captured while this state was active
        #[arg(short, long)]
        state: Vec<String>,
    },

    /// Inspect or convert history files
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },

    /// Watch a state and navigate to a fallback when it disappears
    Monitor {
        /// State that should stay evidenced
        #[arg(short, long)]
        watch: String,

        /// State to navigate to on evidence loss
        #[arg(short, long)]
        fallback: String,

        /// Delay between checks in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// Stop after this many checks (runs until Ctrl+C otherwise)
        #[arg(long)]
        max_checks: Option<u64>,
    },
}

/// `history` subcommands.
#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Summarize a history file
    Inspect {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Convert between binary and JSON
    Convert {
        /// Input file (format detected)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (binary, json)
        #[arg(short = 't', long, default_value = "binary")]
        format: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), WaypointError> {
    let ctx = Context {
        model: cli.model,
        history: cli.history,
        seed: cli.seed,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Check) | None => cmd_check(&ctx),
        Some(Commands::Plan { to, from }) => cmd_plan(&ctx, &to, &from),
        Some(Commands::Navigate {
            to,
            from,
            events,
            record,
        }) => cmd_navigate(&ctx, &to, &from, events, record.as_deref()),
        Some(Commands::Sample {
            pattern,
            kind,
            count,
            state,
        }) => cmd_sample(&ctx, &pattern, &kind, count, &state),
        Some(Commands::History { action }) => match action {
            HistoryCommand::Inspect { input } => cmd_history_inspect(&ctx, &input),
            HistoryCommand::Convert {
                input,
                output,
                format,
            } => cmd_history_convert(&input, &output, &format),
        },
        Some(Commands::Monitor {
            watch,
            fallback,
            interval_ms,
            max_checks,
        }) => cmd_monitor(&ctx, &watch, &fallback, interval_ms, max_checks).await,
    }
}
