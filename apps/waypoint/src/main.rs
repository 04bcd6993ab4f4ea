//! # Waypoint - Model-Based GUI Automation
//!
//! The main binary for the Waypoint state navigation engine.
//!
//! This application provides:
//! - Declarative model loading and validation
//! - Path planning and replayed navigation
//! - History inspection, sampling and conversion
//! - A state monitor that recovers lost states
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     apps/waypoint (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │ Model/Hist. │    │  State Monitor   │    │
//! │  │  (clap)     │    │ (toml/json) │    │  (tokio)         │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                   ┌────────────────┐                           │
//! │                   │ waypoint-core  │                           │
//! │                   │  (THE LOGIC)   │                           │
//! │                   └────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! waypoint --model app.toml check
//! waypoint --model app.toml --history app.wphs plan --to Settings
//! waypoint --model app.toml --history app.wphs --seed 7 navigate --to Settings --events
//! waypoint history convert -i app.json -o app.wphs
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypoint::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing: WAYPOINT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("WAYPOINT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "waypoint=debug,waypoint_core=debug"
    } else {
        "waypoint=info,waypoint_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Waypoint startup banner.
fn print_banner() {
    println!(
        r#"
  waypoint v{}
  states . transitions . replay
"#,
        env!("CARGO_PKG_VERSION")
    );
}
