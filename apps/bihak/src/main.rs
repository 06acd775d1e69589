//! # Bihak - Incubation Program Server
//!
//! The main binary for the Bihak Center incubator.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) for team dashboards and reviewers
//! - CLI interface for program administrators
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │             apps/bihak (THE BINARY)           │
//! │                                               │
//! │     ┌─────────────┐      ┌─────────────┐      │
//! │     │    CLI      │      │  HTTP API   │      │
//! │     │   (clap)    │      │   (axum)    │      │
//! │     └──────┬──────┘      └──────┬──────┘      │
//! │            └─────────┬──────────┘             │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │  bihak-core   │                │
//! │              │  (THE ENGINE) │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! bihak load-program -f program.toml
//! bihak team-add -n "Umurava"
//! bihak server --host 0.0.0.0 --port 8080
//! ```

use bihak::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // BIHAK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("BIHAK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "bihak=debug,tower_http=debug"
    } else {
        "bihak=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗ ██╗██╗  ██╗ █████╗ ██╗  ██╗
  ██╔══██╗██║██║  ██║██╔══██╗██║ ██╔╝
  ██████╔╝██║███████║███████║█████╔╝
  ██╔══██╗██║██╔══██║██╔══██║██╔═██╗
  ██████╔╝██║██║  ██║██║  ██║██║  ██╗
  ╚═════╝ ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝

  Incubation Program Engine v{}

  Phase by phase, reviewed and approved
"#,
        env!("CARGO_PKG_VERSION")
    );
}
