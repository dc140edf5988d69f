// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fitslot - capacity-safe class bookings with M-Pesa payment confirmation.
//!
//! This is the binary entry point for the Fitslot service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod reconcile;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fitslot_config::model::FitslotConfig;

/// Fitslot - capacity-safe class bookings with M-Pesa payment confirmation.
#[derive(Parser, Debug)]
#[command(name = "fitslot", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the booking service and HTTP gateway.
    Serve,
    /// Show whether a running service answers on its health endpoint.
    Status {
        /// Output structured JSON.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Run diagnostic checks against the configured environment.
    Doctor {
        /// Also check database integrity and disk space.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Recompute session group counts from bookings and fix any drift.
    Reconcile {
        /// Output structured JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&std::path::Path>) -> FitslotConfig {
    let result = match path {
        Some(path) => fitslot_config::load_and_validate_path(path),
        None => fitslot_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            fitslot_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Doctor { deep, plain }) => {
            doctor::run_doctor(&config, cli.config.as_deref(), deep, plain).await
        }
        Some(Commands::Reconcile { json }) => reconcile::run_reconcile(&config, json).await,
        None => {
            println!("fitslot: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_config_flag_parses_after_subcommand() {
        let cli = Cli::try_parse_from(["fitslot", "doctor", "--deep", "--config", "/tmp/f.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Doctor {
                deep: true,
                plain: false
            })
        ));
    }
}
