// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quepasa - a multi-tenant WhatsApp gateway.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod upstream;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quepasa_config::QuepasaConfig;

/// Quepasa - a multi-tenant WhatsApp gateway.
#[derive(Parser, Debug)]
#[command(name = "quepasa", version, about, long_about = None)]
struct Cli {
    /// TOML file layered over defaults and under the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API and every stored server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Query a running gateway's fleet health.
    Health {
        /// Base URL of the gateway; defaults to the configured bind address.
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create a user; prompts for the password when not given.
    Add {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> QuepasaConfig {
    let loaded = match path {
        Some(path) => quepasa_config::load_and_validate_path(path),
        None => quepasa_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            quepasa_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quepasa={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.logging.level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Migrate) => admin::run_migrate(&config).await,
        Some(Commands::User {
            action: UserCommand::Add { username, password },
        }) => admin::run_user_add(&config, &username, password).await,
        Some(Commands::Health { url }) => admin::run_health(&config, url.as_deref()).await,
        None => {
            println!("quepasa: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("quepasa: {e}");
        std::process::exit(1);
    }
}
