// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tessera::Manifest;
use tracing_subscriber::EnvFilter;

use crate::commands;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "tessera")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Module-based web application framework", long_about = None)]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the application server
    Serve {
        /// Port to bind, overriding `server.port`
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind, overriding `server.host`
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the composed route table
    Routes,
    /// Print every translation key across all locales
    Locales {
        /// Show the admin namespace instead of the site one
        #[arg(long)]
        admin: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Scaffold a new project
    Init {
        /// Project directory (defaults to the current directory)
        name: Option<String>,
    },
}

/// Installs the global subscriber. Invalid filters fall back to `warn`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Runs the selected command with the application's compiled modules.
pub async fn run(cli: Cli, manifest: Manifest) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(&cli.root, host, port, manifest).await,
        Commands::Routes => commands::routes::run(&cli.root, manifest).await,
        Commands::Locales { admin, json } => commands::locales::run(&cli.root, admin, json).await,
        Commands::Init { name } => commands::init::run(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["tessera", "--root", "site", "serve", "--port", "8080"]);
        assert_eq!(cli.root, PathBuf::from("site"));
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(8080));
                assert_eq!(host, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_locales_flags() {
        let cli = Cli::parse_from(["tessera", "locales", "--admin"]);
        assert!(matches!(
            cli.command,
            Commands::Locales {
                admin: true,
                json: false
            }
        ));
        assert_eq!(cli.log_level, "info");
    }
}
