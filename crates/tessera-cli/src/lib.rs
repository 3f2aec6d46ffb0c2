// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Tessera CLI library.
//!
//! Command-line interface for serving and inspecting Tessera projects.
//!
//! # Usage
//!
//! The `tessera` binary runs projects whose routes only render pages:
//!
//! ```bash
//! tessera serve         # Start the application server
//! tessera routes        # Print the composed route table
//! tessera locales       # Print the locale comparison table
//! tessera init my-app   # Scaffold a new project
//! ```
//!
//! Applications with compiled controllers build their own binary and hand
//! their [`tessera::Manifest`] to [`cli::run`]:
//!
//! ```rust,ignore
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = tessera_cli::cli::Cli::parse();
//!     tessera_cli::cli::init_tracing(&cli.log_level);
//!     tessera_cli::cli::run(cli, my_app::manifest()).await
//! }
//! ```

/// Argument parsing and command dispatch.
pub mod cli;
/// CLI commands (serve, routes, locales, init).
pub mod commands;
