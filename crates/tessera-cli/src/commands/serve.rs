// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application server command.
//!
//! Loads the project configuration, applies the command-line overrides and
//! runs the server until Ctrl+C.

use std::path::Path;

use console::style;
use tessera::{Config, Manifest, Tessera};

/// Starts the application rooted at `root` and serves until interrupted.
pub async fn run(
    root: &Path,
    host: Option<String>,
    port: Option<u16>,
    manifest: Manifest,
) -> anyhow::Result<()> {
    let config = load_config(root, host, port)?;
    let environment = config.environment.clone();

    let app = Tessera::new(root, config).manifest(manifest);
    let running = app.start().await?;

    println!();
    println!(
        "  {} {}",
        style("Tessera").green().bold(),
        style(format!("({})", environment)).dim()
    );
    println!(
        "  {} http://{}",
        style("Listening on").cyan(),
        running.local_addr()
    );
    if let Some(addr) = running.sockets_addr() {
        println!("  {} ws://{}", style("Push channel on").cyan(), addr);
    }
    println!(
        "  {} {}",
        style("Routes").cyan(),
        running.state().routes.len()
    );
    println!();
    println!("  {}", style("Press Ctrl+C to stop").dim());

    running
        .wait_for_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    println!("  {}", style("Server stopped").dim());
    Ok(())
}

/// Loads the project configuration with the command-line overrides applied.
pub fn load_config(root: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<Config> {
    let mut config = Config::load(root)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    Ok(config)
}
