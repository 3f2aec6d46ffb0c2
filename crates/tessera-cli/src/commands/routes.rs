// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route table command.

use std::path::Path;

use console::style;
use tessera::{Manifest, RouteTable, Tessera};

/// Assembles the application without binding and prints its routes in
/// dispatch order.
pub async fn run(root: &Path, manifest: Manifest) -> anyhow::Result<()> {
    let app = Tessera::load(root)?.manifest(manifest);
    let (_router, state) = app.assemble().await?;

    println!(
        "{} {}",
        style("Routes:").cyan(),
        state.routes.len()
    );
    for line in format_routes(&state.routes) {
        println!("  {}", line);
    }

    for key in state.routes.duplicates() {
        println!("{} duplicate route {}", style("Warning:").yellow(), key);
    }
    Ok(())
}

/// One aligned line per route: method, path, module, action, policies.
pub fn format_routes(routes: &RouteTable) -> Vec<String> {
    let rows: Vec<[String; 5]> = routes
        .routes()
        .map(|route| {
            [
                route.method.to_string(),
                route.path.clone(),
                route.module_name.clone(),
                route.action.name().to_string(),
                route.policies.join(","),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    rows.iter()
        .map(|row| {
            let line = format!(
                "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {}",
                row[0],
                row[1],
                row[2],
                row[3],
                row[4],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
            );
            line.trim_end().to_string()
        })
        .collect()
}
