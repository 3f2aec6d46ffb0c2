// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! A freshly scaffolded project boots and exposes its routes and locales.

use tempfile::tempdir;
use tessera::locale::{Locales, Namespace};
use tessera::{Manifest, Tessera};
use tessera_cli::commands::{init, locales, routes};

#[tokio::test]
async fn test_scaffolded_project_assembles() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("blog");
    init::scaffold(&root, "blog").unwrap();

    let app = Tessera::load(&root).unwrap().manifest(Manifest::new());
    let (_router, state) = app.assemble().await.unwrap();

    assert_eq!(state.config.server.views.default_page_title, "blog");

    let lines = routes::format_routes(&state.routes);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("GET"));
    assert!(lines[0].contains("/"));
    assert!(lines[0].contains("home"));
    assert!(lines[1].contains("/{language}"));
    assert!(lines[1].ends_with("language"));
}

#[tokio::test]
async fn test_scaffolded_locales_are_complete() {
    let dir = tempdir().unwrap();
    init::scaffold(dir.path(), "site").unwrap();

    let loaded = Locales::load(
        &dir.path().join("app/locales"),
        &dir.path().join("app/locales/admin"),
        false,
    )
    .await;

    for namespace in [Namespace::Site, Namespace::Admin] {
        let comparison = loaded.comparison(namespace);
        assert_eq!(comparison.locales, vec!["en-gb".to_string()]);
        assert_eq!(comparison.rows.len(), 3);
        assert_eq!(locales::count_missing(&comparison), 0);
    }
}
