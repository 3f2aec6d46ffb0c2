// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project scaffolding command.
//!
//! Writes the conventional directory layout with a sample `home` module,
//! a default layout, error pages and an English locale. Existing files are
//! left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use console::style;

const CONFIG: &str = r#"# Overrides for this machine. Shared settings go in
# config/environment/<environment>.toml.
environment = "development"
version = "0.1.0"

[server]
port = 3000

[server.views]
default_page_title = "{{project_name}}"

[i18n.languages]
en = "en-gb"
"#;

const PRODUCTION: &str = r#"debug = false

[server]
host = "0.0.0.0"
"#;

const HOME_MODULE: &str = r#"[[routes]]
method = "get"
path = "/"
action = "index"

[[routes]]
method = "get"
path = "/:language"
action = "index"
policies = ["language"]
"#;

const HOME_VIEW: &str = r#"<h1>{{translate "Welcome"}}</h1>
<p>{{link "Read this page in English" href="/" }}</p>
"#;

const LAYOUT: &str = r#"<!doctype html>
<html lang="{{language}}">
<head>
  <meta charset="utf-8">
  <title>{{_title}}</title>
  <link rel="stylesheet" href="/css/app.css">
</head>
<body>
  {{#each flashMessages}}<div class="flash">{{this}}</div>{{/each}}
  {{{_body}}}
  <script>window.config = {{{_clientConfig}}};</script>
</body>
</html>
"#;

const ERROR_LAYOUT: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{{status}} {{errorName}}</title></head>
<body>{{{_body}}}</body>
</html>
"#;

const ERROR_VIEW: &str = r#"<h1>{{status}}</h1>
<p>{{error}}</p>
"#;

const NOT_FOUND_VIEW: &str = r#"<h1>{{translate "Page not found"}}</h1>
"#;

const LANGUAGE_POLICY: &str = r#"kind = "language"
param = "language"
"#;

const LOCALE: &str = r#"{
  "Welcome": "Welcome",
  "Page not found": "Page not found",
  "Read this page in English": "Read this page in English"
}
"#;

const STYLESHEET: &str = "body { font-family: sans-serif; }\n";

const GITIGNORE: &str = "/target\n/data\nconfig/local.toml\n";

/// Files written by `init`, relative to the project directory.
pub const FILES: &[(&str, &str)] = &[
    ("config/local.toml", CONFIG),
    ("config/environment/production.toml", PRODUCTION),
    ("app/modules/home/module.toml", HOME_MODULE),
    ("app/modules/home/views/index.html", HOME_VIEW),
    ("app/templates/layouts/default.html", LAYOUT),
    ("app/templates/layouts/error.html", ERROR_LAYOUT),
    ("app/templates/error/index.html", ERROR_VIEW),
    ("app/templates/error/404.html", NOT_FOUND_VIEW),
    ("app/policies/language.toml", LANGUAGE_POLICY),
    ("app/locales/en-gb.json", LOCALE),
    ("app/locales/admin/en-gb.json", LOCALE),
    ("public/css/app.css", STYLESHEET),
    (".gitignore", GITIGNORE),
];

/// Initializes a project in `name`, or in the current directory.
pub fn run(name: Option<String>) -> anyhow::Result<()> {
    let is_current_dir = matches!(name.as_deref(), Some(".") | None);
    let (project_dir, project_name) = resolve_project_path(name)?;

    let written = scaffold(&project_dir, &project_name)?;
    print_success(&project_name, written, is_current_dir);
    Ok(())
}

/// Writes the scaffold into `target` and returns the number of files written.
pub fn scaffold(target: &Path, project_name: &str) -> anyhow::Result<usize> {
    fs::create_dir_all(target)?;
    fs::create_dir_all(target.join("public/js"))?;

    let mut written = 0;
    for (path, content) in FILES {
        let path = target.join(path);
        if path.exists() {
            tracing::info!(path = %path.display(), "keeping existing file");
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content.replace("{{project_name}}", project_name))?;
        written += 1;
    }
    Ok(written)
}

fn resolve_project_path(name: Option<String>) -> anyhow::Result<(PathBuf, String)> {
    match name.as_deref() {
        Some(".") | None => {
            let current_dir = std::env::current_dir()?;
            let dir_name = current_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "my-tessera-app".to_string());
            Ok((current_dir, dir_name))
        }
        Some(name) => {
            let project_path = PathBuf::from(name);
            let dir_name = project_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string());
            Ok((project_path, dir_name))
        }
    }
}

fn print_success(project_name: &str, written: usize, is_current_dir: bool) {
    println!(
        "{} {} ({} files)",
        style("Created tessera project:").green(),
        project_name,
        written
    );
    println!();
    println!("Next steps:");
    if !is_current_dir {
        println!("  cd {}", project_name);
    }
    println!("  tessera serve");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scaffold_keeps_existing_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("site");
        fs::create_dir_all(target.join("app/locales")).unwrap();
        fs::write(target.join("app/locales/en-gb.json"), "{}").unwrap();

        let written = scaffold(&target, "site").unwrap();
        assert_eq!(written, FILES.len() - 1);
        assert_eq!(
            fs::read_to_string(target.join("app/locales/en-gb.json")).unwrap(),
            "{}"
        );

        let config = fs::read_to_string(target.join("config/local.toml")).unwrap();
        assert!(config.contains("default_page_title = \"site\""));
        assert!(target.join("public/js").is_dir());
    }
}
