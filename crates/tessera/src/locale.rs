// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Locale tables.
//!
//! One `<locale>.json` file per locale holds a flat map from the source
//! string to its translation. Site and admin translations live in separate
//! directories and separate namespaces. Tables are loaded once at startup
//! and only read afterwards.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LocaleError;
use crate::fs;

/// Key to translation map for one locale.
pub type Translations = BTreeMap<String, String>;

/// Translation namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Public site strings.
    Site,
    /// Administrative UI strings.
    Admin,
}

/// Site and admin locale tables.
#[derive(Debug, Default)]
pub struct Locales {
    site: BTreeMap<String, Arc<Translations>>,
    admin: BTreeMap<String, Arc<Translations>>,
    report_missing: bool,
}

/// Flattened view of every key across every locale of a namespace.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocaleComparison {
    /// Locale codes, sorted.
    pub locales: Vec<String>,
    /// One row per key, sorted by key.
    pub rows: Vec<ComparisonRow>,
}

/// One key with its translation in each locale (in `locales` order).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComparisonRow {
    /// Translation key.
    pub key: String,
    /// Translation per locale; `None` where the locale lacks the key.
    pub values: Vec<Option<String>>,
}

impl Locales {
    /// Loads both namespaces. A file that fails to read or parse is logged
    /// and skipped. Missing translations are reported when `report_missing`
    /// is set (outside production).
    pub async fn load(site_dir: &Path, admin_dir: &Path, report_missing: bool) -> Self {
        Self {
            site: load_dir(site_dir).await,
            admin: load_dir(admin_dir).await,
            report_missing,
        }
    }

    /// Builds tables from memory.
    pub fn from_tables(
        site: BTreeMap<String, Translations>,
        admin: BTreeMap<String, Translations>,
    ) -> Self {
        let wrap = |tables: BTreeMap<String, Translations>| {
            tables
                .into_iter()
                .map(|(locale, table)| (locale, Arc::new(table)))
                .collect()
        };
        Self {
            site: wrap(site),
            admin: wrap(admin),
            report_missing: false,
        }
    }

    fn namespace(&self, namespace: Namespace) -> &BTreeMap<String, Arc<Translations>> {
        match namespace {
            Namespace::Site => &self.site,
            Namespace::Admin => &self.admin,
        }
    }

    /// The table for `locale`, or an empty table when none was loaded.
    pub fn table(&self, namespace: Namespace, locale: &str) -> Arc<Translations> {
        self.namespace(namespace)
            .get(locale)
            .cloned()
            .unwrap_or_default()
    }

    /// Loaded locale codes, sorted.
    pub fn locales(&self, namespace: Namespace) -> Vec<String> {
        self.namespace(namespace).keys().cloned().collect()
    }

    /// Translates `key`, returning the key itself when no translation exists.
    pub fn translate(&self, namespace: Namespace, locale: &str, key: &str) -> String {
        let found = self
            .namespace(namespace)
            .get(locale)
            .and_then(|table| table.get(key));
        match found {
            Some(value) => value.clone(),
            None => {
                if self.report_missing {
                    warn!(locale, key, "missing translation");
                }
                key.to_string()
            }
        }
    }

    /// Flattened comparison table used by translation tooling.
    pub fn comparison(&self, namespace: Namespace) -> LocaleComparison {
        let tables = self.namespace(namespace);
        let locales: Vec<String> = tables.keys().cloned().collect();

        let mut keys: Vec<&String> = tables.values().flat_map(|t| t.keys()).collect();
        keys.sort();
        keys.dedup();

        let rows = keys
            .into_iter()
            .map(|key| ComparisonRow {
                key: key.clone(),
                values: locales
                    .iter()
                    .map(|locale| tables.get(locale).and_then(|t| t.get(key)).cloned())
                    .collect(),
            })
            .collect();

        LocaleComparison { locales, rows }
    }
}

async fn load_file(path: &Path) -> Result<Translations, LocaleError> {
    let content = fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| LocaleError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

async fn load_dir(dir: &Path) -> BTreeMap<String, Arc<Translations>> {
    let mut tables = BTreeMap::new();
    let files = match fs::list_files(dir, "json").await {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not list locales");
            return tables;
        }
    };

    for file in files {
        match load_file(&file.path).await {
            Ok(table) => {
                debug!(locale = file.stem(), keys = table.len(), "locale loaded");
                tables.insert(file.stem().to_string(), Arc::new(table));
            }
            Err(e) => warn!(error = %e, "locale file skipped"),
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_and_key_fallback() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("fr.json"), r#"{ "Hello": "Bonjour" }"#).unwrap();

        let locales = Locales::load(dir.path(), &dir.path().join("admin"), true).await;
        assert_eq!(locales.translate(Namespace::Site, "fr", "Hello"), "Bonjour");
        assert_eq!(locales.translate(Namespace::Site, "fr", "Goodbye"), "Goodbye");
        assert_eq!(locales.translate(Namespace::Site, "de", "Hello"), "Hello");
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let dir = tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("admin")).unwrap();
        stdfs::write(dir.path().join("fr.json"), r#"{ "Save": "Enregistrer" }"#).unwrap();
        stdfs::write(dir.path().join("admin/fr.json"), r#"{ "Save": "Sauver" }"#).unwrap();

        let locales = Locales::load(dir.path(), &dir.path().join("admin"), false).await;
        assert_eq!(locales.translate(Namespace::Site, "fr", "Save"), "Enregistrer");
        assert_eq!(locales.translate(Namespace::Admin, "fr", "Save"), "Sauver");
    }

    #[tokio::test]
    async fn test_invalid_file_is_skipped() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("fr.json"), r#"{ "Hello": "Bonjour" }"#).unwrap();
        stdfs::write(dir.path().join("de.json"), "not json").unwrap();

        let locales = Locales::load(dir.path(), &dir.path().join("admin"), false).await;
        assert_eq!(locales.locales(Namespace::Site), vec!["fr".to_string()]);
    }

    #[test]
    fn test_comparison_table() {
        let site = BTreeMap::from([
            (
                "de".to_string(),
                Translations::from([("Hello".to_string(), "Hallo".to_string())]),
            ),
            (
                "fr".to_string(),
                Translations::from([
                    ("Hello".to_string(), "Bonjour".to_string()),
                    ("Bye".to_string(), "Au revoir".to_string()),
                ]),
            ),
        ]);
        let locales = Locales::from_tables(site, BTreeMap::new());
        let table = locales.comparison(Namespace::Site);

        assert_eq!(table.locales, vec!["de", "fr"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].key, "Bye");
        assert_eq!(table.rows[0].values, vec![None, Some("Au revoir".to_string())]);
        assert_eq!(
            table.rows[1].values,
            vec![Some("Hallo".to_string()), Some("Bonjour".to_string())]
        );
    }
}
