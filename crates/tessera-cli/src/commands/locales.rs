// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Locale comparison command.
//!
//! Lists every translation key next to its value in each locale, which
//! makes missing translations easy to spot.

use std::path::Path;

use console::style;
use tessera::config::{self, Config};
use tessera::locale::{LocaleComparison, Locales, Namespace};

const MISSING: &str = "-";

/// Loads the project's locale files and prints the comparison table.
pub async fn run(root: &Path, admin: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root)?;
    let locales = Locales::load(
        &config::resolve(root, &config.server.locales_dir),
        &config::resolve(root, &config.server.admin_locales_dir),
        false,
    )
    .await;

    let namespace = if admin { Namespace::Admin } else { Namespace::Site };
    let comparison = locales.comparison(namespace);

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    if comparison.locales.is_empty() {
        println!("{}", style("No locale files found").yellow());
        return Ok(());
    }

    for line in format_comparison(&comparison) {
        println!("{}", line);
    }

    let missing = count_missing(&comparison);
    if missing > 0 {
        println!();
        println!("{} {} missing translations", style("Warning:").yellow(), missing);
    }
    Ok(())
}

/// Header line followed by one tab-separated line per key.
pub fn format_comparison(comparison: &LocaleComparison) -> Vec<String> {
    let mut lines = Vec::with_capacity(comparison.rows.len() + 1);
    lines.push(format!("key\t{}", comparison.locales.join("\t")));
    for row in &comparison.rows {
        let values: Vec<&str> = row
            .values
            .iter()
            .map(|value| value.as_deref().unwrap_or(MISSING))
            .collect();
        lines.push(format!("{}\t{}", row.key, values.join("\t")));
    }
    lines
}

/// Number of (key, locale) cells without a translation.
pub fn count_missing(comparison: &LocaleComparison) -> usize {
    comparison
        .rows
        .iter()
        .flat_map(|row| row.values.iter())
        .filter(|value| value.is_none())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera::locale::Translations;

    fn table(pairs: &[(&str, &str)]) -> Translations {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_format_marks_missing_cells() {
        let mut site = BTreeMap::new();
        site.insert("en-gb".to_string(), table(&[("Hello", "Hello"), ("Bye", "Bye")]));
        site.insert("fr-fr".to_string(), table(&[("Hello", "Bonjour")]));
        let locales = Locales::from_tables(site, BTreeMap::new());

        let comparison = locales.comparison(Namespace::Site);
        assert_eq!(
            format_comparison(&comparison),
            vec![
                "key\ten-gb\tfr-fr".to_string(),
                "Bye\tBye\t-".to_string(),
                "Hello\tHello\tBonjour".to_string(),
            ]
        );
        assert_eq!(count_missing(&comparison), 1);
    }
}
