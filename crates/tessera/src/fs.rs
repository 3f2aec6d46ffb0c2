// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Directory scanning helpers used during discovery.
//!
//! Listings are always sorted by file name so that discovery is
//! deterministic across platforms.

use std::io;
use std::path::{Path, PathBuf};

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File name (last path component).
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// True for directories.
    pub is_dir: bool,
}

impl Entry {
    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Extension without the dot, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|s| s.to_str())
    }
}

/// Lists `dir`, sorted by name. A missing directory yields an empty list.
pub async fn list_dir(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let is_dir = entry.file_type().await?.is_dir();
        entries.push(Entry {
            name,
            path: entry.path(),
            is_dir,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Immediate subdirectories of `dir`, sorted.
pub async fn list_subdirs(dir: &Path) -> io::Result<Vec<Entry>> {
    Ok(list_dir(dir)
        .await?
        .into_iter()
        .filter(|e| e.is_dir)
        .collect())
}

/// Files in `dir` with the given extension, sorted.
pub async fn list_files(dir: &Path, extension: &str) -> io::Result<Vec<Entry>> {
    Ok(list_dir(dir)
        .await?
        .into_iter()
        .filter(|e| !e.is_dir && e.extension() == Some(extension))
        .collect())
}

/// Reads a UTF-8 file.
pub async fn read_to_string(path: &Path) -> io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// True if `path` exists. Permission errors count as missing.
pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
