// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `serve`: Start the application server
//! - `routes`: Print the composed route table
//! - `locales`: Print the locale comparison table
//! - `init`: Scaffold a new project

/// Project scaffolding command.
pub mod init;
/// Locale comparison command.
pub mod locales;
/// Route table command.
pub mod routes;
/// Application server command.
pub mod serve;
