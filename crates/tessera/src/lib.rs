// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # Tessera
//!
//! Convention-driven web application framework on top of axum.
//!
//! An application is a set of modules discovered on disk. Each module
//! declares its routes and ACL resources in `module.toml`, keeps its pages
//! under `views/` and its model configs under `models/`. Controllers,
//! services and helpers are compiled in and registered through a
//! [`Manifest`]. At startup the modules are merged into one route table and
//! every page is rendered inside a shared layout with Handlebars.
//!
//! ## Features
//!
//! - Module discovery with deterministic load order
//! - Route composition (ordering, wildcard-last, per-route policy chains)
//! - Two-pass page rendering with translation helpers
//! - HTML or JSON error pages
//! - Signed cookie or store-backed sessions
//! - Pluggable database adapters (SQLite bundled)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera::{Controller, Manifest, ModuleManifest, Reply, Tessera};
//!
//! let manifest = Manifest::new().module(
//!     "blog",
//!     ModuleManifest::new().controller(
//!         "PostsController",
//!         Controller::new().action("list", |ctx| async move {
//!             Ok(ctx.render(serde_json::json!({ "posts": [] })))
//!         }),
//!     ),
//! );
//!
//! let running = Tessera::load(".")?.manifest(manifest).start().await?;
//! running.wait_for_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! ```

/// Access control resources and predicate.
pub mod acl;
/// Application builder, state and startup.
pub mod app;
/// Request body and query parsing.
pub mod body;
/// Configuration loading.
pub mod config;
/// Per-request context.
pub mod context;
/// Database adapters and model binding.
pub mod db;
/// Error types.
pub mod error;
/// Event bus.
pub mod events;
/// Async filesystem helpers.
pub mod fs;
/// Actions and the request handle.
pub mod handler;
/// Cookie signing keys.
pub mod keys;
/// Locale tables.
pub mod locale;
/// Framework middleware.
pub mod middleware;
/// Module discovery.
pub mod module;
/// Route policies.
pub mod policy;
/// Page rendering.
pub mod render;
/// Route composition and dispatch.
pub mod route;
/// Sessions.
pub mod session;
/// WebSocket push channel.
pub mod sockets;

#[cfg(test)]
mod testing;

pub use app::{AppState, Lifecycle, RunningApplication, Tessera};
pub use config::Config;
pub use error::{BootError, HttpError, RenderError};
pub use events::{Event, Events};
pub use handler::{Action, Ctx, HandlerResult, Reply};
pub use module::{Controller, Manifest, ModuleManifest};
pub use policy::Policy;
pub use route::{Next, Route, RouteTable};
pub use session::{FnSessionStore, SessionStore};
