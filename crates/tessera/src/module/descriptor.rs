// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! On-disk module files: `module.toml` and model configs.
//!
//! ```toml
//! [[routes]]
//! method = "get"
//! path = "/posts/:id"
//! action = "Posts.show"     # controller short name + action
//! order = 10
//! policies = ["language"]
//!
//! [routes.options]
//! error_response_as_json = true
//! acl_resource = "post.read"
//!
//! [acl]
//! resources = ["post.read", "post.delete"]
//! ```
//!
//! An `action` without a controller (`action = "about"`) renders the page
//! of the same name without running any code.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::Module;
use crate::error::ModuleError;
use crate::handler::Action;
use crate::route::{Route, RouteOptions};

/// Parsed `module.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleDescriptor {
    /// Declared routes.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// ACL declarations.
    #[serde(default)]
    pub acl: AclSpec,
}

/// ACL section of a descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AclSpec {
    /// Resources owned by the module. Must be unique across modules.
    #[serde(default)]
    pub resources: Vec<String>,
}

/// One `[[routes]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSpec {
    /// HTTP method, any case.
    pub method: String,
    /// Path pattern.
    pub path: String,
    /// `Controller.action` or a bare page name.
    pub action: String,
    /// Sort key (default 0).
    #[serde(default)]
    pub order: i32,
    /// Policy names applied before the action.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Route flags.
    #[serde(default)]
    pub options: RouteOptions,
}

impl ModuleDescriptor {
    /// Parses descriptor text. `origin` is used in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ModuleError> {
        toml::from_str(content).map_err(|e| ModuleError::Descriptor {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }
}

impl RouteSpec {
    /// Resolves the action against the module's controllers.
    pub fn resolve(&self, module: &Module) -> Result<Route, ModuleError> {
        let action = match self.action.split_once('.') {
            Some((controller, action)) => module
                .controller(controller)
                .and_then(|c| c.get(action))
                .cloned()
                .ok_or_else(|| ModuleError::UnknownAction(self.action.clone()))?,
            None => Action::render_only(self.action.clone()),
        };

        Ok(Route::new(&self.method, &self.path, action)?
            .with_order(self.order)
            .with_policies(self.policies.clone())
            .with_options(self.options.clone()))
    }
}

/// A model config from `models/<Name>Model.toml`.
///
/// ```toml
/// connection = "default"
/// table = "posts"
///
/// [schema]
/// title = "TEXT NOT NULL"
/// views = "INTEGER"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Connection name (default: "default").
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Table or collection name; adapters derive one from the model name
    /// when absent.
    #[serde(default)]
    pub table: Option<String>,
    /// Field name to adapter type.
    #[serde(default)]
    pub schema: BTreeMap<String, String>,
}

fn default_connection() -> String {
    "default".to_string()
}

impl ModelConfig {
    /// Parses model config text. `origin` is used in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ModuleError> {
        toml::from_str(content).map_err(|e| ModuleError::ModelConfig {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }
}
