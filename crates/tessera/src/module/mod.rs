// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application modules.
//!
//! A module is one directory under the modules root:
//!
//! ```text
//! app/modules/blog/
//!   module.toml          # routes and ACL resources
//!   models/PostModel.toml
//!   views/list.html
//!   views/index.html     # default view
//! ```
//!
//! Code (controllers, services, helpers, lifecycle hooks) is registered
//! through a [`Manifest`] under the same module name.

pub mod descriptor;
pub mod manifest;
pub mod registry;

pub use descriptor::{ModelConfig, ModuleDescriptor, RouteSpec};
pub use manifest::{Controller, HookResult, Manifest, ModuleManifest, ModulesHook};
pub use registry::{build_registry, short_name, Registry};

use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::ModelHandle;
use crate::route::Route;

/// A service or helper instance, downcast by callers to its concrete type.
pub type Component = Arc<dyn Any + Send + Sync>;

/// All modules, keyed by directory name and iterated in name order.
pub type ModuleMap = BTreeMap<String, Module>;

/// Declarative part of a module after loading.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Declared routes with their actions resolved.
    pub routes: Vec<Route>,
    /// ACL resources declared by the module.
    pub acl_resources: Vec<String>,
}

/// One discovered module.
pub struct Module {
    /// Directory name.
    pub name: String,
    /// Module directory.
    pub path: PathBuf,
    /// Routes and ACL resources.
    pub config: ModuleConfig,
    /// Controllers by short name.
    pub controllers: BTreeMap<String, Controller>,
    /// Services by short name.
    pub services: BTreeMap<String, Component>,
    /// Helpers by short name.
    pub helpers: BTreeMap<String, Component>,
    /// Model configs by short name. Not modified after discovery.
    pub model_configs: BTreeMap<String, ModelConfig>,
    /// Bound models by short name. Empty until the model binder ran.
    pub models: BTreeMap<String, ModelHandle>,
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("routes", &self.config.routes.len())
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("model_configs", &self.model_configs.keys().collect::<Vec<_>>())
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Module {
    /// Empty module.
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
            config: ModuleConfig::default(),
            controllers: BTreeMap::new(),
            services: BTreeMap::new(),
            helpers: BTreeMap::new(),
            model_configs: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }

    /// Controller by short name.
    pub fn controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.get(name)
    }

    /// Service by short name, downcast to `T`.
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.services.get(name).cloned()?.downcast().ok()
    }

    /// Helper by short name, downcast to `T`.
    pub fn helper<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.helpers.get(name).cloned()?.downcast().ok()
    }

    /// Bound model by short name, downcast to `T`.
    pub fn model<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.models.get(name).cloned()?.downcast().ok()
    }
}
