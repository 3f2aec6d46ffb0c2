// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Static registration of module code.
//!
//! Controllers, services, helpers, lifecycle hooks and the ACL predicate
//! are compiled into the application and registered here under the module
//! they belong to:
//!
//! ```ignore
//! let manifest = Manifest::new().module(
//!     "blog",
//!     ModuleManifest::new()
//!         .controller("PostsController", Controller::new().action("list", list_posts))
//!         .service("FeedService", FeedService::default())
//!         .after_models_setup(|modules| {
//!             tracing::info!(count = modules.len(), "models ready");
//!             Ok(())
//!         }),
//! );
//! ```
//!
//! Registered names keep their conventional suffix (`PostsController`);
//! the registry strips it to form the short name (`Posts`).

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{Component, ModuleMap};
use crate::acl::AclPredicate;
use crate::handler::{Action, Ctx, HandlerResult};

/// Result of a lifecycle hook. Failures are logged and do not stop startup.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Lifecycle hook receiving the complete module map.
pub type ModulesHook = Arc<dyn Fn(&ModuleMap) -> HookResult + Send + Sync>;

/// Named actions.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    actions: BTreeMap<String, Action>,
}

impl Controller {
    /// Empty controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action. Its name is also the conventional page name.
    pub fn action<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.actions.insert(name.to_string(), Action::new(name, f));
        self
    }

    /// Action by name.
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Action names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

/// Code registered for one module.
#[derive(Clone, Default)]
pub struct ModuleManifest {
    pub(crate) helpers: Vec<(String, Component)>,
    pub(crate) services: Vec<(String, Component)>,
    pub(crate) controllers: Vec<(String, Controller)>,
    pub(crate) after_modules_setup: Vec<ModulesHook>,
    pub(crate) after_models_setup: Vec<ModulesHook>,
    pub(crate) is_allowed: Option<AclPredicate>,
}

impl ModuleManifest {
    /// Empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a helper (`SlugHelper`).
    pub fn helper<T: Any + Send + Sync>(mut self, name: &str, helper: T) -> Self {
        self.helpers.push((name.to_string(), Arc::new(helper)));
        self
    }

    /// Registers a service (`FeedService`).
    pub fn service<T: Any + Send + Sync>(mut self, name: &str, service: T) -> Self {
        self.services.push((name.to_string(), Arc::new(service)));
        self
    }

    /// Registers a controller (`PostsController`).
    pub fn controller(mut self, name: &str, controller: Controller) -> Self {
        self.controllers.push((name.to_string(), controller));
        self
    }

    /// Hook run once every module is registered and routes are composed.
    pub fn after_modules_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ModuleMap) -> HookResult + Send + Sync + 'static,
    {
        self.after_modules_setup.push(Arc::new(hook));
        self
    }

    /// Hook run once every model is bound.
    pub fn after_models_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ModuleMap) -> HookResult + Send + Sync + 'static,
    {
        self.after_models_setup.push(Arc::new(hook));
        self
    }

    /// Replaces the global ACL predicate.
    pub fn is_allowed<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Option<&JsonValue>, &str) -> bool + Send + Sync + 'static,
    {
        self.is_allowed = Some(Arc::new(predicate));
        self
    }
}

/// Code for every module, by module name.
#[derive(Clone, Default)]
pub struct Manifest {
    modules: BTreeMap<String, ModuleManifest>,
}

impl Manifest {
    /// Empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the code of one module.
    pub fn module(mut self, name: &str, module: ModuleManifest) -> Self {
        self.modules.insert(name.to_string(), module);
        self
    }

    /// Code of a module.
    pub fn get(&self, name: &str) -> Option<&ModuleManifest> {
        self.modules.get(name)
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
