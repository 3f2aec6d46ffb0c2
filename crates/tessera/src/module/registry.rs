// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Module discovery.
//!
//! Every immediate subdirectory of the modules root becomes one module, in
//! name order. Within a module the load order is fixed: helpers, model
//! configs, services, controllers, then the descriptor (whose routes resolve
//! against the controllers). A module that fails to load is logged and
//! registered without routes; the other modules are unaffected.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, error, info, warn};

use super::descriptor::{ModelConfig, ModuleDescriptor};
use super::manifest::{Manifest, ModuleManifest, ModulesHook};
use super::{Module, ModuleConfig, ModuleMap};
use crate::acl::Acl;
use crate::config::ModulesConfig;
use crate::error::{BootResult, ModuleError};
use crate::fs;

/// Result of discovery.
#[derive(Default)]
pub struct Registry {
    /// Modules by name.
    pub modules: ModuleMap,
    /// `after_modules_setup` hooks with their module, in registration order.
    pub after_modules_setup: Vec<(String, ModulesHook)>,
    /// `after_models_setup` hooks with their module, in registration order.
    pub after_models_setup: Vec<(String, ModulesHook)>,
}

/// Discovers the modules under `root`.
///
/// ACL resources are registered into `acl` as modules load; a resource
/// declared twice aborts discovery with
/// [`crate::BootError::DuplicateAclResource`].
pub async fn build_registry(
    root: &Path,
    conventions: &ModulesConfig,
    manifest: &Manifest,
    acl: &mut Acl,
) -> BootResult<Registry> {
    let dirs = fs::list_subdirs(root).await?;

    for name in manifest.names() {
        if !dirs.iter().any(|d| d.name == name) {
            warn!(module = name, root = %root.display(), "manifest entry has no module directory");
        }
    }

    let mut registry = Registry::default();
    for dir in dirs {
        let code = manifest.get(&dir.name);
        let mut module = Module::new(dir.name.clone(), dir.path.clone());

        match load_module(&mut module, conventions, code).await {
            Ok(()) => {
                acl.register_resources(&module.name, &module.config.acl_resources)?;
                if let Some(code) = code {
                    if let Some(predicate) = &code.is_allowed {
                        acl.set_predicate(&module.name, predicate.clone());
                    }
                    for hook in &code.after_modules_setup {
                        registry
                            .after_modules_setup
                            .push((module.name.clone(), hook.clone()));
                    }
                    for hook in &code.after_models_setup {
                        registry
                            .after_models_setup
                            .push((module.name.clone(), hook.clone()));
                    }
                }
                info!(
                    module = %module.name,
                    routes = module.config.routes.len(),
                    models = module.model_configs.len(),
                    "module loaded"
                );
            }
            Err(e) => {
                error!(module = %dir.name, error = %e, "module failed to load, registered without routes");
                module = Module::new(dir.name.clone(), dir.path.clone());
            }
        }

        registry.modules.insert(dir.name, module);
    }

    Ok(registry)
}

/// Runs lifecycle hooks in order. A failing hook is logged.
pub fn run_hooks(phase: &str, hooks: &[(String, ModulesHook)], modules: &ModuleMap) {
    for (module, hook) in hooks {
        if let Err(e) = hook(modules) {
            error!(module = %module, phase, error = %e, "lifecycle hook failed");
        }
    }
}

async fn load_module(
    module: &mut Module,
    conventions: &ModulesConfig,
    code: Option<&ModuleManifest>,
) -> Result<(), ModuleError> {
    let empty = ModuleManifest::default();
    let code = code.unwrap_or(&empty);

    module.helpers = by_short_name("helpers", "Helper", code.helpers.clone())?;

    let mut model_files = Vec::new();
    for entry in fs::list_files(&module.path.join(&conventions.models_dir), "toml").await? {
        let content = fs::read_to_string(&entry.path).await?;
        let config = ModelConfig::parse(&content, &entry.path.display().to_string())?;
        model_files.push((entry.name, config));
    }
    module.model_configs = by_short_name("models", "Model", model_files)?;

    module.services = by_short_name("services", "Service", code.services.clone())?;
    module.controllers = by_short_name("controllers", "Controller", code.controllers.clone())?;

    let descriptor_path = module.path.join(&conventions.descriptor_file);
    if fs::exists(&descriptor_path).await {
        let content = fs::read_to_string(&descriptor_path).await?;
        let descriptor =
            ModuleDescriptor::parse(&content, &descriptor_path.display().to_string())?;
        let routes = descriptor
            .routes
            .iter()
            .map(|spec| spec.resolve(module))
            .collect::<Result<Vec<_>, _>>()?;
        module.config = ModuleConfig {
            routes,
            acl_resources: descriptor.acl.resources,
        };
    } else {
        debug!(module = %module.name, "no descriptor, module has no routes");
    }

    Ok(())
}

/// Short name of a registered name or file name: the extension and the
/// conventional suffix are removed (`PostModel.toml` gives `Post`).
pub fn short_name(name: &str, suffix: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    match stem.strip_suffix(suffix) {
        Some(short) if !short.is_empty() => short.to_string(),
        _ => stem.to_string(),
    }
}

/// Keys `entries` by short name, visiting them in name order. Two entries
/// with the same short name are an error.
fn by_short_name<T>(
    kind: &'static str,
    suffix: &str,
    mut entries: Vec<(String, T)>,
) -> Result<BTreeMap<String, T>, ModuleError> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let mut items = BTreeMap::new();
    for (name, item) in entries {
        let short = short_name(&name, suffix);
        if let Some(first) = owners.get(&short) {
            return Err(ModuleError::NameCollision {
                kind,
                short,
                first: first.clone(),
                second: name,
            });
        }
        owners.insert(short.clone(), name);
        items.insert(short, item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootError;
    use crate::handler::Reply;
    use crate::module::Controller;
    use std::fs as stdfs;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        stdfs::create_dir_all(path.parent().unwrap()).unwrap();
        stdfs::write(path, content).unwrap();
    }

    fn blog_manifest() -> Manifest {
        Manifest::new().module(
            "blog",
            ModuleManifest::new()
                .controller(
                    "PostsController",
                    Controller::new().action("list", |_ctx| async { Ok(Reply::Render) }),
                )
                .service("FeedService", 42u32)
                .helper("SlugHelper", "slug"),
        )
    }

    fn setup_test_modules(dir: &Path) {
        write(
            dir,
            "blog/module.toml",
            r#"
            [[routes]]
            method = "get"
            path = "/posts"
            action = "Posts.list"

            [acl]
            resources = ["post.delete"]
            "#,
        );
        write(dir, "blog/models/PostModel.toml", "[schema]\ntitle = \"TEXT\"\n");
        stdfs::create_dir_all(dir.join("pages")).unwrap();
        write(dir, "README.md", "not a module");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("PostsController", "Controller"), "Posts");
        assert_eq!(short_name("PostModel.toml", "Model"), "Post");
        assert_eq!(short_name("Post.toml", "Model"), "Post");
        assert_eq!(short_name("Model.toml", "Model"), "Model");
    }

    #[test]
    fn test_collision_is_an_error() {
        let result = by_short_name(
            "models",
            "Model",
            vec![("PostModel.toml".to_string(), 1), ("Post.toml".to_string(), 2)],
        );
        match result {
            Err(ModuleError::NameCollision { short, first, second, .. }) => {
                assert_eq!(short, "Post");
                assert_eq!(first, "Post.toml");
                assert_eq!(second, "PostModel.toml");
            }
            _ => panic!("expected a collision"),
        }
    }

    #[tokio::test]
    async fn test_discovers_modules() {
        let dir = tempdir().unwrap();
        setup_test_modules(dir.path());
        let mut acl = Acl::default();

        let registry = build_registry(dir.path(), &ModulesConfig::default(), &blog_manifest(), &mut acl)
            .await
            .unwrap();

        let names: Vec<_> = registry.modules.keys().cloned().collect();
        assert_eq!(names, vec!["blog", "pages"]);

        let blog = &registry.modules["blog"];
        assert_eq!(blog.config.routes.len(), 1);
        assert!(blog.controller("Posts").is_some());
        assert_eq!(*blog.service::<u32>("Feed").unwrap(), 42);
        assert!(blog.helpers.contains_key("Slug"));
        assert!(blog.model_configs.contains_key("Post"));
        assert!(blog.models.is_empty());
        assert_eq!(acl.resources(), &["post.delete".to_string()]);

        assert!(registry.modules["pages"].config.routes.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_is_idempotent() {
        let dir = tempdir().unwrap();
        setup_test_modules(dir.path());
        let manifest = blog_manifest();

        let summarize = |registry: &Registry| {
            registry
                .modules
                .values()
                .map(|m| {
                    (
                        m.name.clone(),
                        m.config
                            .routes
                            .iter()
                            .map(|r| (r.method.clone(), r.path.clone(), r.action.name().to_string()))
                            .collect::<Vec<_>>(),
                        m.model_configs.keys().cloned().collect::<Vec<_>>(),
                        m.controllers.keys().cloned().collect::<Vec<_>>(),
                        m.services.keys().cloned().collect::<Vec<_>>(),
                        m.helpers.keys().cloned().collect::<Vec<_>>(),
                    )
                })
                .collect::<Vec<_>>()
        };

        let first = build_registry(dir.path(), &ModulesConfig::default(), &manifest, &mut Acl::default())
            .await
            .unwrap();
        let second = build_registry(dir.path(), &ModulesConfig::default(), &manifest, &mut Acl::default())
            .await
            .unwrap();
        assert_eq!(summarize(&first), summarize(&second));
    }

    #[tokio::test]
    async fn test_broken_module_does_not_abort_others() {
        let dir = tempdir().unwrap();
        setup_test_modules(dir.path());
        write(dir.path(), "admin/module.toml", "[[routes]]\nmethod = ");

        let registry = build_registry(
            dir.path(),
            &ModulesConfig::default(),
            &blog_manifest(),
            &mut Acl::default(),
        )
        .await
        .unwrap();

        assert!(registry.modules["admin"].config.routes.is_empty());
        assert_eq!(registry.modules["blog"].config.routes.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_fails_only_that_module() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "shop/module.toml",
            "[[routes]]\nmethod = \"get\"\npath = \"/cart\"\naction = \"Cart.show\"\n",
        );

        let registry = build_registry(
            dir.path(),
            &ModulesConfig::default(),
            &Manifest::new(),
            &mut Acl::default(),
        )
        .await
        .unwrap();
        assert!(registry.modules["shop"].config.routes.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_acl_resource_is_fatal() {
        let dir = tempdir().unwrap();
        setup_test_modules(dir.path());
        write(
            dir.path(),
            "admin/module.toml",
            "[acl]\nresources = [\"post.delete\"]\n",
        );

        let result = build_registry(
            dir.path(),
            &ModulesConfig::default(),
            &blog_manifest(),
            &mut Acl::default(),
        )
        .await;

        match result {
            Err(BootError::DuplicateAclResource { resource, module, owner }) => {
                assert_eq!(resource, "post.delete");
                assert_eq!(owner, "admin");
                assert_eq!(module, "blog");
            }
            _ => panic!("expected a duplicate ACL resource error"),
        }
    }

    #[tokio::test]
    async fn test_hooks_are_collected_in_module_order() {
        let dir = tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("a")).unwrap();
        stdfs::create_dir_all(dir.path().join("b")).unwrap();
        let manifest = Manifest::new()
            .module("b", ModuleManifest::new().after_modules_setup(|_| Ok(())))
            .module(
                "a",
                ModuleManifest::new()
                    .after_modules_setup(|_| Ok(()))
                    .after_models_setup(|_| Err("boom".into())),
            );

        let registry = build_registry(
            dir.path(),
            &ModulesConfig::default(),
            &manifest,
            &mut Acl::default(),
        )
        .await
        .unwrap();

        let order: Vec<_> = registry
            .after_modules_setup
            .iter()
            .map(|(m, _)| m.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b"]);
        // A failing hook is only logged
        run_hooks("after_models_setup", &registry.after_models_setup, &registry.modules);
    }
}
