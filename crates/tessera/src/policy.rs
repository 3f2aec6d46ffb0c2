// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route policies.
//!
//! A policy runs before a route's action and either hands the request on
//! through [`Next`] or answers it itself. Built-in kinds are declared as
//! `<policies_dir>/<name>.toml` files:
//!
//! ```toml
//! kind = "timeout"
//! millis = 2000
//! ```
//!
//! Application code registers further policies by name with
//! [`Policy::custom`]; those override file policies of the same name.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ConfigError, HttpError};
use crate::fs;
use crate::handler::{Ctx, HandlerResult, Reply};
use crate::route::Next;

/// Signature of a code policy.
pub type PolicyFn = Arc<dyn Fn(Ctx, Next) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A resolved policy.
#[derive(Clone)]
pub enum Policy {
    /// Requires an identity. Redirects to `redirect` when set, otherwise
    /// answers 401.
    Authenticated {
        /// Redirect target for anonymous requests.
        redirect: Option<String>,
    },
    /// Checks the ACL predicate for `resource`, or for the route's
    /// `acl_resource` when unset.
    Acl {
        /// Resource to check.
        resource: Option<String>,
    },
    /// Switches the request language from the path parameter `param`.
    Language {
        /// Path parameter holding the language.
        param: String,
    },
    /// Fails with 504 when the rest of the chain takes longer than `millis`.
    Timeout {
        /// Deadline in milliseconds.
        millis: u64,
    },
    /// Application code.
    Custom(PolicyFn),
}

impl std::fmt::Debug for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Authenticated { redirect } => f
                .debug_struct("Authenticated")
                .field("redirect", redirect)
                .finish(),
            Policy::Acl { resource } => f.debug_struct("Acl").field("resource", resource).finish(),
            Policy::Language { param } => f.debug_struct("Language").field("param", param).finish(),
            Policy::Timeout { millis } => f.debug_struct("Timeout").field("millis", millis).finish(),
            Policy::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Policy {
    /// Wraps an async function `(ctx, next) -> result`.
    pub fn custom<F, Fut>(f: F) -> Self
    where
        F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Policy::Custom(Arc::new(
            move |ctx, next| -> BoxFuture<'static, HandlerResult> { Box::pin(f(ctx, next)) },
        ))
    }

    /// Runs the policy.
    pub fn call(&self, ctx: Ctx, next: Next) -> BoxFuture<'static, HandlerResult> {
        match self {
            Policy::Custom(f) => f(ctx, next),
            Policy::Authenticated { redirect } => {
                let redirect = redirect.clone();
                Box::pin(async move {
                    if ctx.identity().is_some() {
                        return next.run(ctx).await;
                    }
                    match redirect {
                        Some(location) => Ok(Reply::redirect(&location)),
                        None => Err(HttpError::unauthorized("Authentication required")),
                    }
                })
            }
            Policy::Acl { resource } => {
                let resource = resource.clone();
                Box::pin(async move {
                    let (identity, route_resource) = ctx
                        .context
                        .with(|c| (c.identity.clone(), c.acl_resource.clone()));
                    let Some(resource) = resource.or(route_resource) else {
                        warn!(uri = %ctx.uri, "acl policy without a resource, access denied");
                        return Err(HttpError::forbidden("Access denied"));
                    };

                    if ctx.app.acl.is_allowed(identity.as_ref(), &resource) {
                        return next.run(ctx).await;
                    }
                    match identity {
                        None => Err(HttpError::unauthorized(format!(
                            "Authentication required for '{}'",
                            resource
                        ))),
                        Some(_) => Err(HttpError::forbidden(format!(
                            "Access to '{}' denied",
                            resource
                        ))),
                    }
                })
            }
            Policy::Language { param } => {
                let param = param.clone();
                Box::pin(async move {
                    if let Some(language) = ctx.param(&param).map(str::to_string) {
                        let Some(locale) = ctx.app.config.i18n.languages.get(&language).cloned()
                        else {
                            return Err(HttpError::not_found(format!(
                                "Unknown language '{}'",
                                language
                            )));
                        };
                        let app = ctx.app.clone();
                        ctx.context
                            .with(|c| c.set_language(&app, &language, &locale));
                    }
                    next.run(ctx).await
                })
            }
            Policy::Timeout { millis } => {
                let millis = *millis;
                Box::pin(async move {
                    tokio::time::timeout(Duration::from_millis(millis), next.run(ctx))
                        .await
                        .map_err(|_| {
                            HttpError::timeout(format!("Request exceeded {} ms", millis))
                        })?
                })
            }
        }
    }
}

/// Policy file contents.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicySpec {
    /// `kind = "authenticated"`.
    Authenticated {
        /// Optional redirect target.
        #[serde(default)]
        redirect: Option<String>,
    },
    /// `kind = "acl"`.
    Acl {
        /// Optional fixed resource.
        #[serde(default)]
        resource: Option<String>,
    },
    /// `kind = "language"`.
    Language {
        /// Path parameter (default: "language").
        #[serde(default = "default_language_param")]
        param: String,
    },
    /// `kind = "timeout"`.
    Timeout {
        /// Deadline in milliseconds.
        millis: u64,
    },
}

fn default_language_param() -> String {
    "language".to_string()
}

impl PolicySpec {
    /// Parses a policy file. `origin` is used in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }
}

impl From<PolicySpec> for Policy {
    fn from(spec: PolicySpec) -> Self {
        match spec {
            PolicySpec::Authenticated { redirect } => Policy::Authenticated { redirect },
            PolicySpec::Acl { resource } => Policy::Acl { resource },
            PolicySpec::Language { param } => Policy::Language { param },
            PolicySpec::Timeout { millis } => Policy::Timeout { millis },
        }
    }
}

/// Policies by name.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Policy>,
}

impl PolicyRegistry {
    /// Loads `<dir>/*.toml`, then adds the code policies. A file that fails
    /// to read or parse is logged and skipped.
    pub async fn load(dir: &Path, code: BTreeMap<String, Policy>) -> Self {
        let mut policies = BTreeMap::new();

        match fs::list_files(dir, "toml").await {
            Ok(files) => {
                for file in files {
                    let origin = file.path.display().to_string();
                    let parsed = match fs::read_to_string(&file.path).await {
                        Ok(content) => PolicySpec::parse(&content, &origin),
                        Err(e) => Err(ConfigError::Io(e)),
                    };
                    match parsed {
                        Ok(spec) => {
                            debug!(policy = file.stem(), "policy loaded");
                            policies.insert(file.stem().to_string(), Policy::from(spec));
                        }
                        Err(e) => warn!(path = %origin, error = %e, "policy file skipped"),
                    }
                }
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "could not list policies"),
        }

        policies.extend(code);
        Self { policies }
    }

    /// Builds a registry from memory.
    pub fn from_policies(policies: impl IntoIterator<Item = (String, Policy)>) -> Self {
        Self {
            policies: policies.into_iter().collect(),
        }
    }

    /// Policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Resolves names in order. Unknown names are logged and skipped.
    pub fn resolve(&self, names: &[String]) -> Vec<Policy> {
        names
            .iter()
            .filter_map(|name| {
                let policy = self.policies.get(name).cloned();
                if policy.is_none() {
                    warn!(policy = %name, "unknown policy skipped");
                }
                policy
            })
            .collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_policy_specs() {
        assert_eq!(
            PolicySpec::parse("kind = \"language\"", "language.toml").unwrap(),
            PolicySpec::Language {
                param: "language".to_string()
            }
        );
        assert_eq!(
            PolicySpec::parse("kind = \"timeout\"\nmillis = 250", "t.toml").unwrap(),
            PolicySpec::Timeout { millis: 250 }
        );
        assert!(PolicySpec::parse("kind = \"magic\"", "m.toml").is_err());
    }

    #[tokio::test]
    async fn test_load_skips_bad_files_and_code_wins() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("auth.toml"), "kind = \"authenticated\"").unwrap();
        stdfs::write(dir.path().join("slow.toml"), "kind = \"timeout\"\nmillis = 10").unwrap();
        stdfs::write(dir.path().join("broken.toml"), "kind = ").unwrap();

        let code = BTreeMap::from([(
            "slow".to_string(),
            Policy::custom(|_ctx, _next| async { Ok(Reply::Render) }),
        )]);
        let registry = PolicyRegistry::load(dir.path(), code).await;

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["auth", "slow"]);
        assert!(matches!(registry.get("slow"), Some(Policy::Custom(_))));
        assert!(matches!(
            registry.get("auth"),
            Some(Policy::Authenticated { redirect: None })
        ));
    }

    #[test]
    fn test_resolve_skips_unknown() {
        let registry = PolicyRegistry::from_policies([(
            "slow".to_string(),
            Policy::Timeout { millis: 5 },
        )]);
        let resolved = registry.resolve(&["missing".to_string(), "slow".to_string()]);
        assert_eq!(resolved.len(), 1);
    }
}
