// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Access control resources and the authorization predicate.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::{BootError, BootResult};

/// `(subject, resource) -> allowed`. The subject is the authenticated
/// identity, if any.
pub type AclPredicate = Arc<dyn Fn(Option<&JsonValue>, &str) -> bool + Send + Sync>;

/// Declared resources plus the single active predicate.
pub struct Acl {
    resources: Vec<String>,
    owners: HashMap<String, String>,
    predicate: AclPredicate,
    predicate_owner: Option<String>,
}

impl std::fmt::Debug for Acl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acl")
            .field("resources", &self.resources)
            .field("predicate_owner", &self.predicate_owner)
            .finish()
    }
}

impl Default for Acl {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            owners: HashMap::new(),
            predicate: Arc::new(|_subject: Option<&JsonValue>, resource: &str| {
                warn!(resource, "no ACL implementation registered, access denied");
                false
            }),
            predicate_owner: None,
        }
    }
}

impl Acl {
    /// Registers the resources of `module`. A resource already owned by any
    /// module (including `module` itself) is an error.
    pub fn register_resources(&mut self, module: &str, resources: &[String]) -> BootResult<()> {
        for resource in resources {
            if let Some(owner) = self.owners.get(resource) {
                return Err(BootError::DuplicateAclResource {
                    resource: resource.clone(),
                    module: module.to_string(),
                    owner: owner.clone(),
                });
            }
            self.owners.insert(resource.clone(), module.to_string());
            self.resources.push(resource.clone());
        }
        Ok(())
    }

    /// Installs `predicate`. The last module to register one wins.
    pub fn set_predicate(&mut self, module: &str, predicate: AclPredicate) {
        if let Some(previous) = &self.predicate_owner {
            warn!(
                module,
                previous = %previous,
                "ACL implementation replaced by a later module"
            );
        }
        self.predicate = predicate;
        self.predicate_owner = Some(module.to_string());
    }

    /// Declared resources in registration order.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Module owning `resource`.
    pub fn owner(&self, resource: &str) -> Option<&str> {
        self.owners.get(resource).map(String::as_str)
    }

    /// Evaluates the active predicate.
    pub fn is_allowed(&self, subject: Option<&JsonValue>, resource: &str) -> bool {
        (self.predicate)(subject, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_predicate_denies() {
        let acl = Acl::default();
        assert!(!acl.is_allowed(Some(&JsonValue::from("ada")), "post.delete"));
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut acl = Acl::default();
        acl.register_resources("blog", &["post.delete".to_string()]).unwrap();
        let err = acl
            .register_resources("admin", &["post.delete".to_string()])
            .unwrap_err();
        assert!(matches!(err, BootError::DuplicateAclResource { .. }));
        assert_eq!(acl.owner("post.delete"), Some("blog"));
    }

    #[test]
    fn test_last_predicate_wins() {
        let mut acl = Acl::default();
        acl.set_predicate("blog", Arc::new(|_: Option<&JsonValue>, _: &str| false));
        acl.set_predicate(
            "admin",
            Arc::new(|subject: Option<&JsonValue>, _: &str| subject.is_some()),
        );
        assert!(acl.is_allowed(Some(&JsonValue::Bool(true)), "anything"));
        assert!(!acl.is_allowed(None, "anything"));
    }
}
