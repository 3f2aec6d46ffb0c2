// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Database adapters and the model binder.
//!
//! The framework does not ship a persistence engine. It talks to storage
//! through [`DbAdapter`]; one adapter instance exists per configured
//! connection. [`SqliteAdapter`] is bundled for development and tests.

mod sqlite;

pub use sqlite::{SqliteAdapter, SqliteModel};

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::error::DbError;
use crate::module::{ModelConfig, ModuleMap};

/// A materialized model, downcast by callers to the adapter's concrete type.
pub type ModelHandle = Arc<dyn Any + Send + Sync>;

/// The adapter's underlying connection object.
pub type ConnectionHandle = Arc<dyn Any + Send + Sync>;

/// Members every adapter must provide.
pub const ADAPTER_CONTRACT: [&str; 4] = ["connect", "connection", "connectedTo", "setupModel"];

/// Storage adapter contract.
#[async_trait]
pub trait DbAdapter: Send + Sync {
    /// Members this adapter implements; checked against
    /// [`ADAPTER_CONTRACT`] before `connect` is called.
    fn provides(&self) -> Vec<&'static str> {
        ADAPTER_CONTRACT.to_vec()
    }

    /// Opens the connection.
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), DbError>;

    /// The live connection, after `connect`.
    fn connection(&self) -> Option<ConnectionHandle>;

    /// Description of what the adapter is connected to, after `connect`.
    fn connected_to(&self) -> Option<String>;

    /// Materializes a model from its config.
    async fn setup_model(&self, name: &str, config: &ModelConfig) -> Result<ModelHandle, DbError>;
}

/// Creates adapter instances for a driver name.
pub type AdapterFactory = Arc<dyn Fn() -> Box<dyn DbAdapter> + Send + Sync>;

/// Connected adapters by connection name.
pub type Connections = BTreeMap<String, Arc<dyn DbAdapter>>;

/// Binds every module's model configs through their named connection.
///
/// Models are bound one at a time, in module order then model name order.
/// A model naming an unknown connection, or one whose binding fails, is
/// logged and skipped.
pub async fn bind_models(modules: &mut ModuleMap, connections: &Connections) {
    for (module_name, module) in modules.iter_mut() {
        let configs: Vec<(String, ModelConfig)> = module
            .model_configs
            .iter()
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect();

        for (name, config) in configs {
            let Some(adapter) = connections.get(&config.connection) else {
                warn!(
                    module = %module_name,
                    model = %name,
                    connection = %config.connection,
                    "model skipped, connection not configured"
                );
                continue;
            };

            match adapter.setup_model(&name, &config).await {
                Ok(handle) => {
                    info!(module = %module_name, model = %name, "model bound");
                    module.models.insert(name, handle);
                }
                Err(e) => {
                    warn!(module = %module_name, model = %name, error = %e, "model binding failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use std::path::PathBuf;

    fn model(connection: &str) -> ModelConfig {
        ModelConfig {
            connection: connection.to_string(),
            table: None,
            schema: BTreeMap::from([("title".to_string(), "TEXT".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_bind_models_skips_unknown_connection() {
        let mut adapter = SqliteAdapter::default();
        adapter
            .connect(&ConnectionConfig {
                driver: "sqlite".to_string(),
                database: ":memory:".to_string(),
                options: toml::Table::new(),
            })
            .await
            .unwrap();
        let connections: Connections = BTreeMap::from([(
            "default".to_string(),
            Arc::new(adapter) as Arc<dyn DbAdapter>,
        )]);

        let mut blog = Module::new("blog", PathBuf::from("/tmp/blog"));
        blog.model_configs.insert("Post".to_string(), model("default"));
        blog.model_configs.insert("Archive".to_string(), model("missing"));
        let mut modules = ModuleMap::from([("blog".to_string(), blog)]);

        bind_models(&mut modules, &connections).await;

        let blog = &modules["blog"];
        assert!(blog.models.contains_key("Post"));
        assert!(!blog.models.contains_key("Archive"));
        assert!(blog.model::<SqliteModel>("Post").is_some());
    }
}
