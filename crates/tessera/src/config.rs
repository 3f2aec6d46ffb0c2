// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application configuration.
//!
//! Configuration is assembled from three layers, later layers winning:
//!
//! 1. built-in defaults (this module),
//! 2. `config/environment/<env>.toml`,
//! 3. `config/local.toml`.
//!
//! The environment name comes from `environment` in `config/local.toml`,
//! overridden by the `TESSERA_ENV` variable, and defaults to `development`.
//!
//! # Example Configuration
//!
//! ```toml
//! version = "1.2.0"
//!
//! [server]
//! port = 8080
//! global_policies = ["language"]
//!
//! [server.views]
//! default_layout = "main"
//!
//! [i18n]
//! default_language = "fr"
//! default_locale = "fr-fr"
//!
//! [db.connections.default]
//! driver = "sqlite"
//! database = "data/app.db"
//!
//! [client]
//! analytics = false
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable selecting the configuration environment.
pub const ENV_VAR: &str = "TESSERA_ENV";

/// The production environment name.
pub const PRODUCTION: &str = "production";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Environment name (default: "development").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Application version exposed to templates as `_version`.
    #[serde(default = "default_version")]
    pub version: String,
    /// Debug flag exposed to templates as `_debug`.
    #[serde(default)]
    pub debug: bool,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Language and locale settings.
    #[serde(default)]
    pub i18n: I18nConfig,
    /// Database connections.
    #[serde(default)]
    pub db: DbConfig,
    /// Client-safe settings serialized into `_clientConfig`.
    #[serde(default)]
    pub client: toml::Table,
    /// Push channel settings.
    #[serde(default)]
    pub sockets: SocketsConfig,
    /// Identity middleware settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Query parameter defaults for API routes.
    #[serde(default)]
    pub api: ApiConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind (default: 3000). Use 0 for an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Modules root (default: "app/modules").
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,
    /// Static assets directory (default: "public").
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    /// Policy files directory (default: "app/policies").
    #[serde(default = "default_policies_dir")]
    pub policies_dir: String,
    /// Site locale files (default: "app/locales").
    #[serde(default = "default_locales_dir")]
    pub locales_dir: String,
    /// Admin locale files (default: "app/locales/admin").
    #[serde(default = "default_admin_locales_dir")]
    pub admin_locales_dir: String,
    /// Keys for signing cookies. The first key signs, any key verifies.
    #[serde(default = "default_secret_keys")]
    pub secret_keys: Vec<String>,
    /// Policies applied to every route unless the route opts out.
    #[serde(default)]
    pub global_policies: Vec<String>,
    /// Error class names that are answered but not logged.
    #[serde(default = "default_silent_errors")]
    pub silent_errors: Vec<String>,
    /// Maximum accepted request body in bytes (default: 10 MiB).
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    /// Module layout conventions.
    #[serde(default)]
    pub modules: ModulesConfig,
    /// View and layout conventions.
    #[serde(default)]
    pub views: ViewsConfig,
    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Conventional names inside a module directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Descriptor file name (default: "module.toml").
    #[serde(default = "default_descriptor_file")]
    pub descriptor_file: String,
    /// Views directory (default: "views").
    #[serde(default = "default_views_dir")]
    pub views_dir: String,
    /// View used when the conventional page is missing (default: "index").
    #[serde(default = "default_view")]
    pub default_view: String,
    /// Model configs directory (default: "models").
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
}

/// View, layout and error page conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Value of `_title` (default: "Tessera").
    #[serde(default = "default_page_title")]
    pub default_page_title: String,
    /// Template file extension without the dot (default: "html").
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Layouts directory (default: "app/templates/layouts").
    #[serde(default = "default_layouts_dir")]
    pub layouts_dir: String,
    /// Layout used when the request does not override it (default: "default").
    #[serde(default = "default_layout")]
    pub default_layout: String,
    /// Error pages directory (default: "app/templates/error").
    #[serde(default = "default_errors_dir")]
    pub errors_dir: String,
    /// Layout for every error page (default: "error").
    #[serde(default = "default_error_layout")]
    pub default_error_layout: String,
    /// Error page used when no `<status>` page exists (default: "index").
    #[serde(default = "default_error_view")]
    pub default_error_view: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Install the CORS layer.
    #[serde(default)]
    pub enabled: bool,
    /// Allowed origins. Empty allows any origin.
    #[serde(default)]
    pub origins: Vec<String>,
    /// Allow credentials.
    #[serde(default)]
    pub credentials: bool,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Store: "cookie", "sqlite" or "custom" (default: "cookie").
    #[serde(default = "default_session_store")]
    pub store: String,
    /// Cookie name (default: "tessera.sid").
    #[serde(default = "default_session_key")]
    pub key: String,
    /// Lifetime in milliseconds (default: 86400000).
    #[serde(default = "default_max_age")]
    pub max_age: u64,
    /// Set `HttpOnly` on the cookie.
    #[serde(default = "default_true")]
    pub http_only: bool,
    /// Sign the cookie.
    #[serde(default = "default_true")]
    pub signed: bool,
    /// Refresh the cookie expiry on every response.
    #[serde(default)]
    pub rolling: bool,
    /// Set `Secure` on the cookie.
    #[serde(default)]
    pub secure: bool,
    /// Connection used by the "sqlite" store (default: "default").
    #[serde(default = "default_connection")]
    pub connection: String,
}

/// Language configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I18nConfig {
    /// Site language (default: "en").
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Site locale (default: "en-gb").
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Admin language (default: "en").
    #[serde(default = "default_language")]
    pub admin_language: String,
    /// Admin locale (default: "en-gb").
    #[serde(default = "default_locale")]
    pub admin_locale: String,
    /// Supported languages mapped to their locale.
    #[serde(default = "default_languages")]
    pub languages: BTreeMap<String, String>,
}

/// Database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbConfig {
    /// Named connections.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

/// One database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Adapter name (for example "sqlite").
    pub driver: String,
    /// Adapter specific target (file path, URL, ...).
    #[serde(default)]
    pub database: String,
    /// Remaining adapter options.
    #[serde(flatten)]
    pub options: toml::Table,
}

/// Push channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketsConfig {
    /// Start the WebSocket push channel after the HTTP listener.
    #[serde(default)]
    pub enabled: bool,
    /// Port of the push channel (default: 3001).
    #[serde(default = "default_sockets_port")]
    pub port: u16,
}

/// Identity middleware configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Install the identity middleware.
    #[serde(default)]
    pub enabled: bool,
    /// Session key holding the authenticated subject (default: "user").
    #[serde(default = "default_session_user_key")]
    pub session_key: String,
}

/// API query parameter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Page size when a request carries no `limit` (default: 20).
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_modules_dir() -> String {
    "app/modules".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_policies_dir() -> String {
    "app/policies".to_string()
}

fn default_locales_dir() -> String {
    "app/locales".to_string()
}

fn default_admin_locales_dir() -> String {
    "app/locales/admin".to_string()
}

/// Development signing key. A warning is logged when it is used in production.
pub const DEVELOPMENT_SECRET: &str = "tessera-development-secret";

fn default_secret_keys() -> Vec<String> {
    vec![DEVELOPMENT_SECRET.to_string()]
}

fn default_silent_errors() -> Vec<String> {
    [
        "UnauthorizedError",
        "BadRequestError",
        "ForbiddenError",
        "ValidationError",
        "NotFoundError",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

fn default_descriptor_file() -> String {
    "module.toml".to_string()
}

fn default_views_dir() -> String {
    "views".to_string()
}

fn default_view() -> String {
    "index".to_string()
}

fn default_models_dir() -> String {
    "models".to_string()
}

fn default_page_title() -> String {
    "Tessera".to_string()
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_layouts_dir() -> String {
    "app/templates/layouts".to_string()
}

fn default_layout() -> String {
    "default".to_string()
}

fn default_errors_dir() -> String {
    "app/templates/error".to_string()
}

fn default_error_layout() -> String {
    "error".to_string()
}

fn default_error_view() -> String {
    "index".to_string()
}

fn default_session_store() -> String {
    "cookie".to_string()
}

fn default_session_key() -> String {
    "tessera.sid".to_string()
}

fn default_max_age() -> u64 {
    86_400_000
}

fn default_page_size() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_connection() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_locale() -> String {
    "en-gb".to_string()
}

fn default_languages() -> BTreeMap<String, String> {
    BTreeMap::from([(default_language(), default_locale())])
}

fn default_sockets_port() -> u16 {
    3001
}

fn default_session_user_key() -> String {
    "user".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            version: default_version(),
            debug: false,
            server: ServerConfig::default(),
            i18n: I18nConfig::default(),
            db: DbConfig::default(),
            client: toml::Table::new(),
            sockets: SocketsConfig::default(),
            auth: AuthConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            modules_dir: default_modules_dir(),
            public_dir: default_public_dir(),
            policies_dir: default_policies_dir(),
            locales_dir: default_locales_dir(),
            admin_locales_dir: default_admin_locales_dir(),
            secret_keys: default_secret_keys(),
            global_policies: Vec::new(),
            silent_errors: default_silent_errors(),
            body_limit: default_body_limit(),
            modules: ModulesConfig::default(),
            views: ViewsConfig::default(),
            cors: CorsConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            descriptor_file: default_descriptor_file(),
            views_dir: default_views_dir(),
            default_view: default_view(),
            models_dir: default_models_dir(),
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            default_page_title: default_page_title(),
            extension: default_extension(),
            layouts_dir: default_layouts_dir(),
            default_layout: default_layout(),
            errors_dir: default_errors_dir(),
            default_error_layout: default_error_layout(),
            default_error_view: default_error_view(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store: default_session_store(),
            key: default_session_key(),
            max_age: default_max_age(),
            http_only: true,
            signed: true,
            rolling: false,
            secure: false,
            connection: default_connection(),
        }
    }
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            default_locale: default_locale(),
            admin_language: default_language(),
            admin_locale: default_locale(),
            languages: default_languages(),
        }
    }
}

impl Default for SocketsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_sockets_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            session_key: default_session_user_key(),
        }
    }
}

impl Config {
    /// Loads and merges the configuration of the project at `root`.
    ///
    /// Missing files are skipped; with no files at all the defaults are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but cannot be parsed,
    /// or if the merged result does not deserialize.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_dir = root.join("config");
        let local = read_table(&config_dir.join("local.toml"))?;

        let environment = std::env::var(ENV_VAR)
            .ok()
            .filter(|env| !env.is_empty())
            .or_else(|| {
                local
                    .as_ref()
                    .and_then(|t| t.get("environment"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(default_environment);

        let env_file = config_dir
            .join("environment")
            .join(format!("{}.toml", environment));
        let layers = [read_table(&env_file)?, local];

        let mut merged = toml::Value::try_from(Config::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for layer in layers.into_iter().flatten() {
            merge(&mut merged, toml::Value::Table(layer));
        }

        let mut config: Config = merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Invalid(e.to_string()))?;
        config.environment = environment;
        debug!(environment = %config.environment, "configuration loaded");
        Ok(config)
    }

    /// Parses a single TOML document over the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let layer: toml::Table = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        let mut merged = toml::Value::try_from(Config::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        merge(&mut merged, toml::Value::Table(layer));
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Invalid(e.to_string()))
    }

    /// True when running in the production environment.
    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }

    /// True when request timing should be logged.
    pub fn logs_timing(&self) -> bool {
        self.environment == "development" || self.debug
    }

    /// The client-safe snapshot exposed to templates as `_clientConfig`.
    ///
    /// Contains the `client` table plus `env` and `server.port`.
    pub fn client_snapshot(&self) -> Map<String, JsonValue> {
        let mut snapshot = match serde_json::to_value(&self.client) {
            Ok(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };
        snapshot.insert("env".to_string(), JsonValue::from(self.environment.clone()));
        snapshot.insert(
            "server".to_string(),
            serde_json::json!({ "port": self.server.port }),
        );
        snapshot
    }
}

/// Resolves a configured directory against the project root.
pub fn resolve(root: &Path, dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn read_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let table = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), "configuration layer read");
    Ok(Some(table))
}

/// Deep-merges `layer` into `base`. Tables merge key by key, anything else
/// is replaced.
fn merge(base: &mut toml::Value, layer: toml::Value) {
    match (base, layer) {
        (toml::Value::Table(base), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
