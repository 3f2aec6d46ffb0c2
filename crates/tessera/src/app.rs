// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application assembly and startup.
//!
//! [`Tessera`] collects the code registered by the application and boots
//! it in a fixed order:
//!
//! 1. event bus and template engine
//! 2. error middleware (outermost)
//! 3. cookie signing keys
//! 4. static assets
//! 5. locale tables
//! 6. database connections
//! 7. context, CORS, body limit, custom middleware, request timing
//! 8. sessions
//! 9. identity (when `auth.enabled`)
//! 10. policies
//! 11. modules and routes, then `after_modules_setup`
//! 12. models, then `after_models_setup`
//! 13. default response
//! 14. HTTP listener
//! 15. push channel (when `sockets.enabled`)
//!
//! Every step is awaited before the next one starts. A fatal failure
//! aborts the sequence before the listener is bound.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use axum::middleware::{from_fn, from_fn_with_state, map_response};
use axum::response::Response;
use axum::Router;
use rusqlite::Connection;
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::acl::Acl;
use crate::config::{self, Config, ConnectionConfig, DEVELOPMENT_SECRET};
use crate::context;
use crate::db::{
    bind_models, AdapterFactory, Connections, DbAdapter, SqliteAdapter, ADAPTER_CONTRACT,
};
use crate::error::{verify_contract, BootError, BootResult, ConfigError};
use crate::events::{Events, SERVER_STARTED};
use crate::keys::Keys;
use crate::locale::Locales;
use crate::middleware;
use crate::module::registry::run_hooks;
use crate::module::{build_registry, Controller, Manifest, ModuleMap};
use crate::policy::{Policy, PolicyRegistry};
use crate::render::Renderer;
use crate::route::{compose_routes, dispatch, RouteTable};
use crate::session::{self, SessionManager, SessionStore, SqliteSessionStore};
use crate::sockets::{self, SocketServer};

/// Everything a request handler can reach. Built once during startup and
/// only read afterwards.
pub struct AppState {
    /// Merged configuration.
    pub config: Config,
    /// Project root all configured directories are resolved against.
    pub root: PathBuf,
    /// Loaded modules with their bound models.
    pub modules: ModuleMap,
    /// Composed routes.
    pub routes: RouteTable,
    /// Policies by name.
    pub policies: PolicyRegistry,
    /// ACL resources and predicate.
    pub acl: Acl,
    /// Site and admin translations.
    pub locales: Locales,
    /// Template engine.
    pub renderer: Renderer,
    /// Connected database adapters by connection name.
    pub connections: Connections,
    /// Event bus.
    pub events: Events,
    /// Snapshot exposed to templates as `_clientConfig`.
    pub client_config: Map<String, JsonValue>,
}

impl AppState {
    /// Bound model of a module, downcast to `T`.
    pub fn model<T: Send + Sync + 'static>(&self, module: &str, name: &str) -> Option<Arc<T>> {
        self.modules.get(module)?.model(name)
    }

    /// Service of a module, downcast to `T`.
    pub fn service<T: Send + Sync + 'static>(&self, module: &str, name: &str) -> Option<Arc<T>> {
        self.modules.get(module)?.service(name)
    }

    /// Controller of a module.
    pub fn controller(&self, module: &str, name: &str) -> Option<&Controller> {
        self.modules.get(module)?.controller(name)
    }
}

/// Startup state of a [`Tessera`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// `start` was never called.
    NotStarted = 0,
    /// The boot sequence is running.
    Starting = 1,
    /// The listener is accepting connections.
    Running = 2,
    /// The boot sequence failed.
    Failed = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::NotStarted,
            1 => Lifecycle::Starting,
            2 => Lifecycle::Running,
            _ => Lifecycle::Failed,
        }
    }
}

type CustomMiddleware = Arc<dyn Fn(Router) -> Router + Send + Sync>;
type Layering = Box<dyn FnOnce(Router, &Arc<AppState>) -> Router + Send>;

/// Middleware registered during boot, outermost first.
#[derive(Default)]
struct MiddlewareStack {
    layers: Vec<Layering>,
}

impl MiddlewareStack {
    fn push<F>(&mut self, layer: F)
    where
        F: FnOnce(Router, &Arc<AppState>) -> Router + Send + 'static,
    {
        self.layers.push(Box::new(layer));
    }

    /// Wraps `inner` so that the first registered layer is the outermost.
    fn apply(self, inner: Router, state: &Arc<AppState>) -> Router {
        self.layers
            .into_iter()
            .rev()
            .fold(inner, |router, layer| layer(router, state))
    }
}

/// Application builder and boot orchestrator.
pub struct Tessera {
    root: PathBuf,
    config: Config,
    manifest: Manifest,
    policies: BTreeMap<String, Policy>,
    session_store: Option<Arc<dyn SessionStore>>,
    drivers: BTreeMap<String, AdapterFactory>,
    custom_middleware: Option<CustomMiddleware>,
    lifecycle: AtomicU8,
}

impl Tessera {
    /// Creates an application rooted at `root` with an explicit configuration.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let mut drivers: BTreeMap<String, AdapterFactory> = BTreeMap::new();
        drivers.insert(
            "sqlite".to_string(),
            Arc::new(|| Box::new(SqliteAdapter::default()) as Box<dyn DbAdapter>),
        );

        Self {
            root: root.into(),
            config,
            manifest: Manifest::new(),
            policies: BTreeMap::new(),
            session_store: None,
            drivers,
            custom_middleware: None,
            lifecycle: AtomicU8::new(Lifecycle::NotStarted as u8),
        }
    }

    /// Creates an application with the configuration found under `root`.
    pub fn load(root: impl Into<PathBuf>) -> BootResult<Self> {
        let root = root.into();
        let config = Config::load(&root)?;
        Ok(Self::new(root, config))
    }

    /// Registers module code.
    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Registers a code policy. It replaces a policy file of the same name.
    pub fn policy(mut self, name: &str, policy: Policy) -> Self {
        self.policies.insert(name.to_string(), policy);
        self
    }

    /// Uses `store` for sessions instead of the configured backend.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Registers a database driver. `sqlite` is built in.
    pub fn db_driver<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn DbAdapter> + Send + Sync + 'static,
    {
        self.drivers.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Installs application middleware between the body limit and the
    /// request timing log.
    pub fn middleware<F>(mut self, hook: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        self.custom_middleware = Some(Arc::new(hook));
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current startup state.
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::SeqCst))
    }

    /// Runs boot steps 1 to 13 and returns the application router without
    /// binding a listener.
    pub async fn assemble(&self) -> BootResult<(Router, Arc<AppState>)> {
        let config = self.config.clone();
        let root = self.root.clone();
        let production = config.is_production();
        let mut stack = MiddlewareStack::default();

        // 1. utilities
        let events = Events::new();
        let renderer = Renderer::with_missing_reports(!production);

        // 2. error handling
        stack.push(|router, state| {
            router
                .layer(CatchPanicLayer::custom(middleware::panic_response))
                .layer(from_fn_with_state(state.clone(), middleware::error_handler))
        });

        // 3. secret keys
        let keys = Keys::new(&config.server.secret_keys)?;
        if production && config.server.secret_keys.iter().any(|k| k == DEVELOPMENT_SECRET) {
            warn!("the development secret key is used in production");
        }

        // 4. static assets
        let public_dir = config::resolve(&root, &config.server.public_dir);
        stack.push(move |router, _| {
            let assets = ServeDir::new(public_dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(router);
            Router::new().fallback_service(assets)
        });

        // 5. locales
        let locales = Locales::load(
            &config::resolve(&root, &config.server.locales_dir),
            &config::resolve(&root, &config.server.admin_locales_dir),
            !production,
        )
        .await;

        // 6. database connections
        let connections = self.connect_databases(&root).await?;

        // 7. core middleware
        stack.push(|router, state| router.layer(from_fn_with_state(state.clone(), context::init)));
        if config.server.cors.enabled {
            let cors = middleware::cors_layer(&config.server.cors);
            stack.push(move |router, _| router.layer(cors));
        }
        let body_limit = config.server.body_limit;
        stack.push(move |router, _| {
            router
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(map_response(move |response: Response| async move {
                    middleware::limit_rejection(response, body_limit)
                }))
        });
        if let Some(hook) = self.custom_middleware.clone() {
            stack.push(move |router, _| hook(router));
        }
        if config.logs_timing() {
            stack.push(|router, _| router.layer(from_fn(middleware::timing)));
        }

        // 8. sessions
        let sessions = Arc::new(self.session_manager(&config, keys, &connections)?);
        stack.push(move |router, _| router.layer(from_fn_with_state(sessions, session::middleware)));

        // 9. identity
        if config.auth.enabled {
            stack.push(|router, state| {
                router.layer(from_fn_with_state(state.clone(), middleware::identity))
            });
        }

        // 10. policies
        let policies = PolicyRegistry::load(
            &config::resolve(&root, &config.server.policies_dir),
            self.policies.clone(),
        )
        .await;

        // 11. modules and routes
        let mut acl = Acl::default();
        let mut registry = build_registry(
            &config::resolve(&root, &config.server.modules_dir),
            &config.server.modules,
            &self.manifest,
            &mut acl,
        )
        .await?;
        let routes = compose_routes(
            &registry.modules,
            &policies,
            &config.server.global_policies,
            production,
        );
        info!(
            modules = registry.modules.len(),
            routes = routes.len(),
            "routes composed"
        );
        run_hooks(
            "after_modules_setup",
            &registry.after_modules_setup,
            &registry.modules,
        );

        // 12. models
        bind_models(&mut registry.modules, &connections).await;
        run_hooks(
            "after_models_setup",
            &registry.after_models_setup,
            &registry.modules,
        );

        // 13. default response
        stack.push(|router, state| {
            router.layer(from_fn_with_state(state.clone(), middleware::default_response))
        });

        let state = Arc::new(AppState {
            client_config: config.client_snapshot(),
            config,
            root,
            modules: registry.modules,
            routes,
            policies,
            acl,
            locales,
            renderer,
            connections,
            events,
        });

        let dispatcher = Router::new().fallback(dispatch).with_state(state.clone());
        Ok((stack.apply(dispatcher, &state), state))
    }

    /// Boots the application and binds the listeners.
    ///
    /// # Errors
    ///
    /// [`BootError::AlreadyStarted`] when called more than once, otherwise
    /// the first fatal error of the boot sequence.
    pub async fn start(&self) -> BootResult<RunningApplication> {
        if self
            .lifecycle
            .compare_exchange(
                Lifecycle::NotStarted as u8,
                Lifecycle::Starting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            error!("application already started");
            return Err(BootError::AlreadyStarted);
        }

        match self.boot().await {
            Ok(running) => {
                self.lifecycle
                    .store(Lifecycle::Running as u8, Ordering::SeqCst);
                Ok(running)
            }
            Err(e) => {
                self.lifecycle.store(Lifecycle::Failed as u8, Ordering::SeqCst);
                error!(error = %e, "startup failed");
                Err(e)
            }
        }
    }

    async fn boot(&self) -> BootResult<RunningApplication> {
        let (router, state) = self.assemble().await?;
        let server = &state.config.server;

        // 14. HTTP listener
        let addr = format!("{}:{}", server.host, server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| BootError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (shutdown, mut stop) = watch::channel(false);
        let join = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = served {
                error!(error = %e, "HTTP server stopped");
            }
        });
        info!(%local_addr, environment = %state.config.environment, "server started");
        state
            .events
            .emit(SERVER_STARTED, json!({ "address": local_addr.to_string() }));

        // 15. push channel
        let sockets = if state.config.sockets.enabled {
            match sockets::start(
                &server.host,
                state.config.sockets.port,
                state.events.clone(),
                shutdown.subscribe(),
            )
            .await
            {
                Ok(sockets) => Some(sockets),
                Err(e) => {
                    let _ = shutdown.send(true);
                    let _ = join.await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(RunningApplication {
            local_addr,
            state,
            shutdown,
            join,
            sockets,
        })
    }

    async fn connect_databases(&self, root: &Path) -> BootResult<Connections> {
        let mut connections = Connections::new();

        for (name, connection) in &self.config.db.connections {
            let factory = self
                .drivers
                .get(&connection.driver)
                .ok_or_else(|| BootError::UnknownDriver {
                    connection: name.clone(),
                    driver: connection.driver.clone(),
                })?;
            let mut adapter = factory();
            verify_contract(
                &format!("Database adapter '{}'", connection.driver),
                &ADAPTER_CONTRACT,
                &adapter.provides(),
            )?;

            let resolved = resolve_database(root, connection);
            adapter
                .connect(&resolved)
                .await
                .map_err(|source| BootError::DbConnect {
                    connection: name.clone(),
                    source,
                })?;
            info!(
                connection = %name,
                to = %adapter.connected_to().unwrap_or_default(),
                "database connected"
            );
            connections.insert(name.clone(), Arc::from(adapter));
        }

        Ok(connections)
    }

    fn session_manager(
        &self,
        config: &Config,
        keys: Keys,
        connections: &Connections,
    ) -> BootResult<SessionManager> {
        let session = config.server.session.clone();

        if let Some(store) = &self.session_store {
            return SessionManager::with_store(session, keys, store.clone());
        }

        match session.store.as_str() {
            "cookie" => Ok(SessionManager::cookie(session, keys)),
            "sqlite" => {
                let conn = connections
                    .get(&session.connection)
                    .and_then(|adapter| adapter.connection())
                    .and_then(|handle| handle.downcast::<Mutex<Connection>>().ok())
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "sqlite session store needs the sqlite connection '{}'",
                            session.connection
                        ))
                    })?;
                let store = SqliteSessionStore::new(conn)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                SessionManager::with_store(session, keys, Arc::new(store))
            }
            other => Err(ConfigError::Invalid(format!(
                "session store '{}' is not available; register one with Tessera::session_store",
                other
            ))
            .into()),
        }
    }
}

/// Relative SQLite paths are resolved against the project root.
fn resolve_database(root: &Path, connection: &ConnectionConfig) -> ConnectionConfig {
    let mut resolved = connection.clone();
    if connection.driver == "sqlite"
        && !connection.database.is_empty()
        && connection.database != ":memory:"
    {
        resolved.database = config::resolve(root, &connection.database)
            .display()
            .to_string();
    }
    resolved
}

/// A started application.
pub struct RunningApplication {
    local_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    sockets: Option<SocketServer>,
}

impl RunningApplication {
    /// Address the HTTP listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address of the push channel, when enabled.
    pub fn sockets_addr(&self) -> Option<SocketAddr> {
        self.sockets.as_ref().map(|s| s.local_addr)
    }

    /// Shared application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "HTTP server task failed");
        }
        if let Some(sockets) = self.sockets {
            if let Err(e) = sockets.join.await {
                warn!(error = %e, "push channel task failed");
            }
        }
        info!("server stopped");
    }

    /// Runs until `signal` resolves, then shuts down.
    pub async fn wait_for_shutdown(self, signal: impl Future<Output = ()>) {
        signal.await;
        self.shutdown().await;
    }
}
