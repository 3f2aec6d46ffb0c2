// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Per-request context.
//!
//! A fresh [`RequestContext`] is created by [`init`] before any other
//! request middleware runs. It lives exactly as long as its request and is
//! never shared with another one. Policies and actions mutate it (language,
//! view override, flash messages) before the response composer reads it.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use serde_json::{Map, Value as JsonValue};

use crate::app::AppState;
use crate::locale::{Namespace, Translations};
use crate::middleware::panic_response;
use crate::route::Route;

/// Mutable state of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Site language.
    pub language: String,
    /// Site locale.
    pub locale: String,
    /// Site translations for `locale`.
    pub translations: Arc<Translations>,
    /// Admin language.
    pub admin_language: String,
    /// Admin locale.
    pub admin_locale: String,
    /// Admin translations for `admin_locale`.
    pub admin_translations: Arc<Translations>,
    /// Messages shown once by the next rendered page.
    pub flash_messages: Vec<JsonValue>,
    /// Route matched for this request.
    pub module_route: Option<Arc<Route>>,
    /// Name of the module owning the matched route.
    pub module: Option<String>,
    /// Per-request additions to `_clientConfig`.
    pub client_config: Map<String, JsonValue>,
    /// Render errors as JSON instead of HTML.
    pub error_response_as_json: bool,
    /// ACL resource of the matched route.
    pub acl_resource: Option<String>,
    /// Authenticated subject, set by the identity middleware.
    pub identity: Option<JsonValue>,
    /// Page override; defaults to the action name.
    pub view: Option<String>,
    /// Layout override; defaults to the configured layout.
    pub layout: Option<String>,
    /// Page data merged into the render parameters.
    pub view_data: Map<String, JsonValue>,
}

impl RequestContext {
    /// Context with the configured default languages.
    pub fn new(state: &AppState) -> Self {
        let i18n = &state.config.i18n;
        Self {
            language: i18n.default_language.clone(),
            locale: i18n.default_locale.clone(),
            translations: state.locales.table(Namespace::Site, &i18n.default_locale),
            admin_language: i18n.admin_language.clone(),
            admin_locale: i18n.admin_locale.clone(),
            admin_translations: state.locales.table(Namespace::Admin, &i18n.admin_locale),
            ..Self::default()
        }
    }

    /// Switches the site language and reloads the translations.
    pub fn set_language(&mut self, state: &AppState, language: &str, locale: &str) {
        self.language = language.to_string();
        self.locale = locale.to_string();
        self.translations = state.locales.table(Namespace::Site, locale);
    }

    /// Records the matched route and copies its options.
    pub fn enter_route(&mut self, route: Arc<Route>) {
        self.module = Some(route.module_name.clone());
        if route.options.error_response_as_json {
            self.error_response_as_json = true;
        }
        if let Some(resource) = &route.options.acl_resource {
            self.acl_resource = Some(resource.clone());
        }
        self.module_route = Some(route);
    }
}

/// Shared handle to the context of one request.
#[derive(Debug, Clone, Default)]
pub struct ContextHandle(Arc<Mutex<RequestContext>>);

impl ContextHandle {
    /// Wraps a context.
    pub fn new(context: RequestContext) -> Self {
        Self(Arc::new(Mutex::new(context)))
    }

    /// Locks the context. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, RequestContext> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with the context locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut RequestContext) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Middleware creating the request context.
///
/// The handle is stored in the request extensions for downstream code and
/// copied into the response extensions so that the error middleware, which
/// runs outside this one, can read the route flags. Panics below this layer
/// are turned into a 500 here so the handle survives them.
pub async fn init(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let handle = ContextHandle::new(RequestContext::new(&state));
    request.extensions_mut().insert(handle.clone());
    let mut response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => panic_response(panic),
    };
    response.extensions_mut().insert(handle);
    response
}
