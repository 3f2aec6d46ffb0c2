// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Actions and the request handle they receive.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;

use crate::app::AppState;
use crate::body::ApiParams;
use crate::context::ContextHandle;
use crate::error::HttpError;
use crate::session::SessionHandle;

/// Result of an action or policy.
pub type HandlerResult = Result<Reply, HttpError>;

type BoxHandler = Arc<dyn Fn(Ctx) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// What an action produced.
#[derive(Debug)]
pub enum Reply {
    /// Render the route's page inside its layout.
    Render,
    /// Send this response as is.
    Response(Response),
}

impl Reply {
    /// JSON response with status 200.
    pub fn json(value: JsonValue) -> Self {
        Reply::Response(Json(value).into_response())
    }

    /// 302 redirect.
    pub fn redirect(location: &str) -> Self {
        Reply::Response((StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response())
    }

    /// Any other response.
    pub fn response(response: impl IntoResponse) -> Self {
        Reply::Response(response.into_response())
    }
}

/// A named request handler.
///
/// The name doubles as the conventional page name: an action named `list`
/// renders `views/list.<ext>` of its module.
#[derive(Clone)]
pub struct Action {
    name: String,
    handler: BoxHandler,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action").field("name", &self.name).finish()
    }
}

impl Action {
    /// Wraps an async function.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |ctx| -> BoxFuture<'static, HandlerResult> { Box::pin(f(ctx)) }),
        }
    }

    /// An action that only renders its page.
    pub fn render_only(name: impl Into<String>) -> Self {
        Self::new(name, |_ctx| async { Ok(Reply::Render) })
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page name derived from the action name, without any `bound ` prefix.
    pub fn view_name(&self) -> &str {
        self.name.strip_prefix("bound ").unwrap_or(&self.name)
    }

    /// Invokes the handler.
    pub fn call(&self, ctx: Ctx) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(ctx)
    }
}

/// Request handle passed to policies and actions.
pub struct Ctx {
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Path parameters.
    pub params: HashMap<String, String>,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Parsed body (JSON, form or multipart text fields), `Null` when empty.
    pub body: JsonValue,
    /// Per-request context.
    pub context: ContextHandle,
    /// Session, when the session middleware is installed.
    pub session: Option<SessionHandle>,
    /// Application state.
    pub app: Arc<AppState>,
}

impl Ctx {
    /// Path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Listing parameters (`filter`, `fields`, `limit`, `skip`, `page`) of
    /// an API request, paged by `api.default_page_size` by default.
    pub fn api_params(&self) -> ApiParams {
        ApiParams::from_query(&self.query, self.app.config.api.default_page_size)
    }

    /// Renders the route page with `data` merged into the view data.
    pub fn render(&self, data: JsonValue) -> Reply {
        if let JsonValue::Object(map) = data {
            self.context.with(|ctx| ctx.view_data.extend(map));
        }
        Reply::Render
    }

    /// Renders a specific page of the module.
    pub fn render_view(&self, view: &str, data: JsonValue) -> Reply {
        self.context.with(|ctx| ctx.view = Some(view.to_string()));
        self.render(data)
    }

    /// Overrides the layout for this request.
    pub fn set_layout(&self, layout: &str) {
        self.context.with(|ctx| ctx.layout = Some(layout.to_string()));
    }

    /// Queues a flash message. It survives a redirect when a session exists.
    pub fn flash(&self, message: impl Into<JsonValue>) {
        let message = message.into();
        match &self.session {
            Some(session) => session.push_flash(message),
            None => self.context.with(|ctx| ctx.flash_messages.push(message)),
        }
    }

    /// Authenticated subject, if any.
    pub fn identity(&self) -> Option<JsonValue> {
        self.context.lock().identity.clone()
    }

    /// Stores `identity` in the session and the context.
    pub fn login(&self, identity: JsonValue) {
        if let Some(session) = &self.session {
            session.insert(&self.app.config.auth.session_key, identity.clone());
        }
        self.context.with(|ctx| ctx.identity = Some(identity));
    }

    /// Clears the authenticated subject.
    pub fn logout(&self) {
        if let Some(session) = &self.session {
            session.remove(&self.app.config.auth.session_key);
        }
        self.context.with(|ctx| ctx.identity = None);
    }

    /// Bound model of a module, downcast to its concrete type.
    pub fn model<T: Send + Sync + 'static>(&self, module: &str, name: &str) -> Option<Arc<T>> {
        self.app.model(module, name)
    }

    /// Service of a module, downcast to its concrete type.
    pub fn service<T: Send + Sync + 'static>(&self, module: &str, name: &str) -> Option<Arc<T>> {
        self.app.service(module, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_name_strips_bound_prefix() {
        let action = Action::render_only("bound list");
        assert_eq!(action.name(), "bound list");
        assert_eq!(action.view_name(), "list");
        assert_eq!(Action::render_only("show").view_name(), "show");
    }

    #[test]
    fn test_redirect_reply() {
        match Reply::redirect("/login") {
            Reply::Response(response) => {
                assert_eq!(response.status(), StatusCode::FOUND);
                assert_eq!(response.headers()[header::LOCATION], "/login");
            }
            Reply::Render => panic!("expected a response"),
        }
    }
}
