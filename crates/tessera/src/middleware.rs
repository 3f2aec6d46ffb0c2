// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Framework middleware.
//!
//! Registration order, outermost first:
//!
//! 1. [`error_handler`] renders any response carrying a [`Failure`]
//! 2. [`panic_response`] (through `CatchPanicLayer`) turns panics into failures
//! 3. static files, falling through to the application
//! 4. [`crate::context::init`], CORS, body limit, custom middleware, [`timing`]
//! 5. sessions, [`identity`]
//! 6. [`default_response`] composes the page of a rendered route
//! 7. the route dispatcher

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any as AnyValue, CorsLayer};
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::body::BodyParseError;
use crate::config::CorsConfig;
use crate::context::ContextHandle;
use crate::error::{Failure, HttpError};
use crate::render::{compose_error_response, compose_response};
use crate::route::RenderPage;
use crate::session::SessionHandle;

/// Renders failures produced anywhere below it.
///
/// Routes flagged `error_response_as_json` answer `{error, message}`;
/// everything else gets the HTML error page. Errors whose name is listed in
/// `server.silent_errors` are answered without being logged.
pub async fn error_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    let Some(Failure(failure)) = response.extensions().get::<Failure>().cloned() else {
        return response;
    };

    if !state.config.server.silent_errors.contains(&failure.name) {
        if failure.status.is_server_error() {
            error!(%method, %uri, status = failure.status.as_u16(), "{}", failure);
        } else {
            warn!(%method, %uri, status = failure.status.as_u16(), "{}", failure);
        }
    }

    let context = response
        .extensions()
        .get::<ContextHandle>()
        .map(|handle| handle.lock().clone());

    if context.as_ref().is_some_and(|c| c.error_response_as_json) {
        return (
            failure.status,
            Json(json!({ "error": failure.name, "message": failure.message })),
        )
            .into_response();
    }

    compose_error_response(&state, &failure, context.as_ref()).await
}

/// `CatchPanicLayer` handler.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };
    HttpError::internal(message).into_response()
}

/// Gives the bare 413 of the body limit layer the framework error shape.
pub fn limit_rejection(response: Response, limit: usize) -> Response {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE
        && response.extensions().get::<Failure>().is_none()
    {
        return HttpError::from(BodyParseError::TooLarge(limit)).into_response();
    }
    response
}

/// Logs `METHOD URI - N ms` for every request.
pub async fn timing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    info!("{} {} - {} ms", method, uri, started.elapsed().as_millis());
    response
}

/// Copies the authenticated subject from the session into the context.
pub async fn identity(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<SessionHandle>();
    let context = request.extensions().get::<ContextHandle>();
    if let (Some(session), Some(context)) = (session, context) {
        if let Some(subject) = session.get(&state.config.auth.session_key) {
            context.with(|c| c.identity = Some(subject));
        }
    }
    next.run(request).await
}

/// Composes the page of routes whose action asked for a render.
///
/// Pending flash messages are drained from the session into the page.
/// A render failure becomes a 500 failure for [`error_handler`].
pub async fn default_response(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let context = request.extensions().get::<ContextHandle>().cloned();
    let session = request.extensions().get::<SessionHandle>().cloned();

    let response = next.run(request).await;
    if response.extensions().get::<RenderPage>().is_none() {
        return response;
    }
    let Some(context) = context else {
        return HttpError::internal("Request context missing").into_response();
    };

    if let Some(session) = session {
        let flash = session.take_flash();
        context.with(|c| c.flash_messages.extend(flash));
    }

    match compose_response(&state, &context).await {
        Ok(response) => response,
        Err(e) => HttpError::from(e).into_response(),
    }
}

/// CORS layer for `server.cors`. No origins means any origin.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "invalid CORS origin ignored");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
    ]);

    if config.credentials {
        // Wildcards are not allowed together with credentials
        let origin = if origins.is_empty() {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::list(origins)
        };
        layer
            .allow_origin(origin)
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        let origin = if origins.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(origins)
        };
        layer.allow_origin(origin).allow_headers(AnyValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_response_is_internal_failure() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert_eq!(failure.0.message, "boom");
        assert_eq!(failure.0.name, "Error");
    }

    #[test]
    fn test_limit_rejection_becomes_failure() {
        let bare = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let response = limit_rejection(bare, 16);
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert_eq!(failure.0.name, "PayloadTooLargeError");

        let ok = limit_rejection(StatusCode::OK.into_response(), 16);
        assert!(ok.extensions().get::<Failure>().is_none());
    }
}
