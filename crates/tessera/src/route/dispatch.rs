// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::Next;
use crate::app::AppState;
use crate::body;
use crate::context::{ContextHandle, RequestContext};
use crate::error::HttpError;
use crate::handler::{Ctx, Reply};
use crate::session::SessionHandle;

/// Response extension asking the default-response middleware to compose
/// the matched route's page.
#[derive(Debug, Clone, Copy)]
pub struct RenderPage;

/// Fallback handler matching the request against the route table and
/// running the route's policy chain and action.
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let Some(matched) = state.routes.match_route(&parts.method, parts.uri.path()) else {
        return HttpError::not_found(format!("No route for {} {}", parts.method, parts.uri.path()))
            .into_response();
    };
    let route = matched.route.clone();
    let next = Next::new(matched.policies.clone(), route.action.clone());
    let params = matched.params;

    let context = parts
        .extensions
        .get::<ContextHandle>()
        .cloned()
        .unwrap_or_else(|| ContextHandle::new(RequestContext::new(&state)));
    context.with(|c| c.enter_route(route));

    let body = match body::parse_body(&parts.headers, body, state.config.server.body_limit).await {
        Ok(body) => body,
        Err(e) => return HttpError::from(e).into_response(),
    };

    let ctx = Ctx {
        query: body::parse_query(parts.uri.query()),
        session: parts.extensions.get::<SessionHandle>().cloned(),
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        params,
        body,
        context,
        app: state.clone(),
    };

    match next.run(ctx).await {
        Ok(Reply::Render) => {
            let mut response = StatusCode::OK.into_response();
            response.extensions_mut().insert(RenderPage);
            response
        }
        Ok(Reply::Response(response)) => response,
        Err(e) => e.into_response(),
    }
}
