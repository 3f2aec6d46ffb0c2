// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Composition of page and error responses.
//!
//! A page is rendered in two passes: the module view first, then the
//! layout with the page output available as `{{{_body}}}`.

use std::path::{Path, PathBuf};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::app::AppState;
use crate::config::resolve;
use crate::context::{ContextHandle, RequestContext};
use crate::error::{HttpError, RenderError};
use crate::fs;

fn template_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, extension))
}

/// `_version`, `_env`, `_debug`, `_title` and `_clientConfig`.
fn baseline(state: &AppState) -> Map<String, JsonValue> {
    let config = &state.config;
    let mut params = Map::new();
    params.insert("_version".into(), config.version.clone().into());
    params.insert("_env".into(), config.environment.clone().into());
    params.insert("_debug".into(), config.debug.into());
    params.insert(
        "_title".into(),
        config.server.views.default_page_title.clone().into(),
    );
    params.insert(
        "_clientConfig".into(),
        JsonValue::Object(state.client_config.clone()).to_string().into(),
    );
    params
}

fn language_params(params: &mut Map<String, JsonValue>, context: &RequestContext) {
    let to_json = |value| serde_json::to_value(value).unwrap_or(JsonValue::Null);
    params.insert("language".into(), context.language.clone().into());
    params.insert("locale".into(), context.locale.clone().into());
    params.insert("translations".into(), to_json(&*context.translations));
    params.insert("adminLanguage".into(), context.admin_language.clone().into());
    params.insert("adminLocale".into(), context.admin_locale.clone().into());
    params.insert(
        "adminTranslations".into(),
        to_json(&*context.admin_translations),
    );
}

/// Builds the page response for the route matched by `context`.
///
/// # Errors
///
/// [`RenderError::ViewNotFound`] when neither the page nor the module's
/// default view can be read, [`RenderError::LayoutNotFound`] when the
/// layout cannot be read, [`RenderError::Template`] when rendering fails.
pub async fn compose_response(
    state: &AppState,
    context: &ContextHandle,
) -> Result<Response, RenderError> {
    let context = context.lock().clone();
    let route = context.module_route.clone().ok_or(RenderError::NoRoute)?;

    let server = &state.config.server;
    let extension = &server.views.extension;
    let views_dir = route.module_path.join(&server.modules.views_dir);

    let view = context
        .view
        .clone()
        .unwrap_or_else(|| route.action.view_name().to_string());
    let mut page_path = template_path(&views_dir, &view, extension);
    if !fs::exists(&page_path).await {
        debug!(view = %page_path.display(), "page missing, using the default view");
        page_path = template_path(&views_dir, &server.modules.default_view, extension);
    }
    let page = fs::read_to_string(&page_path)
        .await
        .map_err(|_| RenderError::ViewNotFound(page_path.display().to_string()))?;

    let layout_name = context
        .layout
        .clone()
        .unwrap_or_else(|| server.views.default_layout.clone());
    let layout_path = template_path(
        &resolve(&state.root, &server.views.layouts_dir),
        &layout_name,
        extension,
    );
    let layout = fs::read_to_string(&layout_path)
        .await
        .map_err(|_| RenderError::LayoutNotFound(layout_path.display().to_string()))?;

    let mut params = baseline(state);
    language_params(&mut params, &context);
    params.insert(
        "flashMessages".into(),
        JsonValue::Array(context.flash_messages.clone()),
    );
    params.extend(context.view_data.clone());

    let mut client_config = state.client_config.clone();
    client_config.extend(context.client_config.clone());
    params.insert(
        "_clientConfig".into(),
        JsonValue::Object(client_config).to_string().into(),
    );

    let mut data = JsonValue::Object(params);
    let body = state.renderer.render(&page, &data)?;
    if let JsonValue::Object(params) = &mut data {
        params.insert("_body".into(), body.into());
    }
    let html = state.renderer.render(&layout, &data)?;

    let mut response = Html(html).into_response();
    if let Ok(locale) = HeaderValue::from_str(&context.locale) {
        response.headers_mut().insert(header::CONTENT_LANGUAGE, locale);
    }
    Ok(response)
}

/// Builds the HTML page for `error`.
///
/// Uses `<errors_dir>/<status>.<ext>` when present, otherwise the default
/// error view, always inside the default error layout. Any failure to read
/// or render falls back to a plain 500 carrying the error message.
pub async fn compose_error_response(
    state: &AppState,
    error: &HttpError,
    context: Option<&RequestContext>,
) -> Response {
    match render_error_page(state, error, context).await {
        Ok(html) => (error.status, Html(html)).into_response(),
        Err(e) => {
            debug!(error = %e, "error page unavailable");
            (StatusCode::INTERNAL_SERVER_ERROR, error.message.clone()).into_response()
        }
    }
}

async fn render_error_page(
    state: &AppState,
    error: &HttpError,
    context: Option<&RequestContext>,
) -> Result<String, RenderError> {
    let views = &state.config.server.views;
    let errors_dir = resolve(&state.root, &views.errors_dir);

    let mut page_path = template_path(&errors_dir, error.status.as_str(), &views.extension);
    if !fs::exists(&page_path).await {
        page_path = template_path(&errors_dir, &views.default_error_view, &views.extension);
    }
    let page = fs::read_to_string(&page_path)
        .await
        .map_err(|_| RenderError::ViewNotFound(page_path.display().to_string()))?;

    let layout_path = template_path(
        &resolve(&state.root, &views.layouts_dir),
        &views.default_error_layout,
        &views.extension,
    );
    let layout = fs::read_to_string(&layout_path)
        .await
        .map_err(|_| RenderError::LayoutNotFound(layout_path.display().to_string()))?;

    let mut params = baseline(state);
    if let Some(context) = context {
        language_params(&mut params, context);
    }
    params.insert("error".into(), error.message.clone().into());
    params.insert("errorName".into(), error.name.clone().into());
    params.insert("status".into(), error.status.as_u16().into());

    let mut data = JsonValue::Object(params);
    let body = state.renderer.render(&page, &data)?;
    if let JsonValue::Object(params) = &mut data {
        params.insert("_body".into(), body.into());
    }
    state.renderer.render(&layout, &data)
}
