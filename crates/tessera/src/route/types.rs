// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Types for routes and path patterns.

use std::path::PathBuf;

use axum::http::Method;
use serde::Deserialize;

use crate::error::ModuleError;
use crate::handler::Action;

const METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];

/// Per-route flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RouteOptions {
    /// Render errors of this route as JSON `{error, message}`.
    #[serde(default)]
    pub error_response_as_json: bool,
    /// Resource checked by the `acl` policy.
    #[serde(default)]
    pub acl_resource: Option<String>,
    /// Skip `server.global_policies` for this route.
    #[serde(default)]
    pub disable_global_policies: bool,
}

/// One HTTP endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    /// Canonical method.
    pub method: Method,
    /// Pattern in matchit syntax (`/posts/{id}`, `/files/{*rest}`).
    pub path: String,
    /// Terminal handler.
    pub action: Action,
    /// Sort key; lower registers first.
    pub order: i32,
    /// Policy names applied before the action.
    pub policies: Vec<String>,
    /// Route flags.
    pub options: RouteOptions,
    /// Owning module; set during composition.
    pub module_name: String,
    /// Owning module directory, used to resolve views; set during composition.
    pub module_path: PathBuf,
}

impl Route {
    /// Creates a route. `method` is case-insensitive; `path` accepts
    /// `:param` and `*rest` segments as well as matchit syntax.
    pub fn new(method: &str, path: &str, action: Action) -> Result<Self, ModuleError> {
        let lower = method.to_ascii_lowercase();
        if !METHODS.contains(&lower.as_str()) {
            return Err(ModuleError::InvalidMethod(method.to_string()));
        }
        let method = Method::from_bytes(lower.to_ascii_uppercase().as_bytes())
            .map_err(|_| ModuleError::InvalidMethod(method.to_string()))?;

        Ok(Self {
            method,
            path: normalize_pattern(path)?,
            action,
            order: 0,
            policies: Vec::new(),
            options: RouteOptions::default(),
            module_name: String::new(),
            module_path: PathBuf::new(),
        })
    }

    /// Sets the sort key.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Sets the policy names.
    pub fn with_policies(mut self, policies: Vec<String>) -> Self {
        self.policies = policies;
        self
    }

    /// Sets the route flags.
    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// True when the pattern ends in a catch-all segment.
    pub fn is_wildcard(&self) -> bool {
        self.path.contains('*')
    }

    /// Duplicate detection key, `METHOD:path`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

/// Segment type in a route path
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentType {
    /// Static segment (e.g., "posts")
    Static(String),

    /// Dynamic parameter (e.g., ":id" or "{id}")
    Dynamic(String),

    /// Catch-all parameter (e.g., "*rest" or "{*rest}")
    CatchAll(String),
}

impl SegmentType {
    /// Parse a pattern segment
    pub fn parse(segment: &str) -> Self {
        if let Some(name) = segment.strip_prefix(':') {
            SegmentType::Dynamic(name.to_string())
        } else if let Some(name) = segment.strip_prefix('*') {
            let name = if name.is_empty() { "wildcard" } else { name };
            SegmentType::CatchAll(name.to_string())
        } else if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            match inner.strip_prefix('*') {
                Some(name) => SegmentType::CatchAll(name.to_string()),
                None => SegmentType::Dynamic(inner.to_string()),
            }
        } else {
            SegmentType::Static(segment.to_string())
        }
    }

    /// Convert to matchit pattern segment
    /// matchit uses {param} for dynamic segments and {*param} for catch-all
    pub fn to_pattern(&self) -> String {
        match self {
            SegmentType::Static(s) => s.clone(),
            SegmentType::Dynamic(name) => format!("{{{}}}", name),
            SegmentType::CatchAll(name) => format!("{{*{}}}", name),
        }
    }
}

/// Converts a declared path to matchit syntax.
///
/// The path must start with `/`, and a catch-all may only be the last
/// segment. A trailing slash is dropped.
pub fn normalize_pattern(path: &str) -> Result<String, ModuleError> {
    if !path.starts_with('/') {
        return Err(ModuleError::InvalidPattern(format!(
            "'{}' must start with '/'",
            path
        )));
    }

    let segments: Vec<SegmentType> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(SegmentType::parse)
        .collect();

    for (index, segment) in segments.iter().enumerate() {
        match segment {
            SegmentType::Dynamic(name) | SegmentType::CatchAll(name) if name.is_empty() => {
                return Err(ModuleError::InvalidPattern(format!(
                    "'{}' has an unnamed parameter",
                    path
                )));
            }
            SegmentType::CatchAll(_) if index + 1 != segments.len() => {
                return Err(ModuleError::InvalidPattern(format!(
                    "'{}' has a catch-all before the last segment",
                    path
                )));
            }
            _ => {}
        }
    }

    if segments.is_empty() {
        return Ok("/".to_string());
    }
    let pattern: Vec<String> = segments.iter().map(SegmentType::to_pattern).collect();
    Ok(format!("/{}", pattern.join("/")))
}
