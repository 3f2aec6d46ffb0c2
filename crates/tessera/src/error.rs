// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types shared across the framework.
//!
//! Startup failures are [`BootError`]s and abort the boot sequence. Failures
//! scoped to one module, locale file or policy file are [`ModuleError`]s and
//! friends; the orchestrator logs and skips them. Request-time failures are
//! [`HttpError`]s, which travel as a response extension to the outermost
//! error middleware.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Fatal startup errors. Any of these aborts [`crate::Tessera::start`].
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// `start()` was called more than once.
    #[error("Application already started")]
    AlreadyStarted,

    /// Two modules declared the same ACL resource.
    #[error("Duplicate ACL resource '{resource}' declared by module '{module}' (already declared by '{owner}')")]
    DuplicateAclResource {
        /// The resource identifier.
        resource: String,
        /// Module that declared it second.
        module: String,
        /// Module that declared it first.
        owner: String,
    },

    /// An adapter or store does not provide a required contract member.
    #[error("{component} is missing required member '{member}'")]
    MissingContractMember {
        /// Description of the component checked.
        component: String,
        /// First missing member.
        member: &'static str,
    },

    /// No adapter is registered for a configured driver.
    #[error("Unknown database driver '{driver}' for connection '{connection}'")]
    UnknownDriver {
        /// Connection name from the configuration.
        connection: String,
        /// Driver name that could not be resolved.
        driver: String,
    },

    /// A database connection could not be established.
    #[error("Database connection '{connection}' failed: {source}")]
    DbConnect {
        /// Connection name from the configuration.
        connection: String,
        /// Underlying adapter error.
        #[source]
        source: DbError,
    },

    /// The HTTP or socket listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem I/O error during startup.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration file could not be parsed.
    #[error("Invalid TOML in {path}: {message}")]
    Parse {
        /// File that failed to parse.
        path: String,
        /// Parser message.
        message: String,
    },

    /// The merged configuration does not match the expected shape.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading a single module. Logged, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// Two entries in one module map to the same short name.
    #[error("Name collision in {kind}: '{first}' and '{second}' both map to '{short}'")]
    NameCollision {
        /// Component kind (controllers, models, ...).
        kind: &'static str,
        /// Short name both entries map to.
        short: String,
        /// First registered name.
        first: String,
        /// Second registered name.
        second: String,
    },

    /// The module descriptor could not be parsed.
    #[error("Invalid descriptor {path}: {message}")]
    Descriptor {
        /// Descriptor path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A model config could not be parsed.
    #[error("Invalid model config {path}: {message}")]
    ModelConfig {
        /// Model config path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A route references an action that is not registered.
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    /// A route declares an unsupported HTTP method.
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// A route declares an invalid path pattern.
    #[error("Invalid route pattern: {0}")]
    InvalidPattern(String),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading one locale file. Logged, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum LocaleError {
    /// The file is not a flat JSON object of strings.
    #[error("Invalid locale file {path}: {message}")]
    Parse {
        /// Offending file.
        path: String,
        /// Parser message.
        message: String,
    },

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while composing a page or error response.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Neither the conventional page nor the module default view exists.
    #[error("View not found: {0}")]
    ViewNotFound(String),

    /// The layout file could not be read.
    #[error("Layout not found: {0}")]
    LayoutNotFound(String),

    /// No route was matched for the request being rendered.
    #[error("No route matched for rendering")]
    NoRoute,

    /// The template engine rejected the template or its data.
    #[error("Template error: {0}")]
    Template(String),
}

/// Database adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The adapter has not been connected yet.
    #[error("Not connected")]
    NotConnected,

    /// A model config has no schema.
    #[error("Model '{0}' has no schema")]
    MissingSchema(String),

    /// A table or column name is not a plain identifier.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Backend storage error.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Storage(err.to_string())
    }
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Backend storage error.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Stored session data could not be (de)serialized.
    #[error("Session serialization error: {0}")]
    Serialization(String),

    /// The store does not implement the requested operation.
    #[error("Session store does not implement '{0}'")]
    Unsupported(&'static str),
}

/// A request-time error carrying an HTTP status and a class name.
///
/// The name plays the role of an error class (`NotFoundError`,
/// `ForbiddenError`, ...) and is matched against `server.silent_errors` to
/// decide whether the failure is logged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{name}: {message}")]
pub struct HttpError {
    /// Response status.
    pub status: StatusCode,
    /// Error class name.
    pub name: String,
    /// Human readable message.
    pub message: String,
}

impl HttpError {
    /// Creates an error with an explicit status and class name.
    pub fn new(status: StatusCode, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            name: name.into(),
            message: message.into(),
        }
    }

    /// 400 `BadRequestError`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequestError", message)
    }

    /// 401 `UnauthorizedError`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UnauthorizedError", message)
    }

    /// 403 `ForbiddenError`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "ForbiddenError", message)
    }

    /// 404 `NotFoundError`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFoundError", message)
    }

    /// 422 `ValidationError`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "ValidationError", message)
    }

    /// 504 `TimeoutError`.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "TimeoutError", message)
    }

    /// 500 with the generic `Error` class.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Error", message)
    }
}

impl From<RenderError> for HttpError {
    fn from(err: RenderError) -> Self {
        HttpError::internal(err.to_string())
    }
}

/// Response extension marking a response as a failure still to be rendered
/// by the error middleware.
#[derive(Debug, Clone)]
pub struct Failure(pub Arc<HttpError>);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.message.clone()).into_response();
        response.extensions_mut().insert(Failure(Arc::new(self)));
        response
    }
}

/// Result type for startup operations.
pub type BootResult<T> = Result<T, BootError>;

/// Checks that `provided` covers every member in `required`.
///
/// Returns the first missing member as a [`BootError::MissingContractMember`].
pub fn verify_contract(
    component: &str,
    required: &[&'static str],
    provided: &[&'static str],
) -> BootResult<()> {
    match required.iter().find(|member| !provided.contains(member)) {
        Some(member) => Err(BootError::MissingContractMember {
            component: component.to_string(),
            member,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_constructors() {
        let err = HttpError::not_found("no such post");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.name, "NotFoundError");
        assert_eq!(err.to_string(), "NotFoundError: no such post");

        assert_eq!(HttpError::validation("x").status.as_u16(), 422);
        assert_eq!(HttpError::internal("x").name, "Error");
    }

    #[test]
    fn test_http_error_response_carries_failure() {
        let response = HttpError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert_eq!(failure.0.name, "ForbiddenError");
    }

    #[test]
    fn test_verify_contract_names_first_missing_member() {
        let err = verify_contract("session store", &["get", "set", "destroy"], &["get", "set"])
            .unwrap_err();
        match err {
            BootError::MissingContractMember { component, member } => {
                assert_eq!(component, "session store");
                assert_eq!(member, "destroy");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(verify_contract("x", &["get"], &["get", "set"]).is_ok());
    }
}
