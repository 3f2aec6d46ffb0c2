// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Request body and query string parsing.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::error::HttpError;

/// Parses the request body based on the Content-Type header.
///
/// Supports:
/// - `application/json`
/// - `application/x-www-form-urlencoded`
/// - `multipart/form-data` (text fields only)
///
/// An empty body is `Null`. Bodies larger than `limit` bytes are rejected.
pub async fn parse_body(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<JsonValue, BodyParseError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| BodyParseError::TooLarge(limit))?;

    if bytes.is_empty() {
        return Ok(JsonValue::Null);
    }

    if content_type.contains("application/json") {
        parse_json(&bytes)
    } else if content_type.contains("application/x-www-form-urlencoded") {
        Ok(parse_form_urlencoded(&bytes))
    } else if content_type.contains("multipart/form-data") {
        parse_multipart_basic(&bytes, content_type)
    } else {
        // Unknown content types are accepted as JSON when they parse
        Ok(parse_json(&bytes).unwrap_or(JsonValue::Null))
    }
}

/// Decodes a query string into a map. Later duplicates win.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .filter(|(k, _)| !k.is_empty())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Listing parameters of an API request.
///
/// Built from the `filter` (JSON object), `fields`, `limit`, `skip` and
/// `page` query parameters. `page` wins over `skip` and counts from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiParams {
    /// Decoded `filter`, an empty object when absent or invalid.
    pub filter: JsonValue,
    /// Raw `fields` selection.
    pub fields: Option<String>,
    /// Paging options.
    pub options: ApiOptions,
}

/// Paging part of [`ApiParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiOptions {
    /// Maximum number of records.
    pub limit: u64,
    /// Records to skip.
    pub skip: u64,
}

impl ApiParams {
    /// Reads the listing parameters from a decoded query string.
    pub fn from_query(query: &HashMap<String, String>, default_page_size: u64) -> Self {
        let filter = match query.get("filter") {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                warn!(filter = %raw, "ignoring invalid filter: {}", e);
                JsonValue::Object(Map::new())
            }),
            None => JsonValue::Object(Map::new()),
        };

        let number = |name: &str| query.get(name).and_then(|v| v.trim().parse::<u64>().ok());
        let limit = number("limit").unwrap_or(default_page_size);
        let mut skip = number("skip").unwrap_or(0);
        if let Some(page) = number("page") {
            skip = page.saturating_sub(1).saturating_mul(limit);
        }

        Self {
            filter,
            fields: query.get("fields").filter(|f| !f.is_empty()).cloned(),
            options: ApiOptions { limit, skip },
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<JsonValue, BodyParseError> {
    serde_json::from_slice(bytes).map_err(|e| BodyParseError::InvalidJson(e.to_string()))
}

fn parse_form_urlencoded(bytes: &[u8]) -> JsonValue {
    let form: Map<String, JsonValue> = form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), JsonValue::String(v.into_owned())))
        .collect();
    JsonValue::Object(form)
}

/// Extracts text fields; file parts are skipped.
fn parse_multipart_basic(bytes: &[u8], content_type: &str) -> Result<JsonValue, BodyParseError> {
    let boundary = content_type
        .split(';')
        .find_map(|s| s.trim().strip_prefix("boundary="))
        .ok_or_else(|| BodyParseError::InvalidMultipart("Missing boundary".to_string()))?;

    let delimiter = format!("--{}", boundary.trim_matches('"'));
    let body = String::from_utf8_lossy(bytes);
    let mut fields = Map::new();

    for part in body.split(&delimiter) {
        if part.trim().is_empty() || part.starts_with("--") {
            continue;
        }
        let Some(idx) = part.find("\r\n\r\n") else {
            continue;
        };
        let headers = &part[..idx];
        let content = part[idx + 4..].trim_end_matches("\r\n");

        if headers.contains("filename=") {
            continue;
        }
        if let Some(name) = form_field_name(headers) {
            fields.insert(name.to_string(), JsonValue::String(content.to_string()));
        }
    }

    Ok(JsonValue::Object(fields))
}

fn form_field_name(headers: &str) -> Option<&str> {
    headers
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("content-disposition:"))
        .and_then(|line| line.split(';').find_map(|s| s.trim().strip_prefix("name=")))
        .map(|name| name.trim_matches('"'))
}

/// Error types for body parsing.
#[derive(Debug, thiserror::Error)]
pub enum BodyParseError {
    /// Request body exceeds the configured limit.
    #[error("Request body too large (max {0} bytes)")]
    TooLarge(usize),

    /// JSON parsing failed.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Multipart form data parsing failed.
    #[error("Invalid multipart data: {0}")]
    InvalidMultipart(String),
}

impl From<BodyParseError> for HttpError {
    fn from(err: BodyParseError) -> Self {
        match err {
            BodyParseError::TooLarge(_) => HttpError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLargeError",
                err.to_string(),
            ),
            _ => HttpError::bad_request(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_query() {
        let params = parse_query(Some("q=rust+lang&page=2&=skip"));
        assert_eq!(params.get("q"), Some(&"rust lang".to_string()));
        assert_eq!(params.get("page"), Some(&"2".to_string()));
        assert_eq!(params.len(), 2);
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_api_params_page_sets_skip() {
        let query = parse_query(Some("limit=10&skip=3&page=3&fields=title,author"));
        let params = ApiParams::from_query(&query, 20);
        assert_eq!(params.options, ApiOptions { limit: 10, skip: 20 });
        assert_eq!(params.fields.as_deref(), Some("title,author"));

        let params = ApiParams::from_query(&parse_query(Some("page=2")), 25);
        assert_eq!(params.options, ApiOptions { limit: 25, skip: 25 });

        let params = ApiParams::from_query(&HashMap::new(), 20);
        assert_eq!(params.options, ApiOptions { limit: 20, skip: 0 });
        assert_eq!(params.filter, serde_json::json!({}));
        assert!(params.fields.is_none());
    }

    #[test]
    fn test_api_params_invalid_filter_is_skipped() {
        let query = parse_query(Some("filter=%7Bbroken&skip=5"));
        let (params, warnings) =
            crate::testing::WarnCapture::run(|| ApiParams::from_query(&query, 20));
        assert_eq!(params.filter, serde_json::json!({}));
        assert_eq!(params.options.skip, 5);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("ignoring invalid filter"));

        let query = parse_query(Some("filter=%7B%22author%22%3A%22ada%22%7D"));
        let params = ApiParams::from_query(&query, 20);
        assert_eq!(params.filter, serde_json::json!({ "author": "ada" }));
    }

    #[tokio::test]
    async fn test_parse_form_body() {
        let body = Body::from("name=John&email=john%40example.com");
        let result = parse_body(&headers("application/x-www-form-urlencoded"), body, 1024)
            .await
            .unwrap();
        assert_eq!(result["name"], "John");
        assert_eq!(result["email"], "john@example.com");
    }

    #[tokio::test]
    async fn test_parse_json_body() {
        let body = Body::from(r#"{"name": "John", "age": 30}"#);
        let result = parse_body(&headers("application/json"), body, 1024)
            .await
            .unwrap();
        assert_eq!(result["age"], 30);

        let bad = parse_body(&headers("application/json"), Body::from("{"), 1024).await;
        assert!(matches!(bad, Err(BodyParseError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_multipart_text_fields() {
        let raw = "--XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHello\r\n\
                   --XyZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\ndata\r\n\
                   --XyZ--\r\n";
        let result = parse_body(
            &headers("multipart/form-data; boundary=XyZ"),
            Body::from(raw),
            1024,
        )
        .await
        .unwrap();
        assert_eq!(result["title"], "Hello");
        assert!(result.get("file").is_none());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let err = parse_body(&headers("application/json"), Body::from("[1,2,3,4]"), 4)
            .await
            .unwrap_err();
        let http: HttpError = err.into();
        assert_eq!(http.status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
