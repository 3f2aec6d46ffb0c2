// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Cookie header parsing and formatting.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use super::SessionData;

/// Attributes written with a cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Lifetime in seconds; 0 expires the cookie.
    pub max_age: u64,
    /// Add `HttpOnly`.
    pub http_only: bool,
    /// Add `Secure`.
    pub secure: bool,
}

/// Name of the signature cookie for `name`.
pub fn signature_name(name: &str) -> String {
    format!("{}.sig", name)
}

/// All cookies of a request. Later duplicates win.
pub fn parse(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.trim_matches('"').to_string()))
            }
        })
        .collect()
}

/// `Set-Cookie` value.
pub fn format(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        name, value, options.max_age
    );
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Encodes session data as a cookie-safe string.
pub fn encode(data: &SessionData) -> String {
    let json = serde_json::to_vec(data).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decodes [`encode`] output; `None` for anything malformed.
pub fn decode(value: &str) -> Option<SessionData> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; tessera.sid=abc; broken; tessera.sid.sig=xyz"),
        );
        let cookies = parse(&headers);
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
        assert_eq!(cookies.get("tessera.sid").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("tessera.sid.sig").map(String::as_str), Some("xyz"));
        assert!(!cookies.contains_key("broken"));
    }

    #[test]
    fn test_format_attributes() {
        let cookie = format(
            "sid",
            "v",
            &CookieOptions {
                max_age: 60,
                http_only: true,
                secure: false,
            },
        );
        assert_eq!(cookie, "sid=v; Path=/; Max-Age=60; SameSite=Lax; HttpOnly");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("%%%").is_none());
        assert!(decode(&URL_SAFE_NO_PAD.encode("[1,2]")).is_none());
    }
}
