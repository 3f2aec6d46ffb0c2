// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Sessions.
//!
//! Two backends are supported:
//!
//! - **cookie** (default): the session data is the cookie value, signed
//!   with the application [`Keys`].
//! - **store**: the cookie holds a signed session id and the data lives in a
//!   [`SessionStore`] (the bundled [`SqliteSessionStore`] or a custom one).
//!
//! The middleware loads the session before the request reaches the
//! identity middleware and writes it back after the response is produced.

pub mod cookie;
mod sqlite;

pub use sqlite::SqliteSessionStore;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::config::SessionConfig;
use crate::error::{verify_contract, BootResult, SessionError};
use crate::keys::Keys;

/// Session payload.
pub type SessionData = Map<String, JsonValue>;

/// Members every session store must provide.
pub const STORE_CONTRACT: [&str; 3] = ["get", "set", "destroy"];

/// Session key holding queued flash messages.
const FLASH_KEY: &str = "_flash";

/// External session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Members this store implements; checked against [`STORE_CONTRACT`]
    /// at startup.
    fn provides(&self) -> Vec<&'static str> {
        STORE_CONTRACT.to_vec()
    }

    /// Loads a session. Expired or unknown ids yield `None`.
    async fn get(&self, key: &str) -> Result<Option<SessionData>, SessionError>;

    /// Saves a session for `max_age`.
    async fn set(
        &self,
        key: &str,
        value: &SessionData,
        max_age: Duration,
        rolling: bool,
    ) -> Result<(), SessionError>;

    /// Deletes a session.
    async fn destroy(&self, key: &str) -> Result<(), SessionError>;
}

type GetFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<SessionData>, SessionError>> + Send + Sync>;
type SetFn =
    Arc<dyn Fn(String, SessionData, Duration) -> BoxFuture<'static, Result<(), SessionError>> + Send + Sync>;
type DestroyFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<(), SessionError>> + Send + Sync>;

/// A store assembled from closures. Members left out are reported by
/// [`SessionStore::provides`] and fail the startup contract check.
#[derive(Default, Clone)]
pub struct FnSessionStore {
    get: Option<GetFn>,
    set: Option<SetFn>,
    destroy: Option<DestroyFn>,
}

impl FnSessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `get` member.
    pub fn on_get<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<SessionData>, SessionError>> + Send + 'static,
    {
        self.get = Some(Arc::new(move |key| -> BoxFuture<'static, _> { Box::pin(f(key)) }));
        self
    }

    /// Sets the `set` member.
    pub fn on_set<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, SessionData, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        self.set = Some(Arc::new(move |key, value, max_age| -> BoxFuture<'static, _> {
            Box::pin(f(key, value, max_age))
        }));
        self
    }

    /// Sets the `destroy` member.
    pub fn on_destroy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        self.destroy = Some(Arc::new(move |key| -> BoxFuture<'static, _> { Box::pin(f(key)) }));
        self
    }
}

#[async_trait]
impl SessionStore for FnSessionStore {
    fn provides(&self) -> Vec<&'static str> {
        let mut members = Vec::new();
        if self.get.is_some() {
            members.push("get");
        }
        if self.set.is_some() {
            members.push("set");
        }
        if self.destroy.is_some() {
            members.push("destroy");
        }
        members
    }

    async fn get(&self, key: &str) -> Result<Option<SessionData>, SessionError> {
        let f = self.get.as_ref().ok_or(SessionError::Unsupported("get"))?;
        f(key.to_string()).await
    }

    async fn set(
        &self,
        key: &str,
        value: &SessionData,
        max_age: Duration,
        _rolling: bool,
    ) -> Result<(), SessionError> {
        let f = self.set.as_ref().ok_or(SessionError::Unsupported("set"))?;
        f(key.to_string(), value.clone(), max_age).await
    }

    async fn destroy(&self, key: &str) -> Result<(), SessionError> {
        let f = self.destroy.as_ref().ok_or(SessionError::Unsupported("destroy"))?;
        f(key.to_string()).await
    }
}

/// Session state of one request.
#[derive(Debug, Default)]
pub struct Session {
    id: Option<String>,
    data: SessionData,
    changed: bool,
    destroyed: bool,
}

/// Shared handle to the session of one request.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.lock().data.get(key).cloned()
    }

    /// Stores `value` under `key`.
    pub fn insert(&self, key: &str, value: JsonValue) {
        let mut session = self.lock();
        session.data.insert(key.to_string(), value);
        session.changed = true;
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) -> Option<JsonValue> {
        let mut session = self.lock();
        let removed = session.data.remove(key);
        if removed.is_some() {
            session.changed = true;
        }
        removed
    }

    /// Queues a flash message for the next rendered page.
    pub fn push_flash(&self, message: JsonValue) {
        let mut session = self.lock();
        match session.data.get_mut(FLASH_KEY) {
            Some(JsonValue::Array(messages)) => messages.push(message),
            _ => {
                session
                    .data
                    .insert(FLASH_KEY.to_string(), JsonValue::Array(vec![message]));
            }
        }
        session.changed = true;
    }

    /// Removes and returns the queued flash messages.
    pub fn take_flash(&self) -> Vec<JsonValue> {
        let mut session = self.lock();
        match session.data.remove(FLASH_KEY) {
            Some(JsonValue::Array(messages)) => {
                session.changed = true;
                messages
            }
            Some(_) => {
                session.changed = true;
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Ends the session; the cookie is cleared and the store entry deleted.
    pub fn destroy(&self) {
        let mut session = self.lock();
        session.data.clear();
        session.destroyed = true;
    }

    /// Copy of the session payload.
    pub fn data(&self) -> SessionData {
        self.lock().data.clone()
    }
}

enum Backend {
    Cookie,
    Store(Arc<dyn SessionStore>),
}

/// Loads and saves sessions for the middleware.
pub struct SessionManager {
    config: SessionConfig,
    keys: Keys,
    backend: Backend,
}

impl SessionManager {
    /// Cookie-backed sessions.
    pub fn cookie(config: SessionConfig, keys: Keys) -> Self {
        Self {
            config,
            keys,
            backend: Backend::Cookie,
        }
    }

    /// Store-backed sessions. Fails when the store misses a contract member.
    pub fn with_store(
        config: SessionConfig,
        keys: Keys,
        store: Arc<dyn SessionStore>,
    ) -> BootResult<Self> {
        verify_contract("Session store", &STORE_CONTRACT, &store.provides())?;
        Ok(Self {
            config,
            keys,
            backend: Backend::Store(store),
        })
    }

    fn max_age(&self) -> Duration {
        Duration::from_millis(self.config.max_age)
    }

    fn read_cookie(&self, headers: &HeaderMap) -> Option<String> {
        let cookies = cookie::parse(headers);
        let value = cookies.get(&self.config.key)?;
        if self.config.signed {
            let signature = cookies.get(&cookie::signature_name(&self.config.key))?;
            let signed = format!("{}={}", self.config.key, value);
            if !self.keys.verify(&signed, signature) {
                return None;
            }
        }
        Some(value.clone())
    }

    /// Loads the session for a request.
    pub async fn load(&self, headers: &HeaderMap) -> Session {
        let Some(value) = self.read_cookie(headers) else {
            return Session::default();
        };

        match &self.backend {
            Backend::Cookie => Session {
                data: cookie::decode(&value).unwrap_or_default(),
                ..Session::default()
            },
            Backend::Store(store) => match store.get(&value).await {
                Ok(data) => Session {
                    id: Some(value),
                    data: data.unwrap_or_default(),
                    ..Session::default()
                },
                Err(e) => {
                    warn!(error = %e, "session store get failed");
                    Session::default()
                }
            },
        }
    }

    /// Writes the session back and appends the cookies to `response`.
    pub async fn commit(&self, session: Session, response: &mut Response) {
        let mut cookies = Vec::new();

        if session.destroyed {
            if let (Backend::Store(store), Some(id)) = (&self.backend, &session.id) {
                if let Err(e) = store.destroy(id).await {
                    warn!(error = %e, "session store destroy failed");
                }
            }
            cookies.extend(self.expired_cookies());
        } else if session.changed || (self.config.rolling && !session.data.is_empty()) {
            if session.data.is_empty() && matches!(self.backend, Backend::Cookie) {
                cookies.extend(self.expired_cookies());
            } else {
                let value = match &self.backend {
                    Backend::Cookie => Some(cookie::encode(&session.data)),
                    Backend::Store(store) => {
                        let id = session
                            .id
                            .clone()
                            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                        match store
                            .set(&id, &session.data, self.max_age(), self.config.rolling)
                            .await
                        {
                            Ok(()) => Some(id),
                            Err(e) => {
                                warn!(error = %e, "session store set failed");
                                None
                            }
                        }
                    }
                };
                if let Some(value) = value {
                    cookies.extend(self.session_cookies(&value));
                }
            }
        }

        for value in cookies {
            if let Ok(value) = value.parse() {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }

    fn options(&self, max_age: u64) -> cookie::CookieOptions {
        cookie::CookieOptions {
            max_age,
            http_only: self.config.http_only,
            secure: self.config.secure,
        }
    }

    fn session_cookies(&self, value: &str) -> Vec<String> {
        let options = self.options(self.max_age().as_secs());
        let mut cookies = vec![cookie::format(&self.config.key, value, &options)];
        if self.config.signed {
            let signature = self.keys.sign(&format!("{}={}", self.config.key, value));
            cookies.push(cookie::format(
                &cookie::signature_name(&self.config.key),
                &signature,
                &options,
            ));
        }
        cookies
    }

    fn expired_cookies(&self) -> Vec<String> {
        let options = self.options(0);
        let mut cookies = vec![cookie::format(&self.config.key, "", &options)];
        if self.config.signed {
            cookies.push(cookie::format(
                &cookie::signature_name(&self.config.key),
                "",
                &options,
            ));
        }
        cookies
    }
}

/// Session middleware.
pub async fn middleware(
    State(manager): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = manager.load(request.headers()).await;
    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let session = std::mem::take(&mut *handle.lock());
    manager.commit(session, &mut response).await;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager(store: Option<Arc<dyn SessionStore>>) -> SessionManager {
        let keys = Keys::new(["test-key"]).unwrap();
        match store {
            Some(store) => SessionManager::with_store(SessionConfig::default(), keys, store).unwrap(),
            None => SessionManager::cookie(SessionConfig::default(), keys),
        }
    }

    fn cookie_header(response: &Response) -> HeaderMap {
        let pairs: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::to_string)
            .collect();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pairs.join("; ")).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_cookie_session_round_trip() {
        let manager = manager(None);
        let handle = SessionHandle::new(manager.load(&HeaderMap::new()).await);
        handle.insert("user", serde_json::json!({ "id": 7 }));

        let mut response = Response::new(axum::body::Body::empty());
        let session = std::mem::take(&mut *handle.lock());
        manager.commit(session, &mut response).await;

        let loaded = manager.load(&cookie_header(&response)).await;
        assert_eq!(loaded.data["user"]["id"], 7);
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_ignored() {
        let manager = manager(None);
        let mut headers = HeaderMap::new();
        let forged = cookie::encode(&Map::from_iter([("admin".to_string(), JsonValue::Bool(true))]));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("tessera.sid={forged}; tessera.sid.sig=bad")).unwrap(),
        );
        let session = manager.load(&headers).await;
        assert!(session.data.is_empty());
    }

    #[tokio::test]
    async fn test_flash_messages_are_taken_once() {
        let handle = SessionHandle::default();
        handle.push_flash(JsonValue::from("saved"));
        handle.push_flash(JsonValue::from("again"));
        assert_eq!(handle.take_flash().len(), 2);
        assert!(handle.take_flash().is_empty());
    }

    #[test]
    fn test_store_missing_destroy_is_rejected() {
        let store = FnSessionStore::new()
            .on_get(|_key| async { Ok(None) })
            .on_set(|_key, _value, _max_age| async { Ok(()) });
        let result = SessionManager::with_store(
            SessionConfig::default(),
            Keys::new(["k"]).unwrap(),
            Arc::new(store),
        );
        match result {
            Err(crate::error::BootError::MissingContractMember { member, .. }) => {
                assert_eq!(member, "destroy")
            }
            _ => panic!("expected a contract error"),
        }
    }

    #[tokio::test]
    async fn test_store_session_round_trip() {
        let store = Arc::new(SqliteSessionStore::open_in_memory().unwrap());
        let manager = manager(Some(store));
        let handle = SessionHandle::new(manager.load(&HeaderMap::new()).await);
        handle.insert("cart", serde_json::json!([1, 2]));

        let mut response = Response::new(axum::body::Body::empty());
        let session = std::mem::take(&mut *handle.lock());
        manager.commit(session, &mut response).await;

        let loaded = manager.load(&cookie_header(&response)).await;
        assert!(loaded.id.is_some());
        assert_eq!(loaded.data["cart"], serde_json::json!([1, 2]));
    }
}
