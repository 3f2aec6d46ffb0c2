// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route composition and matching.
//!
//! All module routes are flattened into a single table:
//! - routes are sorted by `order` (stable, so declaration order breaks ties)
//! - non-wildcard routes are registered before wildcard ones
//! - each route gets its policy chain: global policies (unless disabled)
//!   followed by its own
//! - URL matching uses matchit, one matcher per method

mod chain;
mod dispatch;
mod types;

pub use chain::Next;
pub use dispatch::{dispatch, RenderPage};
pub use types::{normalize_pattern, Route, RouteOptions, SegmentType};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::Method;
use matchit::Router as MatchitRouter;
use tracing::{debug, warn};

use crate::module::ModuleMap;
use crate::policy::{Policy, PolicyRegistry};

/// A route with its resolved policy chain.
#[derive(Debug)]
struct Entry {
    route: Arc<Route>,
    policies: Arc<[Policy]>,
}

/// A matched route.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The route.
    pub route: &'a Arc<Route>,
    /// Policies to run before the action.
    pub policies: &'a Arc<[Policy]>,
    /// Path parameters.
    pub params: HashMap<String, String>,
}

/// Composed routes of every module.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<Entry>,
    matchers: HashMap<Method, MatchitRouter<usize>>,
    duplicates: Vec<String>,
}

impl RouteTable {
    /// Routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.entries.iter().map(|e| &e.route)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no route is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `METHOD:path` keys declared more than once. Empty in production,
    /// where detection is skipped.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Matches a request. A trailing slash is ignored. `HEAD` falls back to
    /// the `GET` routes.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let normalized_path = if path.is_empty() || path == "/" {
            "/"
        } else {
            path.trim_end_matches('/')
        };

        let lookup = |method: &Method| self.matchers.get(method)?.at(normalized_path).ok();
        let matched = match lookup(method) {
            Some(matched) => matched,
            None if method == Method::HEAD => lookup(&Method::GET)?,
            None => return None,
        };
        let entry = &self.entries[*matched.value];
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Some(RouteMatch {
            route: &entry.route,
            policies: &entry.policies,
            params,
        })
    }
}

/// Builds the route table from every module's routes.
pub fn compose_routes(
    modules: &ModuleMap,
    policies: &PolicyRegistry,
    global_policies: &[String],
    production: bool,
) -> RouteTable {
    let mut routes: Vec<Route> = modules
        .values()
        .flat_map(|module| {
            module.config.routes.iter().cloned().map(move |mut route| {
                route.module_name = module.name.clone();
                route.module_path = module.path.clone();
                route
            })
        })
        .collect();

    routes.sort_by_key(|route| route.order);

    let mut table = RouteTable::default();

    if !production {
        let mut seen = HashSet::new();
        for route in &routes {
            let key = route.key();
            if !seen.insert(key.clone()) {
                warn!(route = %key, module = %route.module_name, "duplicate route declaration");
                table.duplicates.push(key);
            }
        }
    }

    let (plain, wildcard): (Vec<Route>, Vec<Route>) =
        routes.into_iter().partition(|route| !route.is_wildcard());

    let mut registered = HashSet::new();
    for route in plain.into_iter().chain(wildcard) {
        let names: Vec<String> = if route.options.disable_global_policies {
            route.policies.clone()
        } else {
            global_policies
                .iter()
                .chain(route.policies.iter())
                .cloned()
                .collect()
        };
        let chain: Arc<[Policy]> = policies.resolve(&names).into();

        // The first declaration of a key keeps dispatch
        let index = table.entries.len();
        if registered.insert(route.key()) {
            let matcher = table.matchers.entry(route.method.clone()).or_default();
            if let Err(e) = matcher.insert(route.path.clone(), index) {
                warn!(route = %route.key(), "could not register route: {}", e);
            }
            debug!(route = %route.key(), module = %route.module_name, "route registered");
        } else {
            debug!(route = %route.key(), module = %route.module_name, "route shadowed by an earlier declaration");
        }

        table.entries.push(Entry {
            route: Arc::new(route),
            policies: chain,
        });
    }

    table
}
