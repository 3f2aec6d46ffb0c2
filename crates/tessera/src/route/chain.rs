// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::handler::{Action, Ctx, HandlerResult};
use crate::policy::Policy;

/// Remainder of a route's policy chain, ending in its action.
///
/// A policy either returns without calling [`Next::run`] (short circuit)
/// or hands the request on.
#[derive(Debug, Clone)]
pub struct Next {
    chain: Arc<[Policy]>,
    index: usize,
    action: Action,
}

impl Next {
    /// Chain starting at the first policy.
    pub fn new(chain: Arc<[Policy]>, action: Action) -> Self {
        Self {
            chain,
            index: 0,
            action,
        }
    }

    /// Runs the next policy, or the action once the chain is exhausted.
    pub fn run(self, ctx: Ctx) -> BoxFuture<'static, HandlerResult> {
        match self.chain.get(self.index).cloned() {
            Some(policy) => {
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                policy.call(ctx, next)
            }
            None => self.action.call(ctx),
        }
    }
}
