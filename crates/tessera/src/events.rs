// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Process-wide event bus.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::trace;

/// Emitted once the HTTP listener accepts connections.
pub const SERVER_STARTED: &str = "server-started";

const CHANNEL_CAPACITY: usize = 64;

/// A named event with a JSON payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Event payload.
    pub payload: JsonValue,
}

/// Broadcast bus. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct Events {
    tx: broadcast::Sender<Event>,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    /// Creates an empty bus.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emits an event. Having no subscribers is not an error.
    pub fn emit(&self, name: &str, payload: JsonValue) {
        let receivers = self
            .tx
            .send(Event {
                name: name.to_string(),
                payload,
            })
            .unwrap_or(0);
        trace!(event = name, receivers, "event emitted");
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
