// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Log capture for unit tests.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Collects the messages of WARN events.
#[derive(Clone, Default)]
pub(crate) struct WarnCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl WarnCapture {
    /// Runs `f` with a subscriber installed on this thread and returns its
    /// result with the captured warnings.
    pub(crate) fn run<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let capture = WarnCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let result = tracing::subscriber::with_default(subscriber, f);
        let messages = capture.messages.lock().unwrap().clone();
        (result, messages)
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            self.messages.lock().unwrap().push(visitor.0);
        }
    }
}
