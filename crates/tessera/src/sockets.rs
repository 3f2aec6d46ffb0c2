// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! WebSocket push channel.
//!
//! Every connected client receives each [`Event`] emitted on the bus as a
//! JSON text frame `{"name": ..., "payload": ...}`.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BootError, BootResult};
use crate::events::{Event, Events};

/// A running push channel.
#[derive(Debug)]
pub struct SocketServer {
    /// Bound address.
    pub local_addr: SocketAddr,
    pub(crate) join: JoinHandle<()>,
}

/// Binds the push channel and starts serving it.
pub async fn start(
    host: &str,
    port: u16,
    events: Events,
    mut shutdown: watch::Receiver<bool>,
) -> BootResult<SocketServer> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| BootError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    let app = Router::new().route("/", get(upgrade)).with_state(events);
    let join = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = served {
            warn!(error = %e, "push channel stopped");
        }
    });

    info!(%local_addr, "push channel listening");
    Ok(SocketServer { local_addr, join })
}

async fn upgrade(ws: WebSocketUpgrade, State(events): State<Events>) -> impl IntoResponse {
    let rx = events.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}

/// Forwards bus events to one client until either side goes away.
async fn forward_events(mut socket: WebSocket, mut rx: broadcast::Receiver<Event>) {
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "push client lagged behind");
                        continue;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
