//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and hands the connection to a
//! [`ConnectionSession`].

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::session::{ConnectionSession, Transport, TransportError};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for dashboard connections on `/ws`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Sending half of an axum WebSocket
pub struct WebSocketTransport {
    sink: SplitSink<WebSocket, Message>,
}

impl WebSocketTransport {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "Closing".into(),
        };
        // The peer may already be gone
        let _ = self.sink.send(Message::Close(Some(frame))).await;
        let _ = self.sink.close().await;
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let cancel = state.shutdown.child_token();

    let session = match ConnectionSession::open(
        Arc::clone(&state.registry),
        WebSocketTransport::new(sink),
        state.session.clone(),
        cancel.clone(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Subscription error");
            return;
        }
    };

    let subscriber_id = session.subscriber_id();
    let reader = tokio::spawn(watch_for_disconnect(stream, cancel));

    if let Err(e) = session.run().await {
        tracing::warn!(subscriber_id = %subscriber_id, error = %e, "Subscription error");
    }

    reader.abort();
}

/// Read until the client goes away, then cancel the session
///
/// Dashboards never send anything we act on; reading is how a disconnect
/// is noticed.
async fn watch_for_disconnect(mut stream: SplitStream<WebSocket>, cancel: CancellationToken) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => {
                tracing::debug!("Client requested close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket receive error");
                break;
            }
        }
    }
    cancel.cancel();
}
