//! Router, handlers and the per-connection WebSocket loop.

use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{Sink, SinkExt, StreamExt};
use termwarp_session::{BroadcastHub, ObserverId, RemoteInputQueue, TranscriptEntry};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::observer::ChannelObserver;
use crate::protocol::{InputRequest, WireEvent};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared handles for every handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub queue: Arc<RemoteInputQueue>,
    /// Cancelled when the session terminates; closes open connections.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        hub: Arc<BroadcastHub>,
        queue: Arc<RemoteInputQueue>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            queue,
            shutdown,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .route("/api/messages", get(messages_handler))
        .route("/api/input", post(input_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> io::Result<()> {
    let shutdown = state.shutdown.clone();
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Observer server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("Observer server stopped");
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn messages_handler(State(state): State<AppState>) -> Json<Vec<WireEvent>> {
    let events = state
        .hub
        .snapshot()
        .iter()
        .map(|entry| WireEvent::from(entry.as_ref()))
        .collect();
    Json(events)
}

async fn input_handler(
    State(state): State<AppState>,
    Json(request): Json<InputRequest>,
) -> Response {
    match state.queue.submit(request.input) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Remote input rejected");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_entry(
    sink: &mut SplitSink<WebSocket, Message>,
    entry: &TranscriptEntry,
) -> Result<(), axum::Error> {
    sink.send(Message::Text(WireEvent::from(entry).to_json())).await
}

/// React to one frame from the observer. Breaks when the connection is over:
/// a Close frame, end of stream, a read error, or a failed Pong.
async fn answer_frame<S>(
    sink: &mut S,
    frame: Option<Result<Message, axum::Error>>,
    id: ObserverId,
) -> ControlFlow<()>
where
    S: Sink<Message> + Unpin,
{
    match frame {
        Some(Ok(Message::Ping(data))) => {
            if sink.send(Message::Pong(data)).await.is_err() {
                tracing::debug!(observer = %id, "Pong failed");
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }
        Some(Ok(Message::Close(_))) | None => ControlFlow::Break(()),
        Some(Err(e)) => {
            tracing::debug!(observer = %id, error = %e, "WS error");
            ControlFlow::Break(())
        }
        Some(Ok(_)) => ControlFlow::Continue(()),
    }
}

/// Replay the snapshot, then forward live entries until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (observer, mut rx) = ChannelObserver::channel();
    let (id, snapshot) = state.hub.attach(Box::new(observer));
    tracing::info!(observer = %id, replay = snapshot.len(), "Observer connected");

    let mut open = true;
    for entry in &snapshot {
        if send_entry(&mut sink, entry).await.is_err() {
            open = false;
            break;
        }
    }

    while open {
        tokio::select! {
            live = rx.recv() => match live {
                Some(entry) => {
                    if send_entry(&mut sink, &entry).await.is_err() {
                        break;
                    }
                }
                // The hub dropped us.
                None => break,
            },

            frame = stream.next() => {
                if answer_frame(&mut sink, frame, id).await.is_break() {
                    break;
                }
            }

            _ = state.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.hub.detach(id);
    tracing::info!(observer = %id, "Observer disconnected");
}
