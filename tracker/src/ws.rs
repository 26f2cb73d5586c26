use crate::live::LiveRegistry;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Clone)]
struct LiveState {
    registry: Arc<LiveRegistry>,
    buffer: usize,
}

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    #[serde(rename = "ownerId", alias = "userId")]
    owner_id: Option<String>,
}

pub fn create_router(registry: Arc<LiveRegistry>, buffer: usize) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(LiveState { registry, buffer })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<LiveState>,
    Query(query): Query<LiveQuery>,
) -> Response {
    ws.on_upgrade(move |socket| serve_client(socket, state, query.owner_id))
}

async fn serve_client(socket: WebSocket, state: LiveState, owner_id: Option<String>) {
    let (outgoing, incoming) = socket.split();
    serve_live(
        incoming,
        outgoing,
        &state.registry,
        state.buffer,
        owner_id.as_deref(),
    )
    .await;
}

/// Forwards queued frames to `outgoing` until either side goes away.
/// Connections without an owner stay open but never get frames.
pub async fn serve_live<I, O, E>(
    mut incoming: I,
    mut outgoing: O,
    registry: &LiveRegistry,
    buffer: usize,
    owner_id: Option<&str>,
) where
    I: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    O: Sink<Message> + Unpin,
    O::Error: Display,
{
    let (tx, mut rx) = mpsc::channel(buffer);
    let connection_id = registry.register(owner_id, tx).await;
    info!(
        "Live client connected (registered: {}, live clients: {})",
        connection_id.is_some(),
        registry.len().await
    );

    loop {
        tokio::select! {
            frame = rx.recv(), if connection_id.is_some() => match frame {
                Some(text) => {
                    if let Err(e) = outgoing.send(Message::Text(text)).await {
                        debug!("Failed to write to live client: {}", e);
                        break;
                    }
                }
                None => break,
            },
            received = incoming.next() => match received {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(text))) => {
                    debug!("Ignoring message from live client: {}", text);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Live client socket error: {}", e);
                    break;
                }
            },
        }
    }

    if let Some(connection_id) = connection_id {
        registry.unregister(connection_id).await;
    }
    info!(
        "Live client disconnected (live clients: {})",
        registry.len().await
    );
}
