use crate::errors::Result;
use crate::live::LiveRegistry;
use crate::metrics::{LIVE_PUSHES_TOTAL, LIVE_PUSH_FAILURES_TOTAL};
use crate::model::{Position, TelemetryEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

pub const POSITIONS_EVENT: &str = "positions";

/// Wire shape of a live push: `{"event":"positions","data":{...}}`
#[derive(Debug, Serialize)]
struct PushFrame<'a> {
    event: &'static str,
    data: &'a Position,
}

pub fn encode_frame(record: &Position) -> Result<String> {
    Ok(serde_json::to_string(&PushFrame {
        event: POSITIONS_EVENT,
        data: record,
    })?)
}

pub async fn run_fanout(mut rx: mpsc::Receiver<TelemetryEvent>, registry: Arc<LiveRegistry>) {
    info!("Starting fan-out");

    while let Some(event) = rx.recv().await {
        emit(&registry, &event).await;
    }

    info!("Telemetry channel closed, fan-out stopped");
}

/// Queues the event's record to every client watching its owner. Returns the
/// number of clients that accepted the frame.
pub async fn emit(registry: &LiveRegistry, event: &TelemetryEvent) -> usize {
    let clients = registry.clients_for(&event.owner_id).await;
    if clients.is_empty() {
        debug!("No live clients for owner {}, dropping position", event.owner_id);
        return 0;
    }

    let frame = match encode_frame(&event.record) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to encode position {}: {}", event.record.id, e);
            return 0;
        }
    };

    let mut delivered = 0;
    for client in clients {
        match client.sender.try_send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                LIVE_PUSHES_TOTAL.inc();
                debug!(
                    "Position emitted for {} on connection {}",
                    event.owner_id, client.connection_id
                );
            }
            Err(TrySendError::Full(_)) => {
                LIVE_PUSH_FAILURES_TOTAL.inc();
                warn!(
                    "Live client {} is not keeping up, skipping position",
                    client.connection_id
                );
            }
            Err(TrySendError::Closed(_)) => {
                LIVE_PUSH_FAILURES_TOTAL.inc();
                warn!("Live client {} is gone, skipping position", client.connection_id);
            }
        }
    }

    delivered
}
