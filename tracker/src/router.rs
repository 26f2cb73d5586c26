//! Topic-based dispatch of device reports and acknowledgement publishing.
//!
//! Every report a device publishes on `<family>/<imei>` is answered on
//! `receive/<imei>` with `{"topic": ..., "response": ...}`. Acknowledgements
//! carry a `response` key, so anything with that key that reaches the router
//! is our own echo and is dropped without a reply.

use crate::errors::Result;
use crate::handlers::Ingestor;
use crate::metrics::{
    ACKS_TOTAL, ACK_PUBLISH_FAILURES_TOTAL, HANDLE_LATENCY_SECONDS, SELF_ECHO_TOTAL,
};
use crate::model::{Ack, AckStatus};
use crate::payload::{classify, response_topic, Inbound, TopicKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Outbound half of the transport, as seen by the router
#[async_trait]
pub trait AckPublisher: Send + Sync {
    async fn publish_ack(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// One message taken off the broker connection
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Clone)]
pub struct MessageRouter {
    ingestor: Ingestor,
    publisher: Arc<dyn AckPublisher>,
}

impl MessageRouter {
    pub fn new(ingestor: Ingestor, publisher: Arc<dyn AckPublisher>) -> Self {
        Self {
            ingestor,
            publisher,
        }
    }

    /// Handles one message and publishes its acknowledgement. Returns the
    /// published status, or `None` when nothing was published.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> Option<AckStatus> {
        let fields = match classify(payload) {
            Inbound::SelfEcho => {
                SELF_ECHO_TOTAL.inc();
                debug!("Dropping own acknowledgement on {}", topic);
                return None;
            }
            Inbound::Anonymous => None,
            Inbound::Report(fields) => Some(fields),
        };

        let Some(kind) = TopicKind::parse(topic) else {
            warn!("Ignoring message on unexpected topic {}", topic);
            return None;
        };

        let status = match fields {
            None => {
                warn!("No imei in message on {}", topic);
                AckStatus::MissingImei
            }
            Some(fields) => {
                let start = Instant::now();
                let status = match self.ingestor.handle(kind, fields, topic).await {
                    Ok(()) => AckStatus::Success,
                    Err(e) => {
                        error!("Failed to handle message on {}: {}", topic, e);
                        AckStatus::Error
                    }
                };
                HANDLE_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
                status
            }
        };

        self.acknowledge(topic, status).await;
        Some(status)
    }

    async fn acknowledge(&self, topic: &str, status: AckStatus) {
        let ack = Ack {
            topic: topic.to_string(),
            response: status,
        };
        let payload = match serde_json::to_vec(&ack) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode acknowledgement for {}: {}", topic, e);
                return;
            }
        };

        let response_topic = response_topic(topic);
        ACKS_TOTAL.with_label_values(&[status.as_str()]).inc();

        if let Err(e) = self.publisher.publish_ack(&response_topic, payload).await {
            ACK_PUBLISH_FAILURES_TOTAL.inc();
            error!("Failed to publish acknowledgement to {}: {}", response_topic, e);
        }
    }
}

/// Routes inbound messages one at a time, in arrival order
pub async fn run_dispatcher(mut rx: mpsc::Receiver<InboundMessage>, router: MessageRouter) {
    info!("Starting dispatcher");

    while let Some(message) = rx.recv().await {
        router.route(&message.topic, &message.payload).await;
    }

    info!("Inbound channel closed, dispatcher stopped");
}
