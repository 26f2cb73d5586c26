use crate::config::Config;
use crate::errors::{Error, Result};
use crate::metrics::{INBOUND_DROPPED_TOTAL, MESSAGES_TOTAL};
use crate::payload::TopicKind;
use crate::router::{AckPublisher, InboundMessage};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Requests the client may queue before `publish`/`subscribe` start waiting
const CLIENT_CAPACITY: usize = 10000;

pub fn connect(config: &Config) -> (AsyncClient, EventLoop) {
    let client_id = format!("{}-{}", config.mqtt_client_id_prefix, uuid::Uuid::new_v4());
    info!(
        "Connecting to MQTT broker at {}:{} as {}",
        config.mqtt_broker, config.mqtt_port, client_id
    );

    let mut mqtt_options = MqttOptions::new(client_id, &config.mqtt_broker, config.mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    AsyncClient::new(mqtt_options, CLIENT_CAPACITY)
}

/// Subscribes to every report family with QoS 0
pub async fn subscribe_all(client: &AsyncClient) -> Result<()> {
    for kind in TopicKind::ALL {
        client
            .subscribe(kind.filter(), QoS::AtMostOnce)
            .await
            .map_err(Error::Mqtt)?;
        info!("Subscribed to {} with QoS 0", kind.filter());
    }
    Ok(())
}

/// Renews the subscriptions from a separate task. Only `EventLoop::poll`
/// drains the request queue, so the polling task must never wait on it.
pub fn resubscribe(client: &AsyncClient) -> JoinHandle<()> {
    let client = client.clone();
    tokio::spawn(async move {
        if let Err(e) = subscribe_all(&client).await {
            error!("Failed to subscribe: {}", e);
        }
    })
}

/// Drives the connection and hands every publish to the dispatcher. The
/// session is clean, so subscriptions are renewed on every CONNACK.
pub async fn run_mqtt(
    mut eventloop: EventLoop,
    client: AsyncClient,
    tx: mpsc::Sender<InboundMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connection acknowledged");
                resubscribe(&client);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                MESSAGES_TOTAL.inc();
                debug!(
                    "Received message on topic {}, size: {} bytes",
                    publish.topic,
                    publish.payload.len()
                );

                if !forward(&tx, publish) {
                    error!("Dispatcher is gone, stopping MQTT loop");
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Queues a publish for dispatch. A full queue drops the message; returns
/// false only when the dispatcher has shut down.
fn forward(tx: &mpsc::Sender<InboundMessage>, publish: Publish) -> bool {
    let message = InboundMessage {
        topic: publish.topic,
        payload: publish.payload.to_vec(),
    };

    match tx.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(message)) => {
            INBOUND_DROPPED_TOTAL.inc();
            warn!("Dispatch queue full, dropping message on {}", message.topic);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[async_trait]
impl AckPublisher for AsyncClient {
    async fn publish_ack(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(Error::Mqtt)
    }
}
