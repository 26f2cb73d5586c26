mod acks;
mod reports;

use acks::AckCounters;
use clap::Parser;
use reports::SimulatedDevice;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simulator", about = "Publishes simulated tracker reports over MQTT")]
struct Args {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    port: u16,

    /// Number of simulated trackers
    #[arg(long, env = "DEVICES", default_value_t = 10)]
    devices: u64,

    /// IMEI of the first tracker, the rest count up from it
    #[arg(long, env = "IMEI_BASE", default_value_t = 356_938_035_643_800)]
    imei_base: u64,

    #[arg(long, env = "INTERVAL_MS", default_value_t = 1000)]
    interval_ms: u64,

    /// Status and acceleration reports go out every this many ticks
    #[arg(long, env = "STATUS_EVERY", default_value_t = 10)]
    status_every: u64,

    #[arg(long, env = "START_LATITUDE", default_value_t = 41.3851, allow_negative_numbers = true)]
    latitude: f64,

    #[arg(long, env = "START_LONGITUDE", default_value_t = 2.1734, allow_negative_numbers = true)]
    longitude: f64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting tracker simulator");
    info!(
        "Broker: {}:{}, devices: {}, interval: {}ms",
        args.broker, args.port, args.devices, args.interval_ms
    );

    let client_id = format!("sim-{}", uuid::Uuid::new_v4());
    let mut mqtt_options = MqttOptions::new(&client_id, &args.broker, args.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 20000);
    let counters = Arc::new(AckCounters::default());

    let subscriber = client.clone();
    let ack_counters = counters.clone();
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    if let Err(e) = subscriber.subscribe("receive/+", QoS::AtMostOnce).await {
                        error!("Failed to subscribe to acknowledgements: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(ack) = ack_counters.record(&publish.payload) {
                        debug!("{} -> {} ({})", ack.topic, ack.response, publish.topic);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT eventloop error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    info!("Connected to MQTT broker, starting to publish reports");

    let mut devices: Vec<SimulatedDevice> = (0..args.devices)
        .map(|i| {
            SimulatedDevice::new(
                (args.imei_base + i).to_string(),
                args.latitude,
                args.longitude,
            )
        })
        .collect();

    let mut rng = rand::thread_rng();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let status_every = args.status_every.max(1);
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }

        for device in devices.iter_mut() {
            let coordinates = device.step(&mut rng);
            publish(&client, device.coordinates_topic(), &coordinates).await;

            if tick % status_every == 0 {
                let status = device.status(&mut rng);
                publish(&client, device.status_topic(), &status).await;

                let acceleration = device.acceleration(&mut rng);
                publish(&client, device.acceleration_topic(), &acceleration).await;
            }
        }

        tick += 1;
        if tick % status_every == 0 {
            let acks = counters.snapshot();
            info!(
                "Tick {}: success={} error={} missing_imei={} unrecognized={}",
                tick, acks.success, acks.error, acks.missing_imei, acks.unrecognized
            );
        }
    }

    if let Err(e) = client.disconnect().await {
        warn!("Failed to disconnect: {}", e);
    }
}

async fn publish<T: Serialize>(client: &AsyncClient, topic: String, report: &T) {
    let payload = match serde_json::to_vec(report) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize report for {}: {}", topic, e);
            return;
        }
    };

    if let Err(e) = client.publish(&topic, QoS::AtMostOnce, false, payload).await {
        warn!("Failed to publish to {}: {}", topic, e);
    }
}
