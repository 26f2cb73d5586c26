use crate::errors::Result;
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_messages_total",
        "Total messages received from MQTT"
    ))
    .expect("valid metric definition");
    pub static ref INBOUND_DROPPED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_inbound_dropped_total",
        "Messages dropped because the dispatch queue was full"
    ))
    .expect("valid metric definition");
    pub static ref SELF_ECHO_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_self_echo_total",
        "Own acknowledgements received back and ignored"
    ))
    .expect("valid metric definition");
    pub static ref ACKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("tracker_acks_total", "Acknowledgements published, by response"),
        &["response"]
    )
    .expect("valid metric definition");
    pub static ref ACK_PUBLISH_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_ack_publish_failures_total",
        "Acknowledgements that could not be handed to the MQTT client"
    ))
    .expect("valid metric definition");
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_db_failures_total",
        "Total database operation failures"
    ))
    .expect("valid metric definition");
    pub static ref HANDLE_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "tracker_handle_latency_seconds",
            "Time taken to handle one inbound message"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .expect("valid metric definition");
    pub static ref EVENTS_DROPPED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_events_dropped_total",
        "Telemetry events dropped because the fan-out queue was full or closed"
    ))
    .expect("valid metric definition");
    pub static ref LIVE_CLIENTS: Gauge = Gauge::with_opts(Opts::new(
        "tracker_live_clients",
        "WebSocket clients currently registered for pushes"
    ))
    .expect("valid metric definition");
    pub static ref LIVE_PUSHES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_live_pushes_total",
        "Position frames queued to live clients"
    ))
    .expect("valid metric definition");
    pub static ref LIVE_PUSH_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_live_push_failures_total",
        "Position frames that could not be queued to a live client"
    ))
    .expect("valid metric definition");
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INBOUND_DROPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SELF_ECHO_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACK_PUBLISH_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HANDLE_LATENCY_SECONDS.clone()))?;
    REGISTRY.register(Box::new(EVENTS_DROPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LIVE_CLIENTS.clone()))?;
    REGISTRY.register(Box::new(LIVE_PUSHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LIVE_PUSH_FAILURES_TOTAL.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
