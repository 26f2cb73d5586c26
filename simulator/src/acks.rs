use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Deserialize)]
pub struct Ack {
    pub topic: String,
    pub response: String,
}

/// Tally of acknowledgements received on `receive/+`
#[derive(Debug, Default)]
pub struct AckCounters {
    success: AtomicU64,
    error: AtomicU64,
    missing_imei: AtomicU64,
    unrecognized: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckSnapshot {
    pub success: u64,
    pub error: u64,
    pub missing_imei: u64,
    pub unrecognized: u64,
}

impl AckCounters {
    pub fn record(&self, payload: &[u8]) -> Option<Ack> {
        let ack = match serde_json::from_slice::<Ack>(payload) {
            Ok(ack) => ack,
            Err(_) => {
                self.unrecognized.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let counter = match ack.response.as_str() {
            "success" => &self.success,
            "error" => &self.error,
            "missing_imei" => &self.missing_imei,
            _ => &self.unrecognized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Some(ack)
    }

    pub fn snapshot(&self) -> AckSnapshot {
        AckSnapshot {
            success: self.success.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            missing_imei: self.missing_imei.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
        }
    }
}
