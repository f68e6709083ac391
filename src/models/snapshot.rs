// Wire payload published to the broker

use serde::{Deserialize, Serialize};

use super::Sample;

/// Rounds to one decimal place. Works on the exact binary value and sends exact halves to the
/// even digit, so 12.35 (stored as 12.3499...) gives 12.3 and 2.25 gives 2.2.
pub fn round1(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// CPU usage in percent, one decimal.
    pub cpu: f64,
    pub net: NetSnapshot,
    /// Whole seconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetSnapshot {
    /// Receive rate in KB/s, one decimal.
    pub recv: f64,
    /// Send rate in KB/s, one decimal.
    pub sent: f64,
    pub total: NetTotals,
}

/// Raw cumulative byte counters at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetTotals {
    pub recv: u64,
    pub sent: u64,
}

impl Snapshot {
    /// Builds the payload from a sample and unrounded KB/s rates.
    pub fn from_sample(sample: &Sample, recv_kbps: f64, sent_kbps: f64) -> Self {
        Self {
            cpu: round1(sample.cpu_percent),
            net: NetSnapshot {
                recv: round1(recv_kbps),
                sent: round1(sent_kbps),
                total: NetTotals {
                    recv: sample.bytes_received,
                    sent: sample.bytes_sent,
                },
            },
            timestamp: sample.timestamp.max(0.0).trunc() as u64,
        }
    }

    /// Compact JSON, as published.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Indented JSON for the console echo.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
