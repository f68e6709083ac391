// Host measurement taken once per tick

/// One reading of the host: instantaneous CPU load plus cumulative network counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    /// Cumulative, non-decreasing under normal operation.
    pub bytes_received: u64,
    /// Cumulative, non-decreasing under normal operation.
    pub bytes_sent: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Sample {
    pub fn new(cpu_percent: f64, bytes_received: u64, bytes_sent: u64, timestamp: f64) -> Self {
        Self {
            cpu_percent,
            bytes_received,
            bytes_sent,
            timestamp,
        }
    }
}
