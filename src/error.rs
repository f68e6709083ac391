// Runtime error taxonomy for the sampling loop and broker client.

/// Errors raised while sampling the host or talking to the broker.
///
/// Each variant maps to one recovery rule in the worker: a failed metric read skips the tick,
/// a failed publish drops the snapshot, and a connection failure goes through reconnect backoff
/// (or aborts startup once the initial attempts are used up).
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Broker connection could not be established or was lost
    #[error("connection error: {0}")]
    Connection(String),

    /// Snapshot could not be handed to the broker client
    #[error("publish error: {0}")]
    Publish(String),

    /// Host metrics could not be read
    #[error("metric read error: {0}")]
    MetricRead(String),
}

impl MonitorError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn metric_read(msg: impl Into<String>) -> Self {
        Self::MetricRead(msg.into())
    }
}
