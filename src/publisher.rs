// MQTT publishing. The event loop runs in its own task and reconnects with backoff;
// publishes are fire-and-forget and fail fast while the broker is unreachable.

use crate::backoff::Backoff;
use crate::config::BrokerConfig;
use crate::error::MonitorError;
use crate::models::Snapshot;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::instrument;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends snapshots somewhere. The worker only depends on this seam.
pub trait Publisher: Send + Sync {
    fn publish(&self, snapshot: &Snapshot) -> impl Future<Output = Result<(), MonitorError>> + Send;
}

/// MQTT QoS level as written in the config (0, 1 or 2). Out-of-range values fail at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub struct QosLevel(u8);

impl QosLevel {
    pub fn level(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level <= 2 {
            Ok(Self(level))
        } else {
            Err(format!("broker.qos must be 0, 1 or 2, got {}", level))
        }
    }
}

impl From<QosLevel> for QoS {
    fn from(level: QosLevel) -> Self {
        match level.0 {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }
}

/// Connection flag shared with the publisher plus the reconnect backoff, driven by event-loop
/// outcomes.
#[derive(Debug)]
pub struct LinkState {
    connected: Arc<AtomicBool>,
    backoff: Backoff,
}

/// What a failed event-loop poll means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkFailure {
    /// The link was up until this error, as opposed to another failed reconnect.
    pub lost: bool,
    pub retry_in: Duration,
}

impl LinkState {
    /// Starts in the connected state, right after the first ConnAck.
    pub fn connected(mut backoff: Backoff) -> Self {
        backoff.reset();
        Self {
            connected: Arc::new(AtomicBool::new(true)),
            backoff,
        }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn on_connack(&mut self) {
        self.connected.store(true, Ordering::Relaxed);
        self.backoff.reset();
    }

    pub fn on_error(&mut self) -> LinkFailure {
        let lost = self.connected.swap(false, Ordering::Relaxed);
        LinkFailure {
            lost,
            retry_in: self.backoff.next_delay(),
        }
    }

    pub fn on_disconnect(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    retain: bool,
    connected: Arc<AtomicBool>,
    driver: JoinHandle<()>,
}

impl MqttPublisher {
    /// Connects to the broker, retrying up to `connect_attempts` times with backoff,
    /// then hands the event loop to a background task.
    #[instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn connect(config: &BrokerConfig) -> Result<Self, MonitorError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let mut backoff = Backoff::new(config.reconnect_initial_ms, config.reconnect_max_ms);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match wait_for_connack(&mut eventloop).await {
                Ok(()) => break,
                Err(e) if attempt >= config.connect_attempts => {
                    return Err(MonitorError::connection(format!(
                        "{}:{} unreachable after {} attempts: {}",
                        config.host, config.port, attempt, e
                    )));
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        operation = "connect",
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        "Broker connection failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        tracing::info!(
            host = %config.host,
            port = config.port,
            topic = %config.topic,
            "Connected to broker"
        );

        let link = LinkState::connected(backoff);
        let connected = link.flag();
        let driver = spawn_event_loop(eventloop, link);

        Ok(Self {
            client,
            topic: config.topic.clone(),
            qos: config.qos.into(),
            retain: config.retain,
            connected,
            driver,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Sends DISCONNECT and waits briefly for the event loop task to finish.
    pub async fn disconnect(self) {
        let Self {
            client, mut driver, ..
        } = self;
        if let Err(e) = client.try_disconnect() {
            tracing::debug!(error = %e, operation = "disconnect", "disconnect request failed");
        }
        if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut driver)
            .await
            .is_err()
        {
            driver.abort();
        }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        if !self.is_connected() {
            return Err(MonitorError::publish("broker not connected"));
        }
        let payload = snapshot
            .to_json()
            .map_err(|e| MonitorError::publish(format!("serialize snapshot: {}", e)))?;
        self.client
            .try_publish(self.topic.as_str(), self.qos, self.retain, payload)
            .map_err(|e| MonitorError::publish(e.to_string()))
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), rumqttc::ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

/// Drives the MQTT event loop. Errors flip the link down and are retried forever with backoff;
/// the next ConnAck brings it back up. Ends once our own DISCONNECT has gone out.
fn spawn_event_loop(mut eventloop: EventLoop, mut link: LinkState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    link.on_connack();
                    tracing::info!(operation = "reconnect", "Reconnected to broker");
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    link.on_disconnect();
                    tracing::debug!("MQTT event loop shutting down");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    let failure = link.on_error();
                    if failure.lost {
                        tracing::warn!(
                            error = %e,
                            operation = "event_loop",
                            retry_in_ms = failure.retry_in.as_millis() as u64,
                            "Broker connection lost"
                        );
                    } else {
                        tracing::debug!(
                            error = %e,
                            operation = "reconnect",
                            retry_in_ms = failure.retry_in.as_millis() as u64,
                            "Reconnect attempt failed"
                        );
                    }
                    tokio::time::sleep(failure.retry_in).await;
                }
            }
        }
    })
}
