use crate::publisher::QosLevel;
use crate::sampler::{DeltaReference, TriggerPolicy};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// MQTT QoS level: 0, 1 or 2.
    pub qos: QosLevel,
    pub retain: bool,
    /// Attempts to reach the broker at startup before giving up.
    pub connect_attempts: u32,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            topic: "shellies/status/sut".into(),
            client_id: default_client_id(),
            keep_alive_secs: 60,
            qos: QosLevel::default(),
            retain: false,
            connect_attempts: 5,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
        }
    }
}

fn default_client_id() -> String {
    format!("{}-{}", crate::version::NAME, std::process::id())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between two samples.
    pub check_interval_secs: u64,
    /// Publish at least this often (seconds), even without any change.
    pub max_interval_secs: u64,
    /// CPU change in percentage points that forces a publish (strictly greater).
    pub cpu_threshold: f64,
    /// Byte delta on either counter that forces a publish (strictly greater).
    pub net_threshold_bytes: u64,
    pub delta_reference: DeltaReference,
    /// CPU measurement window for the baseline sample taken at startup.
    pub baseline_window_ms: u64,
    /// Pretty-print every published snapshot on stdout.
    pub echo_snapshots: bool,
    pub exclude_loopback: bool,
    /// When non-empty, only these interfaces are summed into the network counters.
    pub interfaces: Vec<String>,
    /// How often to log app stats (ticks, published, dropped) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            max_interval_secs: 60,
            cpu_threshold: 5.0,
            net_threshold_bytes: 1024 * 100,
            delta_reference: DeltaReference::default(),
            baseline_window_ms: 1000,
            echo_snapshots: true,
            exclude_loopback: false,
            interfaces: Vec::new(),
            stats_log_interval_secs: 300,
        }
    }
}

impl MonitoringConfig {
    pub fn trigger_policy(&self) -> TriggerPolicy {
        TriggerPolicy {
            max_interval_secs: self.max_interval_secs as f64,
            cpu_threshold: self.cpu_threshold,
            net_threshold_bytes: self.net_threshold_bytes,
            delta_reference: self.delta_reference,
        }
    }
}

impl AppConfig {
    /// Loads `$CONFIG_FILE`, or `config.toml` when unset.
    /// A missing default file falls back to built-in defaults; a missing explicit file is an error.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(&path),
            Err(_) => match std::fs::read_to_string(DEFAULT_CONFIG_PATH) {
                Ok(s) => Self::load_from_str(&s),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(
                        path = DEFAULT_CONFIG_PATH,
                        "No config file found, using defaults"
                    );
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
                Err(e) => Err(anyhow::anyhow!("read {}: {}", DEFAULT_CONFIG_PATH, e)),
            },
        }
    }

    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("read {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.broker.host.is_empty(),
            "broker.host must be non-empty"
        );
        anyhow::ensure!(
            self.broker.port > 0,
            "broker.port must be between 1 and 65535, got {}",
            self.broker.port
        );
        anyhow::ensure!(
            !self.broker.topic.is_empty(),
            "broker.topic must be non-empty"
        );
        anyhow::ensure!(
            !self.broker.topic.contains(['#', '+']),
            "broker.topic must not contain wildcards, got {}",
            self.broker.topic
        );
        anyhow::ensure!(
            !self.broker.client_id.is_empty(),
            "broker.client_id must be non-empty"
        );
        anyhow::ensure!(
            self.broker.keep_alive_secs >= 5,
            "broker.keep_alive_secs must be >= 5, got {}",
            self.broker.keep_alive_secs
        );
        anyhow::ensure!(
            self.broker.connect_attempts > 0,
            "broker.connect_attempts must be > 0, got {}",
            self.broker.connect_attempts
        );
        anyhow::ensure!(
            self.broker.reconnect_initial_ms > 0,
            "broker.reconnect_initial_ms must be > 0, got {}",
            self.broker.reconnect_initial_ms
        );
        anyhow::ensure!(
            self.broker.reconnect_max_ms >= self.broker.reconnect_initial_ms,
            "broker.reconnect_max_ms must be >= reconnect_initial_ms, got {}",
            self.broker.reconnect_max_ms
        );
        anyhow::ensure!(
            self.monitoring.check_interval_secs > 0,
            "monitoring.check_interval_secs must be > 0, got {}",
            self.monitoring.check_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.max_interval_secs > 0,
            "monitoring.max_interval_secs must be > 0, got {}",
            self.monitoring.max_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.cpu_threshold.is_finite() && self.monitoring.cpu_threshold >= 0.0,
            "monitoring.cpu_threshold must be a finite value >= 0, got {}",
            self.monitoring.cpu_threshold
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
