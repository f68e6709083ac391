// Host metrics via sysinfo

mod linux;

use crate::error::MonitorError;
use crate::models::Sample;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{Networks, System};
use tracing::instrument;

/// Produces one [`Sample`] per call. The worker only depends on this seam.
pub trait MetricsSource: Send + Sync {
    fn read_sample(&self) -> impl Future<Output = Result<Sample, MonitorError>> + Send;
}

/// Which interfaces count towards the summed network counters.
#[derive(Debug, Clone, Default)]
pub struct InterfaceFilter {
    pub exclude_loopback: bool,
    /// Empty means all interfaces.
    pub allow: Vec<String>,
}

impl InterfaceFilter {
    pub fn includes(&self, name: &str) -> bool {
        if !self.allow.is_empty() && !self.allow.iter().any(|a| a == name) {
            return false;
        }
        !(self.exclude_loopback && linux::is_loopback(name))
    }
}

pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    networks: Arc<Mutex<Networks>>,
    filter: Arc<InterfaceFilter>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new(InterfaceFilter::default())
    }
}

impl SysinfoRepo {
    pub fn new(filter: InterfaceFilter) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            networks: Arc::new(Mutex::new(networks)),
            filter: Arc::new(filter),
        }
    }

    /// Takes the startup sample: CPU usage is measured over `window`
    /// (at least sysinfo's minimum update interval) instead of since construction.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "baseline"))]
    pub async fn baseline(&self, window: Duration) -> Result<Sample, MonitorError> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| MonitorError::metric_read(format!("sysinfo lock poisoned: {}", e)))?;
            sys.refresh_cpu_all();
            std::thread::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
            Ok::<(), MonitorError>(())
        })
        .await
        .map_err(|e| MonitorError::metric_read(format!("sysinfo task join: {}", e)))??;
        self.read_sample().await
    }
}

impl MetricsSource for SysinfoRepo {
    /// CPU usage since the previous call and network counters summed over the filtered interfaces.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "read_sample"))]
    async fn read_sample(&self) -> Result<Sample, MonitorError> {
        let sys = self.sys.clone();
        let networks = self.networks.clone();
        let filter = self.filter.clone();
        tokio::task::spawn_blocking(move || {
            let cpu_percent = {
                let mut sys = sys.lock().map_err(|e| {
                    MonitorError::metric_read(format!("sysinfo lock poisoned: {}", e))
                })?;
                sys.refresh_cpu_all();
                (sys.global_cpu_usage() as f64).clamp(0.0, 100.0)
            };
            if !cpu_percent.is_finite() {
                return Err(MonitorError::metric_read("CPU usage is not a number"));
            }

            let (bytes_received, bytes_sent) = {
                let mut networks = networks.lock().map_err(|e| {
                    MonitorError::metric_read(format!("sysinfo networks lock poisoned: {}", e))
                })?;
                networks.refresh(true);
                networks
                    .list()
                    .iter()
                    .filter(|(name, _)| filter.includes(name))
                    .fold((0u64, 0u64), |(rx, tx), (_, data)| {
                        (
                            rx.saturating_add(data.total_received()),
                            tx.saturating_add(data.total_transmitted()),
                        )
                    })
            };

            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| MonitorError::metric_read(format!("system time: {}", e)))?
                .as_secs_f64();

            Ok(Sample {
                cpu_percent,
                bytes_received,
                bytes_sent,
                timestamp,
            })
        })
        .await
        .map_err(|e| MonitorError::metric_read(format!("sysinfo task join: {}", e)))?
    }
}
