// Shared test helpers: scripted metric source and recording publisher

#![allow(dead_code)]

use energy_monitor::error::MonitorError;
use energy_monitor::models::{Sample, Snapshot};
use energy_monitor::publisher::Publisher;
use energy_monitor::sampler::TriggerPolicy;
use energy_monitor::sysinfo_repo::MetricsSource;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn sample(cpu_percent: f64, bytes_received: u64, bytes_sent: u64, timestamp: f64) -> Sample {
    Sample::new(cpu_percent, bytes_received, bytes_sent, timestamp)
}

pub fn policy() -> TriggerPolicy {
    TriggerPolicy::default()
}

/// Hands out queued samples in order; an empty queue reads as a metric failure.
#[derive(Default)]
pub struct ScriptedSource {
    queue: Mutex<VecDeque<Result<Sample, MonitorError>>>,
}

impl ScriptedSource {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            queue: Mutex::new(samples.into_iter().map(Ok).collect()),
        }
    }

    pub fn push(&self, item: Result<Sample, MonitorError>) {
        self.queue.lock().unwrap().push_back(item);
    }
}

impl MetricsSource for ScriptedSource {
    async fn read_sample(&self) -> Result<Sample, MonitorError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MonitorError::metric_read("no more samples")))
    }
}

/// Keeps every published snapshot; can be switched to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Snapshot>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn published(&self) -> Vec<Snapshot> {
        self.published.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(MonitorError::publish("broker not connected"));
        }
        self.published.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}
