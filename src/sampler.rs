// Publish decision: compares each sample with the reference state and decides whether to send.
// Pure logic; the worker owns the clock, the metric source and the broker client.

use crate::models::{Sample, Snapshot};
use serde::Deserialize;
use std::fmt;

/// Which sample later deltas are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaReference {
    /// Reference moves only when a snapshot is published.
    #[default]
    LastPublish,
    /// Reference moves on every tick; the time trigger still counts from the last publish.
    LastSample,
}

/// Thresholds for the dual (time or change) send policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerPolicy {
    pub max_interval_secs: f64,
    pub cpu_threshold: f64,
    pub net_threshold_bytes: u64,
    pub delta_reference: DeltaReference,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            max_interval_secs: 60.0,
            cpu_threshold: 5.0,
            net_threshold_bytes: 1024 * 100,
            delta_reference: DeltaReference::LastPublish,
        }
    }
}

/// The condition that fired. When several hold, the first in declaration order is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    MaxInterval,
    CpuChange,
    RecvChange,
    SentChange,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::MaxInterval => "max_interval",
            Trigger::CpuChange => "cpu_change",
            Trigger::RecvChange => "recv_change",
            Trigger::SentChange => "sent_change",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything derived from one sample against the reference state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Seconds since the last publish.
    pub interval: f64,
    /// Seconds since the reference sample; equals `interval` under `LastPublish`.
    pub window: f64,
    pub recv_diff: u64,
    pub sent_diff: u64,
    /// KB/s, unrounded.
    pub recv_rate: f64,
    /// KB/s, unrounded.
    pub sent_rate: f64,
    pub cpu_diff: f64,
    pub trigger: Option<Trigger>,
}

/// A fired trigger together with the payload to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub trigger: Trigger,
    pub snapshot: Snapshot,
}

/// Reference sample plus the time of the last publish. One instance per process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousState {
    pub cpu_percent: f64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub sample_timestamp: f64,
    pub last_publish_time: f64,
}

impl PreviousState {
    /// Seeds the state from the startup sample; the startup time counts as the last publish.
    pub fn baseline(sample: &Sample) -> Self {
        Self {
            cpu_percent: sample.cpu_percent,
            bytes_received: sample.bytes_received,
            bytes_sent: sample.bytes_sent,
            sample_timestamp: sample.timestamp,
            last_publish_time: sample.timestamp,
        }
    }

    pub fn evaluate(&self, sample: &Sample, policy: &TriggerPolicy) -> Evaluation {
        let interval = sample.timestamp - self.last_publish_time;
        let window = sample.timestamp - self.sample_timestamp;

        // Counter resets clamp to zero instead of wrapping.
        let recv_diff = sample.bytes_received.saturating_sub(self.bytes_received);
        let sent_diff = sample.bytes_sent.saturating_sub(self.bytes_sent);
        let (recv_rate, sent_rate) = if window > 0.0 {
            (
                recv_diff as f64 / window / 1024.0,
                sent_diff as f64 / window / 1024.0,
            )
        } else {
            (0.0, 0.0)
        };
        let cpu_diff = (sample.cpu_percent - self.cpu_percent).abs();

        let trigger = if interval >= policy.max_interval_secs {
            Some(Trigger::MaxInterval)
        } else if cpu_diff > policy.cpu_threshold {
            Some(Trigger::CpuChange)
        } else if recv_diff > policy.net_threshold_bytes {
            Some(Trigger::RecvChange)
        } else if sent_diff > policy.net_threshold_bytes {
            Some(Trigger::SentChange)
        } else {
            None
        };

        Evaluation {
            interval,
            window,
            recv_diff,
            sent_diff,
            recv_rate,
            sent_rate,
            cpu_diff,
            trigger,
        }
    }

    /// Evaluates and returns the decision without touching the state.
    pub fn decide(&self, sample: &Sample, policy: &TriggerPolicy) -> Option<Decision> {
        let eval = self.evaluate(sample, policy);
        eval.trigger.map(|trigger| Decision {
            trigger,
            snapshot: Snapshot::from_sample(sample, eval.recv_rate, eval.sent_rate),
        })
    }

    /// Records a successful publish of `sample`.
    pub fn record_publish(&mut self, sample: &Sample) {
        self.move_reference(sample);
        self.last_publish_time = sample.timestamp;
    }

    /// Records a tick that did not trigger.
    pub fn record_skip(&mut self, sample: &Sample, policy: &TriggerPolicy) {
        if policy.delta_reference == DeltaReference::LastSample {
            self.move_reference(sample);
        }
    }

    /// Evaluates `sample` and applies the state update, assuming the publish succeeds.
    pub fn tick(&mut self, sample: &Sample, policy: &TriggerPolicy) -> Option<Decision> {
        let decision = self.decide(sample, policy);
        if decision.is_some() {
            self.record_publish(sample);
        } else {
            self.record_skip(sample, policy);
        }
        decision
    }

    fn move_reference(&mut self, sample: &Sample) {
        self.cpu_percent = sample.cpu_percent;
        self.bytes_received = sample.bytes_received;
        self.bytes_sent = sample.bytes_sent;
        self.sample_timestamp = sample.timestamp;
    }
}
