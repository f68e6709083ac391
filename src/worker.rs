// Sampling worker: one tick per check interval, publish when a trigger fires.

use crate::error::MonitorError;
use crate::models::Sample;
use crate::publisher::Publisher;
use crate::sampler::{PreviousState, TriggerPolicy};
use crate::sysinfo_repo::MetricsSource;
use std::sync::Arc;
use tokio::time::{Duration, Instant, interval, interval_at};
use tracing::Instrument;

/// Metric source, broker client, starting state and shutdown for the worker.
pub struct WorkerDeps<S, P> {
    pub source: Arc<S>,
    pub publisher: Arc<P>,
    /// Built from the baseline sample taken at startup.
    pub state: PreviousState,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing and output config.
pub struct WorkerConfig {
    pub check_interval_secs: u64,
    pub policy: TriggerPolicy,
    /// Pretty-print each published snapshot on stdout.
    pub echo_snapshots: bool,
    /// How often to log worker stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Counters returned when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ticks: u64,
    pub published: u64,
    /// Snapshots that triggered but could not be published.
    pub dropped: u64,
    /// Ticks skipped because the metric read failed.
    pub skipped: u64,
}

pub fn spawn<S, P>(
    deps: WorkerDeps<S, P>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<WorkerStats>
where
    S: MetricsSource + 'static,
    P: Publisher + 'static,
{
    let WorkerDeps {
        source,
        publisher,
        mut state,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        check_interval_secs,
        policy,
        echo_snapshots,
        stats_log_interval_secs,
    } = config;

    let period = Duration::from_secs(check_interval_secs);
    let stats_log_interval = Duration::from_secs(stats_log_interval_secs);

    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", check_interval_secs);

    let task = async move {
        // First sample one full period after the baseline.
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut stats = WorkerStats::default();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    stats.ticks += 1;
                    let sample = match source.read_sample().await {
                        Ok(s) => s,
                        Err(e) => {
                            stats.skipped += 1;
                            tracing::warn!(
                                error = %e,
                                operation = "read_sample",
                                "Metric read failed, skipping tick"
                            );
                            continue;
                        }
                    };
                    let outcome =
                        run_tick(publisher.as_ref(), &mut state, &sample, &policy, echo_snapshots).await;
                    match outcome {
                        TickOutcome::Published => stats.published += 1,
                        TickOutcome::Dropped => stats.dropped += 1,
                        TickOutcome::Idle => {}
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        ticks = stats.ticks,
                        published = stats.published,
                        dropped = stats.dropped,
                        skipped = stats.skipped,
                        "app stats"
                    );
                }
            }
        }
        stats
    };
    tokio::spawn(task.instrument(worker_span))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published,
    Dropped,
    Idle,
}

/// Evaluates one sample, publishes on trigger and updates the state.
/// A failed publish leaves the state on the last successful publish, so the next
/// snapshot spans the whole gap.
pub async fn run_tick<P: Publisher>(
    publisher: &P,
    state: &mut PreviousState,
    sample: &Sample,
    policy: &TriggerPolicy,
    echo_snapshots: bool,
) -> TickOutcome {
    let Some(decision) = state.decide(sample, policy) else {
        state.record_skip(sample, policy);
        tracing::trace!(cpu = sample.cpu_percent, "No trigger");
        return TickOutcome::Idle;
    };

    match publisher.publish(&decision.snapshot).await {
        Ok(()) => {
            state.record_publish(sample);
            tracing::debug!(
                operation = "publish",
                trigger = %decision.trigger,
                timestamp = decision.snapshot.timestamp,
                "Snapshot published"
            );
            if echo_snapshots {
                echo(&decision.snapshot);
            }
            TickOutcome::Published
        }
        Err(e) => {
            let payload = decision.snapshot.to_json().unwrap_or_default();
            log_dropped(&e, decision.trigger.as_str(), &payload);
            TickOutcome::Dropped
        }
    }
}

fn log_dropped(error: &MonitorError, trigger: &str, payload: &str) {
    tracing::warn!(
        error = %error,
        operation = "publish",
        trigger,
        payload,
        "Snapshot dropped"
    );
}

fn echo(snapshot: &crate::models::Snapshot) {
    match snapshot.to_pretty_json() {
        Ok(pretty) => println!("Sent: {}", pretty),
        Err(e) => tracing::warn!(error = %e, operation = "echo", "Snapshot not printable"),
    }
}
