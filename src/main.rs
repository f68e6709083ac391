use anyhow::Result;
use energy_monitor::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        name = version::NAME,
        version = version::VERSION,
        topic = %app_config.broker.topic,
        check_interval_secs = app_config.monitoring.check_interval_secs,
        max_interval_secs = app_config.monitoring.max_interval_secs,
        "Starting"
    );

    let publisher = Arc::new(publisher::MqttPublisher::connect(&app_config.broker).await?);

    let sysinfo_repo = Arc::new(sysinfo_repo::SysinfoRepo::new(
        sysinfo_repo::InterfaceFilter {
            exclude_loopback: app_config.monitoring.exclude_loopback,
            allow: app_config.monitoring.interfaces.clone(),
        },
    ));
    let baseline = sysinfo_repo
        .baseline(Duration::from_millis(app_config.monitoring.baseline_window_ms))
        .await
        .map_err(|e| anyhow::anyhow!("baseline sample: {}", e))?;
    tracing::info!(
        cpu = baseline.cpu_percent,
        bytes_received = baseline.bytes_received,
        bytes_sent = baseline.bytes_sent,
        "Baseline sample taken"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            source: sysinfo_repo,
            publisher: publisher.clone(),
            state: sampler::PreviousState::baseline(&baseline),
            shutdown_rx,
        },
        worker::WorkerConfig {
            check_interval_secs: app_config.monitoring.check_interval_secs,
            policy: app_config.monitoring.trigger_policy(),
            echo_snapshots: app_config.monitoring.echo_snapshots,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    match worker_handle.await {
        Ok(stats) => tracing::info!(
            ticks = stats.ticks,
            published = stats.published,
            dropped = stats.dropped,
            skipped = stats.skipped,
            "Worker stopped"
        ),
        Err(e) => tracing::warn!(error = %e, "worker task failed"),
    }

    match Arc::try_unwrap(publisher) {
        Ok(publisher) => publisher.disconnect().await,
        Err(_) => tracing::debug!("publisher still shared, skipping disconnect"),
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
