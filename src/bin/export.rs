//! Drive already-submitted jobs through export.
//!
//! Usage: `export <job-handle>...` with `EXPORT_PREFIX` naming the key prefix
//! under `S3_BUCKET`. Each job is exported to `<prefix>/<index>`.

use geoproc_client::{
    app_state::AppState,
    config::AppConfig,
    models::job::JobHandle,
    services::{export::ExportTracker, workflow::destination_for},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let handles: Vec<JobHandle> = std::env::args().skip(1).map(JobHandle::new).collect();
    if handles.is_empty() {
        return Err("usage: export <job-handle>...".into());
    }

    let config = AppConfig::from_env()?;
    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    let prefix = std::env::var("EXPORT_PREFIX").unwrap_or_else(|_| "exports".to_string());
    let state = AppState::from_config(&config)?;

    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut tracker = ExportTracker::new(state.processing.clone());
    for (index, handle) in handles.into_iter().enumerate() {
        let destination = destination_for(&config.s3_bucket, &prefix, &index.to_string());
        tracker.track(handle, destination);
    }

    tracing::info!(jobs = tracker.len(), prefix = %prefix, "Starting export loop");

    let schedule = state.schedule(config.export_poll_interval(), config.poll_timeout());
    match tracker.run(&schedule).await {
        Ok(progress) => {
            println!("{}", serde_json::to_string_pretty(&progress)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, rounds = tracker.rounds(), "Export loop failed");
            Err(e.into())
        }
    }
}
