use geoproc_client::{
    app_state::AppState,
    config::AppConfig,
    models::request::JobPlan,
    services::workflow::{self, RunSettings},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env()?;

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }
    describe_metrics();

    let raw_plan = tokio::fs::read_to_string(&config.plan_path).await?;
    let plan = JobPlan::from_json(&raw_plan)?;
    tracing::info!(
        plan = %config.plan_path.display(),
        jobs = plan.jobs.len(),
        collection = %plan.input.collection,
        "Loaded job plan"
    );

    let state = AppState::from_config(&config)?;

    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling polling");
            cancel.cancel();
        }
    });

    let settings = RunSettings {
        bucket: config.s3_bucket.clone(),
        job_poll_interval: config.job_poll_interval(),
        export_poll_interval: config.export_poll_interval(),
        poll_timeout: config.poll_timeout(),
        output_dir: config.output_dir.clone(),
    };

    match workflow::run_plan(&state, &plan, &settings).await {
        Ok(report) => {
            for job in &report.jobs {
                tracing::info!(job = %job.handle, export = %job.export, note = %job.note, "Job done");
            }
            tracing::info!(previews = report.previews.len(), "Run complete");
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            Err(e.into())
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!(
        "geoproc_jobs_submitted_total",
        "Processing jobs submitted, by kind"
    );
    metrics::describe_counter!(
        "geoproc_status_polls_total",
        "Job status queries issued"
    );
    metrics::describe_counter!(
        "geoproc_exports_requested_total",
        "Export requests issued"
    );
    metrics::describe_histogram!(
        "geoproc_job_wait_seconds",
        "Time from first poll to terminal job status"
    );
    metrics::describe_counter!(
        "geoproc_rasters_rendered_total",
        "Preview images written"
    );
}
