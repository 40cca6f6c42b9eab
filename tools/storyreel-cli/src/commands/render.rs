//! Run a render job in-process and wait for it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use storyreel_common::config::AppConfig;
use storyreel_jobs::{FileJobStore, JobResponse, RenderJobOrchestrator, RenderPipeline};
use storyreel_model::job::JobStatus;

use super::load_request;

pub async fn run(
    config: &AppConfig,
    manifest: PathBuf,
    output: Option<PathBuf>,
    poll_ms: u64,
) -> anyhow::Result<()> {
    let mut request = load_request(&manifest)?;
    if output.is_some() {
        request.output_path = output;
    }

    let store = Arc::new(FileJobStore::new(&config.jobs_dir));
    let pipeline = Arc::new(RenderPipeline::from_config(config, store));
    let backend = pipeline.backend().name().to_string();
    if !pipeline.backend().is_available() {
        anyhow::bail!("Render backend '{backend}' is not available; run `storyreel check`");
    }
    let orchestrator = RenderJobOrchestrator::new(pipeline, &config.jobs);

    let id = orchestrator.create_job(request).await?;
    println!("Job {id} queued (backend: {backend})");

    let mut last = JobStatus::Queued;
    let job = loop {
        tokio::time::sleep(Duration::from_millis(poll_ms.max(10))).await;
        let job = orchestrator.get_job(&id).await?;
        if job.status != last {
            println!("  {last} -> {}", job.status);
            last = job.status;
        }
        if job.status.is_terminal() {
            break job;
        }
    };

    let response = JobResponse::from_job(job, config.jobs.video_base_url.as_deref());
    match response.status {
        JobStatus::Completed => {
            println!(
                "Render complete: {}",
                response.video_url.as_deref().unwrap_or_default()
            );
            Ok(())
        }
        _ => Err(anyhow::anyhow!(
            "Render failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        )),
    }
}
