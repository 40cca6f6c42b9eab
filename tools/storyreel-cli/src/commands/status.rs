//! Show a stored job.

use std::sync::Arc;

use storyreel_common::config::AppConfig;
use storyreel_jobs::{FileJobStore, JobQuery, JobResponse};

pub async fn run(config: &AppConfig, id: String) -> anyhow::Result<()> {
    let store = Arc::new(FileJobStore::new(&config.jobs_dir));
    let query = JobQuery::from_settings(store, &config.jobs);

    let job = query.get(&id).await?;
    let response = JobResponse::from_job(job, config.jobs.video_base_url.as_deref());
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
