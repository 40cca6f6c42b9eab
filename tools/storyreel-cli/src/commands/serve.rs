//! Serve the job polling API over the file store.

use std::sync::Arc;

use storyreel_common::config::AppConfig;
use storyreel_jobs::api::serve;
use storyreel_jobs::{AppState, FileJobStore, JobQuery};

pub async fn run(config: &AppConfig, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.jobs.bind.clone());
    let store = Arc::new(FileJobStore::new(&config.jobs_dir));
    let state = AppState::new(
        JobQuery::from_settings(store, &config.jobs),
        config.jobs.video_base_url.clone(),
    );

    println!("Serving jobs from {} on {bind}", config.jobs_dir.display());
    serve(state, &bind).await?;
    Ok(())
}
