//! Channel-based dispatcher that supervises pipeline tasks.
//!
//! Job creation only sends a message; a supervisor loop receives it and
//! runs the pipeline in its own task. If that task panics or is cancelled
//! the supervisor records the job as failed, so a worker never dies
//! silently with its job stuck in an active state.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::request::RenderRequest;

use crate::pipeline::RenderPipeline;

/// Work item for the supervisor.
#[derive(Debug)]
struct Dispatch {
    job_id: String,
    request: RenderRequest,
}

/// Sending half of the dispatcher. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl JobDispatcher {
    /// Start the supervisor loop on the current runtime.
    ///
    /// The loop ends once every `JobDispatcher` clone has been dropped;
    /// jobs already running keep going.
    pub fn spawn(pipeline: Arc<RenderPipeline>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(supervise(pipeline, rx));
        (Self { tx }, handle)
    }

    /// Hand a job to the supervisor without waiting for it to run.
    pub fn dispatch(&self, job_id: impl Into<String>, request: RenderRequest) -> ReelResult<()> {
        let job_id = job_id.into();
        self.tx
            .send(Dispatch { job_id, request })
            .map_err(|e| ReelError::job(format!("dispatcher stopped; job {} not started", e.0.job_id)))
    }
}

async fn supervise(pipeline: Arc<RenderPipeline>, mut rx: mpsc::UnboundedReceiver<Dispatch>) {
    tracing::debug!("Job supervisor started");
    while let Some(Dispatch { job_id, request }) = rx.recv().await {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let worker = {
                let pipeline = Arc::clone(&pipeline);
                let job_id = job_id.clone();
                tokio::spawn(async move { pipeline.run(&job_id, &request).await })
            };

            if let Err(join_error) = worker.await {
                let message = if join_error.is_panic() {
                    format!("render task panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "render task was cancelled".to_string()
                };
                tracing::error!(job_id = %job_id, %message, "Render worker died");
                pipeline.mark_failed(&job_id, message).await;
            }
        });
    }
    tracing::debug!("Job supervisor stopped");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
