//! StoryReel Jobs
//!
//! Render job lifecycle:
//! - **store:** `JobStore` trait with in-memory and JSON-file backends
//! - **pipeline:** Staging, alignment, timeline and render stages for one job
//! - **dispatcher:** Supervisor that runs pipelines and fails jobs whose worker died
//! - **orchestrator:** Job creation and status reads with lazy staleness
//! - **api:** axum router for `GET /jobs/:id`

pub mod api;
pub mod dispatcher;
pub mod orchestrator;
pub mod pipeline;
pub mod store;

pub use api::{build_router, AppState, JobResponse};
pub use dispatcher::JobDispatcher;
pub use orchestrator::{JobQuery, RenderJobOrchestrator};
pub use pipeline::RenderPipeline;
pub use store::{FileJobStore, InMemoryJobStore, JobChange, JobStore, Updated};
