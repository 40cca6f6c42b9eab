//! StoryReel CLI: turn a narration manifest into a rendered video.
//!
//! Usage:
//!   storyreel align <MANIFEST>      Print per-sentence timings
//!   storyreel timeline <MANIFEST>   Stage inputs and print the render timeline
//!   storyreel render <MANIFEST>     Run a render job to completion
//!   storyreel status <JOB_ID>       Show a stored job
//!   storyreel serve                 Serve `GET /jobs/:id`
//!   storyreel check                 Check external tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyreel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Narrated slideshow videos from a script, a voice-over and images",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/storyreel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align manifest sentences to the voice-over
    Align {
        /// Path to the request manifest (JSON)
        manifest: PathBuf,
    },

    /// Stage inputs and print the timeline that would be rendered
    Timeline {
        /// Path to the request manifest (JSON)
        manifest: PathBuf,

        /// Staging directory (defaults to <work_dir>/preview)
        #[arg(long)]
        staging: Option<PathBuf>,
    },

    /// Create a render job and wait for it to finish
    Render {
        /// Path to the request manifest (JSON)
        manifest: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Poll interval while waiting (milliseconds)
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },

    /// Show a stored job
    Status {
        /// Job identifier
        id: String,
    },

    /// Serve the job polling API
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Check external tools and configured collaborators
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    storyreel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Align { manifest } => commands::align::run(&config, manifest).await,
        Commands::Timeline { manifest, staging } => {
            commands::timeline::run(&config, manifest, staging).await
        }
        Commands::Render {
            manifest,
            output,
            poll_ms,
        } => commands::render::run(&config, manifest, output, poll_ms).await,
        Commands::Status { id } => commands::status::run(&config, id).await,
        Commands::Serve { bind } => commands::serve::run(&config, bind).await,
        Commands::Check => commands::check::run(&config),
    }
}
