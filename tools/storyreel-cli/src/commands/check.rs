//! Check external tools and configured collaborators.

use storyreel_audio::probe::command_exists;
use storyreel_common::config::AppConfig;
use storyreel_render::backend::backend_from_config;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("StoryReel System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for (tool, purpose) in [
        ("ffprobe", "voice-over duration"),
        ("ffmpeg", "silence detection and rendering"),
    ] {
        if command_exists(tool) {
            println!("[OK] {tool} ({purpose})");
        } else {
            println!("[MISSING] {tool} ({purpose})");
            ready = false;
        }
    }

    let backend = backend_from_config(&config.render);
    if backend.is_available() {
        println!("[OK] Render backend: {}", backend.name());
    } else {
        println!("[MISSING] Render backend: {}", backend.name());
        ready = false;
    }

    println!();
    if config.transcription.strategies.is_empty() {
        println!("[INFO] No transcription strategies configured; transcript alignment is skipped");
    }
    for strategy in &config.transcription.strategies {
        let status = if command_exists(&strategy.program) {
            "OK"
        } else {
            "WARN"
        };
        println!(
            "[{status}] Transcriber '{}': {} ({:?} output)",
            strategy.label, strategy.program, strategy.format
        );
    }
    println!(
        "[{}] Silence detection {}",
        if config.silence.enabled { "OK" } else { "INFO" },
        if config.silence.enabled { "enabled" } else { "disabled" }
    );

    println!();
    println!("Jobs directory: {}", config.jobs_dir.display());
    println!("Output directory: {}", config.output_dir.display());
    println!();
    if ready {
        println!("All required tools are available. StoryReel is ready.");
    } else {
        println!("Some required tools are missing. See above.");
    }
    Ok(())
}
