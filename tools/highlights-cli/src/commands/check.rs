//! Check system capabilities.

use highlights_common::config::RendererConfig;
use highlights_render_engine::runner::command_exists;

pub fn run(config: &RendererConfig) -> anyhow::Result<()> {
    println!("Highlights System Check");
    println!("{}", "=".repeat(50));

    let renderer_ok = command_exists(&config.ffmpeg_path);
    if renderer_ok {
        println!("[OK] Renderer: {}", config.ffmpeg_path);
    } else {
        println!("[MISSING] Renderer: {} (required)", config.ffmpeg_path);
    }

    if command_exists(&config.ffprobe_path) {
        println!("[OK] Prober: {}", config.ffprobe_path);
    } else {
        println!(
            "[WARN] Prober: {} not found, background music layout will not be checked",
            config.ffprobe_path
        );
    }

    println!();
    if renderer_ok {
        println!("All required tools are available. Highlights is ready.");
        Ok(())
    } else {
        anyhow::bail!("{} is required to render", config.ffmpeg_path)
    }
}
