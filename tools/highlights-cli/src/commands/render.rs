//! Render a project to video.

use std::path::PathBuf;

use highlights_common::config::RendererConfig;
use highlights_render_engine::render_project;

use super::load_project;

pub async fn run(
    path: PathBuf,
    dir: Option<PathBuf>,
    config: RendererConfig,
) -> anyhow::Result<()> {
    println!("Rendering project at: {}", path.display());

    let loaded = load_project(&path)?;
    let working_dir = dir.unwrap_or_else(|| loaded.root.clone());

    let missing = loaded.validate_sources_in(&working_dir);
    for issue in &missing {
        tracing::warn!(issue = %issue, "Project source check");
    }

    println!("  Output: {}", loaded.project.output.file.display());
    println!("  Segments: {}", loaded.project.segments().len());
    println!("  Working directory: {}", working_dir.display());

    let mut task = tokio::task::spawn_blocking(move || {
        render_project(&loaded, &config, &working_dir)
    });

    // The renderer shares our terminal and receives the same interrupt;
    // keep waiting so the temporary files are still removed.
    let result = tokio::select! {
        joined = &mut task => joined?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, waiting for the renderer to stop");
            println!("\nInterrupted, cleaning up...");
            task.await?
        }
    };

    let report = result?;
    for failure in &report.cleanup_failures {
        println!("  [WARN] cleanup: {failure}");
    }
    println!(
        "\nRender complete: {} ({:.1}s)",
        report.output_file.display(),
        report.elapsed_secs
    );
    Ok(())
}
