//! Validate a Highlights project document.

use std::path::PathBuf;

use super::load_project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let loaded = load_project(&path)?;
    let project = &loaded.project;

    println!(
        "  Output: {} ({}x{} @ {} fps)",
        project.output.file.display(),
        project.output.width,
        project.output.height,
        project.output.fps
    );
    println!("  Opening: {}", if project.opening.is_some() { "yes" } else { "no" });
    println!("  Clips: {}", project.clips.len());
    println!("  Closing: {}", if project.closing.is_some() { "yes" } else { "no" });
    match &project.background_music {
        Some(bgm) => println!("  Background music: {}", bgm.display()),
        None => println!("  Background music: none"),
    }

    let mut issues = Vec::new();
    if let Err(e) = project.validate() {
        issues.push(e.to_string());
    }
    issues.extend(loaded.validate_sources());

    if issues.is_empty() {
        println!("  Sources: All present");
        println!("\nProject is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for issue in &issues {
        println!("  - {issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}
