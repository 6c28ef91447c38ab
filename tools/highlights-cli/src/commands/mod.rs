pub mod check;
pub mod plan;
pub mod render;
pub mod validate;

use std::path::Path;

use highlights_project_model::LoadedProject;

/// Load a project document, with the path in the error.
pub fn load_project(path: &Path) -> anyhow::Result<LoadedProject> {
    LoadedProject::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))
}
