//! Print what a render would execute, without running anything.

use std::path::{Path, PathBuf};

use highlights_common::config::RendererConfig;
use highlights_filter_graph::AuxCommand;
use highlights_render_engine::{PipelineBuilder, Renderer};
use serde::Serialize;

use super::load_project;

#[derive(Serialize)]
struct PlanOutput<'a> {
    working_dir: &'a Path,
    segments: usize,
    pre_commands: &'a [AuxCommand],
    command: &'a AuxCommand,
    post_commands: &'a [AuxCommand],
}

pub fn run(path: PathBuf, json: bool, config: &RendererConfig) -> anyhow::Result<()> {
    let loaded = load_project(&path)?;
    let plan = PipelineBuilder::new(&loaded.project)
        .with_renderer_config(config)
        .build()?;
    let command = Renderer::new(config.clone()).command_for(&plan)?;

    if json {
        let output = PlanOutput {
            working_dir: &loaded.root,
            segments: plan.segment_count,
            pre_commands: plan.graph.pre_commands(),
            command: &command,
            post_commands: plan.graph.post_commands(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# working directory: {}", loaded.root.display());
    println!("# {} segment(s)", plan.segment_count);
    for pre in plan.graph.pre_commands() {
        println!("{pre}");
    }
    println!("{command}");
    for post in plan.graph.post_commands() {
        println!("{post}");
    }
    Ok(())
}
