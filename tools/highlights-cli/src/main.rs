//! Highlights CLI: build and run ffmpeg filter graphs from project files.
//!
//! Usage:
//!   highlights render <PROJECT>     Render a project to video
//!   highlights plan <PROJECT>       Print the commands a render would run
//!   highlights validate <PROJECT>   Validate a project document
//!   highlights check                Check for ffmpeg / ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use highlights_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "highlights",
    about = "Assemble highlight reels with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project to video
    Render {
        /// Path to the project JSON document
        project: PathBuf,

        /// Working directory (defaults to the document's directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// ffmpeg binary to run
        #[arg(long)]
        ffmpeg: Option<String>,

        /// Skip the stereo check on the background music
        #[arg(long)]
        no_verify_bgm: bool,
    },

    /// Print the pre-commands, renderer invocation and post-commands
    Plan {
        /// Path to the project JSON document
        project: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a project document and its media files
    Validate {
        /// Path to the project JSON document
        project: PathBuf,
    },

    /// Check that the renderer tools are installed
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    highlights_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            project,
            dir,
            ffmpeg,
            no_verify_bgm,
        } => {
            if let Some(ffmpeg) = ffmpeg {
                config.renderer.ffmpeg_path = ffmpeg;
            }
            if no_verify_bgm {
                config.renderer.verify_bgm_layout = false;
            }
            commands::render::run(project, dir, config.renderer).await
        }
        Commands::Plan { project, json } => commands::plan::run(project, json, &config.renderer),
        Commands::Validate { project } => commands::validate::run(project),
        Commands::Check => commands::check::run(&config.renderer),
    }
}
