//! Highlights Render Engine
//!
//! Turns a project document into a renderer invocation and runs it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! op.jpg ── fps,loop,scale,pad,setsar,format,[subtitles],fade ─┐
//!           aevalsrc,aformat=stereo ────────────────────────────┤
//! clip.mp4 ─ scale,pad,setsar,[trim,setpts],[subtitles] ────────┤
//!            [atrim,asetpts],aformat=stereo ────────────────────┤
//! ed.jpg ── (same as op) ───────────────────────────────────────┤
//!                                                               ▼
//!                                            concat=n=N:v=1:a=1 [outv][outa]
//!                                                               │
//! bgm.mp3 ──────────────────────── amerge=inputs=2,pan=stereo ──┤
//!                                                               ▼
//!                                                          output.mp4
//! ```
//!
//! Subtitle files are written by pre-commands and removed by
//! post-commands; see [`runner::Renderer::render`].

pub mod pipeline;
pub mod runner;

pub use pipeline::{build_pipeline, PipelineBuilder, RenderPlan};
pub use runner::{render_project, ProcessExecutor, RenderReport, Renderer, SystemExecutor};
