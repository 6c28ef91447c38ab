//! Highlights Filter Graph
//!
//! Typed builder for ffmpeg `-filter_complex` invocations:
//! - **Filter:** one operation with positional/named arguments
//! - **FilterChain:** input pads, chained filters, output labels
//! - **FilterGraph:** declared inputs, ordered chains, output mappings,
//!   and the pre/post commands around the renderer
//! - **Subtitles:** one-cue SRT files materialized as temporary artifacts
//!
//! ```text
//! [0:v:0]fps=30,loop=...,fade=t=out:st=4:d=1[op_v];aevalsrc=0:d=5[op_a];
//! [op_v][op_a][clip_00_v][clip_00_a]concat=n=2:v=1:a=1[outv][outa]
//! ```

pub mod chain;
pub mod command;
pub mod filter;
pub mod graph;
pub mod subtitles;

pub use chain::{ChainId, FilterChain, InputId, OutputRef, Pad, StreamKind};
pub use command::{AuxCommand, TempArtifact};
pub use filter::{Filter, FilterArg};
pub use graph::FilterGraph;
pub use subtitles::{SubtitleCue, generate_srt, subtitle_artifact, subtitle_path};
