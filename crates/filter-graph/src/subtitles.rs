//! One-cue SRT files for burned-in segment captions.

use std::path::{Path, PathBuf};

use highlights_project_model::timestamp::Timestamp;

use crate::command::TempArtifact;

/// End time written for cues that run until the stream ends.
const OPEN_ENDED_SRT_TIME: &str = "99:59:59,999";

/// A single subtitle cue. `end == None` keeps the text up to the end of
/// the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    pub start: Timestamp,
    pub end: Option<Timestamp>,
    pub text: String,
}

/// Generate SRT content from cues.
pub fn generate_srt(cues: &[SubtitleCue]) -> String {
    let mut output = String::new();

    for (i, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start),
            cue.end
                .map(format_srt_time)
                .unwrap_or_else(|| OPEN_ENDED_SRT_TIME.to_string()),
        ));
        output.push_str(&cue_text(&cue.text));
        output.push_str("\n\n");
    }

    output
}

/// Cue text without blank lines, which would end the cue early.
fn cue_text(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a timestamp as SRT time: HH:MM:SS,mmm
fn format_srt_time(ts: Timestamp) -> String {
    let total_ms = ts.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Subtitle file path next to `media`: `a.mp4` + `clip_00` -> `a.clip_00.srt`.
pub fn subtitle_path(media: &Path, tag: &str) -> PathBuf {
    media.with_extension(format!("{tag}.srt"))
}

/// Temporary SRT file holding a single cue.
pub fn subtitle_artifact(path: impl Into<PathBuf>, cue: SubtitleCue) -> TempArtifact {
    TempArtifact::write_file(path, &generate_srt(&[cue]))
}
