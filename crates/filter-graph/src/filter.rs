//! Filter operations.
//!
//! A [`Filter`] is one entry of a chain: a name plus `:`-separated
//! arguments, rendered exactly as ffmpeg's filtergraph grammar expects
//! (`scale=1280:720:force_original_aspect_ratio=decrease`).

use std::fmt;
use std::path::Path;

use highlights_project_model::timestamp::Timestamp;

use crate::chain::StreamKind;

/// One filter argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterArg {
    Positional(String),
    Named(String, String),
}

/// A single filter operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Append a `key=value` argument.
    pub fn named(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.args
            .push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[FilterArg] {
        &self.args
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                FilterArg::Positional(value) => f.write_str(value)?,
                FilterArg::Named(key, value) => write!(f, "{key}={value}")?,
            }
        }
        Ok(())
    }
}

/// Wrap a value in single quotes for the filtergraph parser.
///
/// Embedded quotes become `'\''` (close, escaped quote, reopen).
pub fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// `fps=N`
pub fn fps(fps: u32) -> Filter {
    Filter::new("fps").arg(fps)
}

/// `loop=loop=N:size=1`: repeat a single frame `frames` times.
pub fn loop_frames(frames: u64) -> Filter {
    Filter::new("loop")
        .named("loop", frames)
        .named("size", 1)
}

/// Scale into `width x height` keeping the aspect ratio.
pub fn scale_fit(width: u32, height: u32) -> Filter {
    Filter::new("scale")
        .arg(width)
        .arg(height)
        .named("force_original_aspect_ratio", "decrease")
}

/// Pad to exactly `width x height`, centered.
pub fn pad_center(width: u32, height: u32) -> Filter {
    Filter::new("pad")
        .arg(width)
        .arg(height)
        .arg("(ow-iw)/2")
        .arg("(oh-ih)/2")
}

/// `setsar=1:1`
pub fn square_pixels() -> Filter {
    Filter::new("setsar").arg(1).arg(1)
}

/// `format=pix_fmts=<fmt>`
pub fn pixel_format(pix_fmt: &str) -> Filter {
    Filter::new("format").named("pix_fmts", pix_fmt)
}

/// Escape an option value for the filter's own option parser, which
/// runs after the graph-level quoting is removed.
pub fn escape_option_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Burn in an SRT file with the given font size.
pub fn subtitles(srt: &Path, font_size: u32) -> Filter {
    Filter::new("subtitles")
        .arg(quote_value(&escape_option_value(&srt.to_string_lossy())))
        .named("force_style", quote_value(&format!("Fontsize={font_size}")))
}

/// `fade=t=out:st=<start>:d=<duration>`
pub fn fade_out(start: &str, duration: &str) -> Filter {
    Filter::new("fade")
        .named("t", "out")
        .named("st", start)
        .named("d", duration)
}

/// `aevalsrc=0:d=<duration>`: a silent audio source.
pub fn silence(duration: &str) -> Filter {
    Filter::new("aevalsrc").arg(0).named("d", duration)
}

/// `trim`/`atrim` with the bounds that are present.
pub fn trim(kind: StreamKind, start: Option<Timestamp>, end: Option<Timestamp>) -> Filter {
    let mut filter = Filter::new(match kind {
        StreamKind::Video => "trim",
        StreamKind::Audio => "atrim",
    });
    if let Some(start) = start {
        filter = filter.named("start", start.seconds_str());
    }
    if let Some(end) = end {
        filter = filter.named("end", end.seconds_str());
    }
    filter
}

/// `setpts=PTS-STARTPTS` / `asetpts=PTS-STARTPTS`
pub fn reset_timestamps(kind: StreamKind) -> Filter {
    Filter::new(match kind {
        StreamKind::Video => "setpts",
        StreamKind::Audio => "asetpts",
    })
    .arg("PTS-STARTPTS")
}

/// `aformat=channel_layouts=stereo`
pub fn stereo_layout() -> Filter {
    Filter::new("aformat").named("channel_layouts", "stereo")
}

/// `concat=n=N:v=V:a=A`
pub fn concat(segments: usize, video_streams: u32, audio_streams: u32) -> Filter {
    Filter::new("concat")
        .named("n", segments)
        .named("v", video_streams)
        .named("a", audio_streams)
}

/// `amerge=inputs=N`
pub fn amerge(inputs: usize) -> Filter {
    Filter::new("amerge").named("inputs", inputs)
}

/// Downmix two merged stereo tracks (4 channels) to stereo by summing
/// channel 0 with 2 and channel 1 with 3.
pub fn pan_sum_to_stereo() -> Filter {
    Filter::new("pan").arg("stereo|c0<c0+c2|c1<c1+c3")
}
