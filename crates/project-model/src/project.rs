//! Project document types.
//!
//! A project describes one short video: an optional opening image, a list
//! of trimmed clips, an optional closing image, optional background music
//! and the output geometry. The JSON field names (`op`, `ed`, `clips`,
//! `bgm`, `output`) are the on-disk format.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use highlights_common::error::{HighlightsError, HighlightsResult};

use crate::timestamp::Timestamp;

/// Font size used when a segment does not set `font_size`.
pub const DEFAULT_FONT_SIZE: u32 = 24;

/// Top-level project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProject {
    /// Opening still image.
    #[serde(rename = "op", default)]
    pub opening: Option<ImageSegment>,

    /// Closing still image.
    #[serde(rename = "ed", default)]
    pub closing: Option<ImageSegment>,

    /// Video clips in playback order.
    #[serde(default)]
    pub clips: Vec<ClipSegment>,

    /// Background music mixed under the whole video.
    #[serde(
        rename = "bgm",
        default,
        deserialize_with = "empty_path_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_music: Option<PathBuf>,

    /// Output file and geometry.
    pub output: OutputSpec,
}

/// A still image shown for a fixed duration, fading out at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSegment {
    pub file: PathBuf,

    #[serde(rename = "duration")]
    pub duration_secs: f64,

    #[serde(rename = "fade_out_duration", default)]
    pub fade_out_secs: f64,

    #[serde(default)]
    pub subtitle: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,
}

/// A video clip, optionally trimmed to `[start, end]`.
///
/// Empty `start`/`end` mean "from the beginning" / "to the end".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSegment {
    pub file: PathBuf,

    #[serde(default)]
    pub start: String,

    #[serde(default)]
    pub end: String,

    #[serde(default)]
    pub subtitle: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,
}

/// Output file and geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub file: PathBuf,

    #[serde(rename = "w")]
    pub width: u32,

    #[serde(rename = "h")]
    pub height: u32,

    pub fps: u32,
}

/// Burned-in subtitle text for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caption<'a> {
    pub text: &'a str,
    pub font_size: u32,
}

/// Parsed trim bounds of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrimRange {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TrimRange {
    /// Length of the kept span, or `None` when the clip runs to its end.
    pub fn span(&self) -> Option<Timestamp> {
        self.end
            .map(|end| end.saturating_sub(self.start.unwrap_or(Timestamp::ZERO)))
    }
}

/// One entry of the assembled timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    Opening(&'a ImageSegment),
    Clip {
        index: usize,
        clip: &'a ClipSegment,
    },
    Closing(&'a ImageSegment),
}

impl Segment<'_> {
    /// Name used in error messages and logs.
    pub fn name(&self) -> String {
        match self {
            Self::Opening(_) => "opening".to_string(),
            Self::Clip { index, .. } => format!("clip {index}"),
            Self::Closing(_) => "closing".to_string(),
        }
    }

    /// Short tag used for filter labels and subtitle file names.
    pub fn tag(&self) -> String {
        match self {
            Self::Opening(_) => "op".to_string(),
            Self::Clip { index, .. } => format!("clip_{index:02}"),
            Self::Closing(_) => "ed".to_string(),
        }
    }
}

impl ImageSegment {
    pub fn caption(&self) -> Option<Caption<'_>> {
        caption(&self.subtitle, self.font_size)
    }

    /// Frame at which the fade-out starts, in seconds.
    pub fn fade_out_start_secs(&self) -> f64 {
        self.duration_secs - self.fade_out_secs
    }

    fn validate(&self, segment: &str) -> HighlightsResult<()> {
        if self.file.as_os_str().is_empty() {
            return Err(HighlightsError::invalid_segment(segment, "file is empty"));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(HighlightsError::invalid_segment(
                segment,
                format!("duration must be positive, got {}", self.duration_secs),
            ));
        }
        if !self.fade_out_secs.is_finite() || self.fade_out_secs < 0.0 {
            return Err(HighlightsError::invalid_segment(
                segment,
                format!(
                    "fade_out_duration must not be negative, got {}",
                    self.fade_out_secs
                ),
            ));
        }
        if self.duration_secs <= self.fade_out_secs {
            return Err(HighlightsError::invalid_segment(
                segment,
                format!(
                    "duration ({}) must exceed fade_out_duration ({})",
                    self.duration_secs, self.fade_out_secs
                ),
            ));
        }
        Ok(())
    }
}

impl ClipSegment {
    pub fn caption(&self) -> Option<Caption<'_>> {
        caption(&self.subtitle, self.font_size)
    }

    /// Whether trim filters apply. Compares the raw strings exactly, so
    /// equal bounds mean "no trim" even when both are set.
    pub fn is_trimmed(&self) -> bool {
        self.start != self.end
    }

    /// Parse the non-empty bounds and check `start <= end`.
    pub fn trim_range(&self) -> HighlightsResult<TrimRange> {
        let start = parse_bound(&self.start)?;
        let end = parse_bound(&self.end)?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(HighlightsError::invalid_timestamp(
                    &self.start,
                    format!("start is after end ({})", self.end),
                ));
            }
        }
        Ok(TrimRange { start, end })
    }
}

impl VideoProject {
    /// Parse a project document from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Segments in timeline order: opening, clips, closing.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::with_capacity(self.clips.len() + 2);
        if let Some(opening) = &self.opening {
            segments.push(Segment::Opening(opening));
        }
        segments.extend(
            self.clips
                .iter()
                .enumerate()
                .map(|(index, clip)| Segment::Clip { index, clip }),
        );
        if let Some(closing) = &self.closing {
            segments.push(Segment::Closing(closing));
        }
        segments
    }

    /// Check the document invariants and return the first violation.
    pub fn validate(&self) -> HighlightsResult<()> {
        let output = &self.output;
        if output.file.as_os_str().is_empty() {
            return Err(HighlightsError::invalid_segment("output", "file is empty"));
        }
        if output.width == 0 || output.height == 0 || output.fps == 0 {
            return Err(HighlightsError::invalid_segment(
                "output",
                format!(
                    "w, h and fps must be positive, got {}x{}@{}",
                    output.width, output.height, output.fps
                ),
            ));
        }

        let segments = self.segments();
        if segments.is_empty() {
            return Err(HighlightsError::invalid_segment(
                "project",
                "no opening, closing or clips to concatenate",
            ));
        }

        for segment in &segments {
            let name = segment.name();
            match segment {
                Segment::Opening(image) | Segment::Closing(image) => image.validate(&name)?,
                Segment::Clip { clip, .. } => {
                    if clip.file.as_os_str().is_empty() {
                        return Err(HighlightsError::invalid_segment(&name, "file is empty"));
                    }
                    clip.trim_range().map_err(|e| e.in_segment(&name))?;
                }
            }
        }

        Ok(())
    }
}

/// A project document together with the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Directory of the document; relative media paths resolve against it.
    pub root: PathBuf,

    /// Path of the JSON document.
    pub source: PathBuf,

    pub project: VideoProject,
}

impl LoadedProject {
    /// Load a project document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let source = path.as_ref().to_path_buf();

        let json = std::fs::read_to_string(&source).map_err(|e| ProjectError::IoError {
            path: source.clone(),
            source: e,
        })?;

        let project = VideoProject::from_json_str(&json).map_err(|e| ProjectError::ParseError {
            path: source.clone(),
            source: e,
        })?;

        let root = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        tracing::debug!(
            path = %source.display(),
            clips = project.clips.len(),
            "Loaded project document"
        );

        Ok(Self {
            root,
            source,
            project,
        })
    }

    /// List referenced media files missing from the document directory.
    pub fn validate_sources(&self) -> Vec<String> {
        self.validate_sources_in(&self.root)
    }

    /// List referenced media files missing from `dir`.
    pub fn validate_sources_in(&self, dir: &Path) -> Vec<String> {
        let mut errors = vec![];

        let mut check = |file: &Path, label: String| {
            if !dir.join(file).exists() {
                errors.push(format!("{label} missing: {}", file.display()));
            }
        };

        for segment in self.project.segments() {
            match segment {
                Segment::Opening(image) => check(&image.file, "Opening image".to_string()),
                Segment::Closing(image) => check(&image.file, "Closing image".to_string()),
                Segment::Clip { index, clip } => check(&clip.file, format!("Clip {index} source")),
            }
        }
        if let Some(bgm) = &self.project.background_music {
            check(bgm, "Background music".to_string());
        }

        errors
    }
}

/// Errors that can occur when loading project documents.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ProjectError> for HighlightsError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::IoError { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                HighlightsError::FileNotFound { path }
            }
            ProjectError::IoError { source, .. } => HighlightsError::Io(source),
            ProjectError::ParseError { source, .. } => HighlightsError::Json(source),
        }
    }
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn caption(text: &str, font_size: u32) -> Option<Caption<'_>> {
    if text.trim().is_empty() {
        None
    } else {
        Some(Caption { text, font_size })
    }
}

fn parse_bound(value: &str) -> HighlightsResult<Option<Timestamp>> {
    if value.is_empty() {
        Ok(None)
    } else {
        Timestamp::parse(value).map(Some)
    }
}

fn empty_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from))
}
