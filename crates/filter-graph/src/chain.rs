//! Filter chains: labeled processing nodes of a filter graph.

use std::fmt;

use highlights_common::error::{HighlightsError, HighlightsResult};

use crate::filter::Filter;
use crate::graph::FilterGraph;

/// Stream type selected from a declared input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// Stream specifier letter (`v` / `a`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "v",
            Self::Audio => "a",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a declared input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId(pub(crate) usize);

impl InputId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle of a chain added to a [`FilterGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub(crate) usize);

impl ChainId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The Nth labeled output of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub chain: ChainId,
    pub index: usize,
}

/// An input pad of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pad {
    /// `[file:kind:stream]`
    Source {
        input: InputId,
        kind: StreamKind,
        stream: u32,
    },
    /// `[label]` of an upstream chain output.
    Upstream(OutputRef),
}

/// A named processing node: input pads, chained filters, output labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    labels: Vec<String>,
    pads: Vec<Pad>,
    filters: Vec<Filter>,
}

impl FilterChain {
    /// A chain with a single output label.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_labels([label.into()])
    }

    /// A chain with several output labels (e.g. `concat`'s video + audio).
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            pads: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Append a pad reading a stream of a declared input.
    pub fn add_source_input(
        &mut self,
        graph: &FilterGraph,
        input: InputId,
        kind: StreamKind,
        stream: u32,
    ) -> HighlightsResult<&mut Self> {
        if input.0 >= graph.inputs().len() {
            return Err(HighlightsError::invalid_reference(format!(
                "chain {} reads input #{} but only {} input(s) are declared",
                self.describe(),
                input.0,
                graph.inputs().len()
            )));
        }
        self.pads.push(Pad::Source {
            input,
            kind,
            stream,
        });
        Ok(self)
    }

    /// Append a pad reading the `output_index`-th output of `upstream`.
    pub fn add_upstream_input(
        &mut self,
        graph: &FilterGraph,
        upstream: ChainId,
        output_index: usize,
    ) -> HighlightsResult<&mut Self> {
        let output = graph.output(upstream, output_index)?;
        self.pads.push(Pad::Upstream(output));
        Ok(self)
    }

    /// Append a filter; filters apply left to right.
    pub fn chain(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// `[a][b]` form of the output labels, for messages.
    pub fn describe(&self) -> String {
        if self.labels.is_empty() {
            "<unlabeled>".to_string()
        } else {
            self.labels.iter().map(|l| format!("[{l}]")).collect()
        }
    }

    /// `<pads><f1>,<f2>,...<labels>`, with pads rendered by `render_pad`.
    pub(crate) fn render<F>(&self, mut render_pad: F) -> HighlightsResult<String>
    where
        F: FnMut(&Pad) -> HighlightsResult<String>,
    {
        if self.filters.is_empty() {
            return Err(HighlightsError::invalid_reference(format!(
                "chain {} has no filters",
                self.describe()
            )));
        }

        let mut text = String::new();
        for pad in &self.pads {
            text.push_str(&render_pad(pad)?);
        }
        let filters: Vec<String> = self.filters.iter().map(Filter::to_string).collect();
        text.push_str(&filters.join(","));
        for label in &self.labels {
            text.push('[');
            text.push_str(label);
            text.push(']');
        }
        Ok(text)
    }
}
