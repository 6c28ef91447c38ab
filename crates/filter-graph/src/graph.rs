//! The filter graph: declared inputs, ordered chains, output mappings and
//! the auxiliary commands that run around the renderer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use highlights_common::error::{HighlightsError, HighlightsResult};

use crate::chain::{ChainId, FilterChain, InputId, OutputRef, Pad};
use crate::command::{AuxCommand, TempArtifact};

/// A complete renderer invocation under construction.
///
/// Chains live in an arena and reference each other through
/// [`ChainId`]/[`OutputRef`] handles; labels are only used when the
/// graph is rendered to text.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    output_file: PathBuf,
    global_args: Vec<String>,
    output_args: Vec<String>,
    inputs: Vec<PathBuf>,
    chains: Vec<FilterChain>,
    mappings: Vec<OutputRef>,
    pre_commands: Vec<AuxCommand>,
    post_commands: Vec<AuxCommand>,
    artifacts: Vec<TempArtifact>,
}

impl FilterGraph {
    pub fn new(output_file: impl Into<PathBuf>) -> Self {
        Self {
            output_file: output_file.into(),
            ..Self::default()
        }
    }

    /// Arguments placed before the first `-i` (e.g. `-y`).
    pub fn set_global_args(&mut self, args: Vec<String>) {
        self.global_args = args;
    }

    /// Arguments placed right before the output path.
    pub fn set_output_args(&mut self, args: Vec<String>) {
        self.output_args = args;
    }

    /// Declare an input file and return its index.
    ///
    /// Every call allocates a new index, even for a path that was
    /// declared before.
    pub fn declare_input(&mut self, file: impl Into<PathBuf>) -> InputId {
        self.inputs.push(file.into());
        InputId(self.inputs.len() - 1)
    }

    /// Append a chain. References are checked by [`Self::serialize`].
    pub fn add_chain(&mut self, chain: FilterChain) -> ChainId {
        tracing::trace!(chain = %chain.describe(), "Adding filter chain");
        self.chains.push(chain);
        ChainId(self.chains.len() - 1)
    }

    /// Resolve a chain's Nth output.
    pub fn output(&self, chain: ChainId, index: usize) -> HighlightsResult<OutputRef> {
        let target = self.chains.get(chain.0).ok_or_else(|| {
            HighlightsError::invalid_reference(format!("unknown chain #{}", chain.0))
        })?;
        if index >= target.labels().len() {
            return Err(HighlightsError::invalid_reference(format!(
                "chain {} has {} output(s), output #{index} requested",
                target.describe(),
                target.labels().len()
            )));
        }
        Ok(OutputRef { chain, index })
    }

    /// Select a chain output as a final stream, in call order.
    ///
    /// Without any mapping the renderer picks the last chain's labeled
    /// outputs itself.
    pub fn map_output(&mut self, chain: ChainId, index: usize) -> HighlightsResult<()> {
        let output = self.output(chain, index)?;
        self.mappings.push(output);
        Ok(())
    }

    pub fn add_pre_command(&mut self, command: AuxCommand) {
        self.pre_commands.push(command);
    }

    pub fn add_post_command(&mut self, command: AuxCommand) {
        self.post_commands.push(command);
    }

    /// Register a temporary artifact: its create command runs with the
    /// pre-commands and its remove command with the post-commands.
    pub fn add_temp_artifact(&mut self, artifact: TempArtifact) {
        self.pre_commands.push(artifact.create().clone());
        self.post_commands.push(artifact.remove().clone());
        self.artifacts.push(artifact);
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    pub fn chain(&self, id: ChainId) -> Option<&FilterChain> {
        self.chains.get(id.0)
    }

    pub fn mappings(&self) -> &[OutputRef] {
        &self.mappings
    }

    pub fn pre_commands(&self) -> &[AuxCommand] {
        &self.pre_commands
    }

    pub fn post_commands(&self) -> &[AuxCommand] {
        &self.post_commands
    }

    pub fn temp_artifacts(&self) -> &[TempArtifact] {
        &self.artifacts
    }

    /// Label text of a chain output, e.g. `outv`.
    pub fn label(&self, output: OutputRef) -> Option<&str> {
        self.chains
            .get(output.chain.0)
            .and_then(|chain| chain.labels().get(output.index))
            .map(String::as_str)
    }

    /// Render all chains, joined with `;`.
    ///
    /// Fails with `DanglingReference` when a pad names an undeclared input,
    /// a chain that is not added before the referencing chain, or an output
    /// the upstream chain does not have.
    pub fn filter_complex(&self) -> HighlightsResult<String> {
        self.check_labels()?;

        let mut rendered = Vec::with_capacity(self.chains.len());
        for (position, chain) in self.chains.iter().enumerate() {
            let text = chain.render(|pad| self.render_pad(position, chain, pad))?;
            rendered.push(text);
        }
        Ok(rendered.join(";"))
    }

    /// The full renderer argument vector:
    /// global args, `-i` per input, `-filter_complex`, `-map` per mapping,
    /// output args, output path.
    pub fn serialize(&self) -> HighlightsResult<Vec<String>> {
        let mut args = self.global_args.clone();

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }

        if !self.chains.is_empty() {
            args.push("-filter_complex".to_string());
            args.push(self.filter_complex()?);
        }

        for mapping in &self.mappings {
            let label = self.label(*mapping).ok_or_else(|| {
                HighlightsError::dangling_reference(format!(
                    "mapped output #{} of chain #{} does not exist",
                    mapping.index, mapping.chain.0
                ))
            })?;
            args.push("-map".to_string());
            args.push(format!("[{label}]"));
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output_file.display().to_string());

        Ok(args)
    }

    fn render_pad(&self, position: usize, chain: &FilterChain, pad: &Pad) -> HighlightsResult<String> {
        match pad {
            Pad::Source {
                input,
                kind,
                stream,
            } => {
                if input.0 >= self.inputs.len() {
                    return Err(HighlightsError::dangling_reference(format!(
                        "chain {} reads undeclared input #{}",
                        chain.describe(),
                        input.0
                    )));
                }
                Ok(format!("[{}:{}:{}]", input.0, kind, stream))
            }
            Pad::Upstream(output) => {
                if output.chain.0 >= position {
                    return Err(HighlightsError::dangling_reference(format!(
                        "chain {} reads chain #{} which is not added before it",
                        chain.describe(),
                        output.chain.0
                    )));
                }
                let label = self.label(*output).ok_or_else(|| {
                    HighlightsError::dangling_reference(format!(
                        "chain {} reads missing output #{} of chain #{}",
                        chain.describe(),
                        output.index,
                        output.chain.0
                    ))
                })?;
                Ok(format!("[{label}]"))
            }
        }
    }

    /// Labels must be unique, well-formed, and consumed at most once.
    fn check_labels(&self) -> HighlightsResult<()> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            for label in chain.labels() {
                if !is_valid_label(label) {
                    return Err(HighlightsError::invalid_reference(format!(
                        "invalid label {label:?}"
                    )));
                }
                if !seen.insert(label.as_str()) {
                    return Err(HighlightsError::invalid_reference(format!(
                        "duplicate label [{label}]"
                    )));
                }
            }
        }

        let mut consumers: HashMap<OutputRef, usize> = HashMap::new();
        let upstream = self.chains.iter().flat_map(|chain| {
            chain.pads().iter().filter_map(|pad| match pad {
                Pad::Upstream(output) => Some(*output),
                Pad::Source { .. } => None,
            })
        });
        for output in upstream.chain(self.mappings.iter().copied()) {
            let count = consumers.entry(output).or_default();
            *count += 1;
            if *count > 1 {
                let label = self.label(output).unwrap_or("?");
                return Err(HighlightsError::invalid_reference(format!(
                    "output [{label}] is consumed more than once"
                )));
            }
        }

        Ok(())
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
