//! Auxiliary commands and temporary artifacts.
//!
//! Pre-commands prepare files the renderer reads (subtitle files) and
//! post-commands remove them again. A [`TempArtifact`] owns both halves
//! for one path so they cannot drift apart.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

/// Shell snippet writing `$1` verbatim to the file `$2`.
const WRITE_FILE_SCRIPT: &str = r#"printf '%s' "$1" > "$2""#;

/// An external program invocation (program + argument list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuxCommand {
    program: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<PathBuf>,
}

impl AuxCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            artifact: None,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Temporary file this command creates or removes, if any.
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    fn for_artifact(mut self, path: &Path) -> Self {
        self.artifact = Some(path.to_path_buf());
        self
    }

    /// A `std::process::Command` running in `working_dir`.
    pub fn to_command(&self, working_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(working_dir);
        cmd
    }
}

impl fmt::Display for AuxCommand {
    /// Shell-quoted command line, for logs and dry runs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// A file that exists only for the duration of one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TempArtifact {
    path: PathBuf,
    create: AuxCommand,
    remove: AuxCommand,
}

impl TempArtifact {
    /// Pair `create` with `rm -f <path>`.
    pub fn new(path: impl Into<PathBuf>, create: AuxCommand) -> Self {
        let path = path.into();
        let remove = AuxCommand::new("rm", ["-f".to_string(), path.display().to_string()]);
        Self {
            create: create.for_artifact(&path),
            remove: remove.for_artifact(&path),
            path,
        }
    }

    /// An artifact whose create command writes `contents` to `path`.
    pub fn write_file(path: impl Into<PathBuf>, contents: &str) -> Self {
        let path = path.into();
        let create = AuxCommand::new(
            "sh",
            [
                "-c".to_string(),
                WRITE_FILE_SCRIPT.to_string(),
                "highlights-write".to_string(),
                contents.to_string(),
                path.display().to_string(),
            ],
        );
        Self::new(path, create)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&self) -> &AuxCommand {
        &self.create
    }

    pub fn remove(&self) -> &AuxCommand {
        &self.remove
    }
}

/// Quote one word for a POSIX shell when it needs it.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
