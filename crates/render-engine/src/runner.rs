//! Execution of a [`RenderPlan`]: pre-commands, the renderer, then cleanup.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use highlights_common::config::RendererConfig;
use highlights_common::error::{HighlightsError, HighlightsResult};
use highlights_filter_graph::AuxCommand;
use highlights_project_model::project::LoadedProject;
use serde::Serialize;

use crate::pipeline::{PipelineBuilder, RenderPlan};

/// Lines of renderer stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Runs external commands. Swapped out in tests.
pub trait ProcessExecutor {
    /// Run `command` to completion in `working_dir`.
    fn execute(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<()>;

    /// Run the renderer itself, whose progress output is meant for the user.
    fn run_renderer(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<()> {
        self.execute(command, working_dir)
    }

    /// Run `command` and return its stdout.
    fn capture(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<String>;

    /// Whether `program` can be started.
    fn is_available(&self, program: &str) -> bool;
}

/// [`ProcessExecutor`] backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn execute(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<()> {
        run_process(command, working_dir, false)
    }

    fn run_renderer(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<()> {
        run_process(command, working_dir, true)
    }

    fn capture(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<String> {
        let output = command
            .to_command(working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                HighlightsError::renderer(format!("Failed to start {}: {e}", command.program()))
            })?;
        if !output.status.success() {
            return Err(HighlightsError::renderer(format!(
                "{} failed (status {}): {}",
                command.program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn is_available(&self, program: &str) -> bool {
        command_exists(program)
    }
}

/// Run `command` to completion. With `echo`, its stderr is copied to ours
/// as it arrives; the last lines are kept for the error either way.
fn run_process(command: &AuxCommand, working_dir: &Path, echo: bool) -> HighlightsResult<()> {
    let mut cmd = command.to_command(working_dir);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        HighlightsError::renderer(format!("Failed to start {}: {e}", command.program()))
    })?;
    tracing::debug!(pid = child.id(), program = command.program(), echo, "Process started");

    let stderr = child.stderr.take().ok_or_else(|| {
        HighlightsError::renderer(format!("Failed to capture {} stderr", command.program()))
    })?;

    // Drain stderr on a thread so a full pipe never blocks the child.
    let program = command.program().to_string();
    let stderr_task = std::thread::spawn(move || drain_stderr(stderr, &program, echo));

    let status = child.wait().map_err(|e| {
        HighlightsError::renderer(format!("Failed waiting for {}: {e}", command.program()))
    })?;
    let tail = stderr_task.join().unwrap_or_default();

    if !status.success() {
        let tail: Vec<String> = tail.into_iter().collect();
        return Err(HighlightsError::renderer(format!(
            "{} failed (status {status}): {}",
            command.program(),
            tail.join("\n")
        )));
    }
    Ok(())
}

/// Read `stderr` to the end and return its last lines. ffmpeg rewrites its
/// progress line with `\r`, so both `\r` and `\n` end a line.
fn drain_stderr(mut stderr: impl Read, program: &str, echo: bool) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];
    let mut console = std::io::stderr();

    loop {
        let read = match stderr.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(program, error = %e, "Failed reading process stderr");
                break;
            }
        };
        let chunk = &buf[..read];
        if echo {
            let _ = console.write_all(chunk).and_then(|()| console.flush());
        }
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                push_line(&mut tail, &mut pending, program, echo);
            } else {
                pending.push(byte);
            }
        }
    }
    push_line(&mut tail, &mut pending, program, echo);
    tail
}

fn push_line(tail: &mut VecDeque<String>, pending: &mut Vec<u8>, program: &str, echoed: bool) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).into_owned();
    pending.clear();
    if !echoed {
        tracing::debug!(target: "highlights::process", program, "{line}");
    }
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Whether `binary` resolves to something runnable.
pub fn command_exists(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }
    std::process::Command::new("sh")
        .arg("-c")
        .arg(r#"command -v "$1" >/dev/null 2>&1"#)
        .arg("sh")
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Outcome of a successful render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    /// Renderer command line, shell-quoted.
    pub command_line: String,

    pub output_file: PathBuf,

    pub elapsed_secs: f64,

    /// Post-commands that failed. The render itself still succeeded.
    pub cleanup_failures: Vec<String>,
}

/// Runs render plans through a [`ProcessExecutor`].
#[derive(Debug)]
pub struct Renderer<E: ProcessExecutor = SystemExecutor> {
    executor: E,
    config: RendererConfig,
}

impl Renderer<SystemExecutor> {
    pub fn new(config: RendererConfig) -> Self {
        Self::with_executor(SystemExecutor, config)
    }
}

impl<E: ProcessExecutor> Renderer<E> {
    pub fn with_executor(executor: E, config: RendererConfig) -> Self {
        Self { executor, config }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Renderer invocation for `plan`, without running anything.
    pub fn command_for(&self, plan: &RenderPlan) -> HighlightsResult<AuxCommand> {
        Ok(AuxCommand::new(
            self.config.ffmpeg_path.clone(),
            plan.graph.serialize()?,
        ))
    }

    /// Run the plan in `working_dir`.
    ///
    /// Pre-commands run in order and any failure aborts before the
    /// renderer starts. Post-commands always run once pre-commands have
    /// started, even when a later step fails.
    pub fn render(&mut self, plan: &RenderPlan, working_dir: &Path) -> HighlightsResult<RenderReport> {
        // Serializing first rejects a broken graph before any side effect.
        let main = self.command_for(plan)?;

        if !self.executor.is_available(&self.config.ffmpeg_path) {
            return Err(HighlightsError::renderer(format!(
                "{} not found in PATH",
                self.config.ffmpeg_path
            )));
        }
        self.check_background_music(plan, working_dir)?;

        let started = Instant::now();
        tracing::info!(
            output = %plan.graph.output_file().display(),
            segments = plan.segment_count,
            pre_commands = plan.graph.pre_commands().len(),
            working_dir = %working_dir.display(),
            "Starting render"
        );

        let mut cleanup = CleanupGuard::new(
            &mut self.executor,
            plan.graph.post_commands(),
            working_dir,
        );
        let outcome = run_main(cleanup.executor(), plan.graph.pre_commands(), &main, working_dir);
        let cleanup_failures = cleanup.finish();
        outcome?;

        let elapsed_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            output = %plan.graph.output_file().display(),
            elapsed_secs,
            cleanup_failures = cleanup_failures.len(),
            "Render complete"
        );

        Ok(RenderReport {
            command_line: main.to_string(),
            output_file: plan.graph.output_file().to_path_buf(),
            elapsed_secs,
            cleanup_failures,
        })
    }

    /// The music merge needs a stereo input.
    fn check_background_music(&mut self, plan: &RenderPlan, working_dir: &Path) -> HighlightsResult<()> {
        let Some(music) = &plan.background_music else {
            return Ok(());
        };
        if !self.config.verify_bgm_layout {
            return Ok(());
        }
        if !self.executor.is_available(&self.config.ffprobe_path) {
            tracing::warn!(
                prober = %self.config.ffprobe_path,
                "Prober not found, skipping background music layout check"
            );
            return Ok(());
        }

        match probe_audio_channels(&mut self.executor, &self.config.ffprobe_path, music, working_dir) {
            Some(2) => Ok(()),
            Some(channels) => Err(HighlightsError::invalid_segment(
                "bgm",
                format!(
                    "{} has {channels} audio channel(s), stereo is required",
                    music.display()
                ),
            )),
            None => {
                tracing::warn!(
                    file = %music.display(),
                    "Could not probe background music, assuming stereo"
                );
                Ok(())
            }
        }
    }
}

/// Build and render a loaded project in `working_dir`.
pub fn render_project(
    loaded: &LoadedProject,
    config: &RendererConfig,
    working_dir: &Path,
) -> HighlightsResult<RenderReport> {
    let plan = PipelineBuilder::new(&loaded.project)
        .with_renderer_config(config)
        .build()?;
    Renderer::new(config.clone()).render(&plan, working_dir)
}

/// Channel count of the first audio stream of `file`.
pub fn probe_audio_channels<E: ProcessExecutor>(
    executor: &mut E,
    prober: &str,
    file: &Path,
    working_dir: &Path,
) -> Option<u32> {
    let probe = AuxCommand::new(
        prober,
        [
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "a:0".to_string(),
            "-show_entries".to_string(),
            "stream=channels".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            file.display().to_string(),
        ],
    );
    let raw = executor.capture(&probe, working_dir).ok()?;
    let channels = raw.lines().next()?.trim().parse::<u32>().ok()?;
    (channels > 0).then_some(channels)
}

fn run_main<E: ProcessExecutor>(
    executor: &mut E,
    pre_commands: &[AuxCommand],
    main: &AuxCommand,
    working_dir: &Path,
) -> HighlightsResult<()> {
    for command in pre_commands {
        tracing::debug!(command = %command, "Running pre-command");
        executor
            .execute(command, working_dir)
            .map_err(|e| match command.artifact() {
                Some(path) => HighlightsError::subtitle_file(path, e.to_string()),
                None => e,
            })?;
    }

    tracing::debug!(command = %main, "Running renderer");
    executor.run_renderer(main, working_dir)
}

/// Runs post-commands exactly once, on [`Self::finish`] or on drop.
struct CleanupGuard<'a, E: ProcessExecutor> {
    executor: &'a mut E,
    commands: &'a [AuxCommand],
    working_dir: &'a Path,
    done: bool,
}

impl<'a, E: ProcessExecutor> CleanupGuard<'a, E> {
    fn new(executor: &'a mut E, commands: &'a [AuxCommand], working_dir: &'a Path) -> Self {
        Self {
            executor,
            commands,
            working_dir,
            done: false,
        }
    }

    fn executor(&mut self) -> &mut E {
        self.executor
    }

    /// Run every post-command and return the failures.
    fn finish(mut self) -> Vec<String> {
        self.run()
    }

    fn run(&mut self) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.done = true;

        let mut failures = Vec::new();
        for command in self.commands {
            tracing::debug!(command = %command, "Running post-command");
            if let Err(e) = self.executor.execute(command, self.working_dir) {
                tracing::warn!(command = %command, error = %e, "Post-command failed");
                failures.push(format!("{command}: {e}"));
            }
        }
        failures
    }
}

impl<E: ProcessExecutor> Drop for CleanupGuard<'_, E> {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_pipeline;
    use highlights_project_model::project::VideoProject;

    const PROJECT: &str = r#"{
        "op": {"file": "op.jpg", "duration": 3, "fade_out_duration": 1, "subtitle": "Hello"},
        "clips": [
            {"file": "a.mp4", "start": "00:00:01", "end": "00:00:04", "subtitle": "First"}
        ],
        "bgm": "bgm.mp3",
        "output": {"file": "out.mp4", "w": 640, "h": 360, "fps": 25}
    }"#;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Vec<String>,
        fail_programs: Vec<String>,
        missing_programs: Vec<String>,
        probe_output: String,
    }

    impl RecordingExecutor {
        fn failing(program: &str) -> Self {
            Self {
                fail_programs: vec![program.to_string()],
                probe_output: "2\n".to_string(),
                ..Self::default()
            }
        }
    }

    impl ProcessExecutor for RecordingExecutor {
        fn execute(&mut self, command: &AuxCommand, _working_dir: &Path) -> HighlightsResult<()> {
            self.calls.push(command.program().to_string());
            if self.fail_programs.iter().any(|p| p == command.program()) {
                return Err(HighlightsError::renderer(format!("{} exploded", command.program())));
            }
            Ok(())
        }

        fn run_renderer(&mut self, command: &AuxCommand, working_dir: &Path) -> HighlightsResult<()> {
            let result = self.execute(command, working_dir);
            if let Some(last) = self.calls.last_mut() {
                *last = format!("render:{last}");
            }
            result
        }

        fn capture(&mut self, command: &AuxCommand, _working_dir: &Path) -> HighlightsResult<String> {
            self.calls.push(format!("capture:{}", command.program()));
            Ok(self.probe_output.clone())
        }

        fn is_available(&self, program: &str) -> bool {
            !self.missing_programs.iter().any(|p| p == program)
        }
    }

    fn plan() -> RenderPlan {
        build_pipeline(&VideoProject::from_json_str(PROJECT).unwrap()).unwrap()
    }

    fn renderer(executor: RecordingExecutor) -> Renderer<RecordingExecutor> {
        Renderer::with_executor(executor, RendererConfig::default())
    }

    #[test]
    fn test_runs_pre_main_post_in_order() {
        let mut renderer = renderer(RecordingExecutor::failing("none"));
        let report = renderer.render(&plan(), Path::new(".")).unwrap();
        assert_eq!(
            renderer.executor().calls,
            vec!["capture:ffprobe", "sh", "sh", "render:ffmpeg", "rm", "rm"]
        );
        assert!(report.command_line.starts_with("ffmpeg -i op.jpg -i a.mp4 -i bgm.mp3"));
        assert!(report.cleanup_failures.is_empty());
    }

    #[test]
    fn test_renderer_failure_still_cleans_up() {
        let mut renderer = renderer(RecordingExecutor::failing("ffmpeg"));
        let err = renderer.render(&plan(), Path::new(".")).unwrap_err();
        assert!(matches!(err, HighlightsError::RendererExecution { .. }));
        assert_eq!(
            renderer.executor().calls,
            vec!["capture:ffprobe", "sh", "sh", "render:ffmpeg", "rm", "rm"]
        );
    }

    #[test]
    fn test_subtitle_write_failure_aborts_before_renderer() {
        let mut renderer = renderer(RecordingExecutor::failing("sh"));
        let err = renderer.render(&plan(), Path::new(".")).unwrap_err();
        match err {
            HighlightsError::SubtitleFile { path, .. } => {
                assert_eq!(path, PathBuf::from("op.op.srt"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            renderer.executor().calls,
            vec!["capture:ffprobe", "sh", "rm", "rm"]
        );
    }

    #[test]
    fn test_cleanup_failures_are_reported_not_fatal() {
        let mut renderer = renderer(RecordingExecutor::failing("rm"));
        let report = renderer.render(&plan(), Path::new(".")).unwrap();
        assert_eq!(report.cleanup_failures.len(), 2);
        assert!(report.cleanup_failures[0].contains("op.op.srt"));
    }

    #[test]
    fn test_missing_renderer_runs_nothing() {
        let mut executor = RecordingExecutor::failing("none");
        executor.missing_programs.push("ffmpeg".to_string());
        let mut renderer = renderer(executor);
        assert!(matches!(
            renderer.render(&plan(), Path::new(".")),
            Err(HighlightsError::RendererExecution { .. })
        ));
        assert!(renderer.executor().calls.is_empty());
    }

    #[test]
    fn test_mono_music_is_rejected() {
        let mut executor = RecordingExecutor::failing("none");
        executor.probe_output = "1\n".to_string();
        let mut renderer = renderer(executor);
        let err = renderer.render(&plan(), Path::new(".")).unwrap_err();
        assert!(matches!(err, HighlightsError::InvalidSegment { ref segment, .. } if segment == "bgm"));
        assert_eq!(renderer.executor().calls, vec!["capture:ffprobe"]);
    }

    #[test]
    fn test_music_check_can_be_disabled() {
        let mut executor = RecordingExecutor::failing("none");
        executor.probe_output = "6\n".to_string();
        let config = RendererConfig {
            verify_bgm_layout: false,
            ..RendererConfig::default()
        };
        let mut renderer = Renderer::with_executor(executor, config);
        renderer.render(&plan(), Path::new(".")).unwrap();
        assert!(!renderer.executor().calls.iter().any(|c| c.starts_with("capture")));
    }

    #[test]
    fn test_music_without_channel_count_is_assumed_stereo() {
        let mut executor = RecordingExecutor::failing("none");
        executor.probe_output = "garbage".to_string();
        let mut renderer = renderer(executor);
        assert!(renderer.render(&plan(), Path::new(".")).is_ok());
    }

    #[test]
    fn test_broken_graph_fails_before_side_effects() {
        let mut broken = plan();
        broken.graph = highlights_filter_graph::FilterGraph::new("out.mp4");
        let mut chain = highlights_filter_graph::FilterChain::new("x");
        chain.chain(highlights_filter_graph::filter::silence("1"));
        let id = broken.graph.add_chain(chain);
        broken.graph.map_output(id, 0).unwrap();
        broken.graph.map_output(id, 0).unwrap();

        let mut renderer = renderer(RecordingExecutor::failing("none"));
        assert!(renderer.render(&broken, Path::new(".")).is_err());
        assert!(renderer.executor().calls.is_empty());
    }

    #[test]
    fn test_guard_runs_on_drop() {
        let commands = vec![AuxCommand::new("rm", ["-f", "x.srt"])];
        let mut executor = RecordingExecutor::default();
        {
            let _guard = CleanupGuard::new(&mut executor, &commands, Path::new("."));
        }
        assert_eq!(executor.calls, vec!["rm"]);
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("highlights_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_system_executor_writes_and_removes_subtitle_file() {
        let dir = scratch_dir("artifact");
        let text = r#"-n 100% \done 'q' "dq" $HOME"#;
        let artifact = highlights_filter_graph::TempArtifact::write_file("cue.srt", text);
        let mut executor = SystemExecutor;

        executor.execute(artifact.create(), &dir).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("cue.srt")).unwrap(), text);

        executor.execute(artifact.remove(), &dir).unwrap();
        assert!(!dir.join("cue.srt").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_system_executor_reports_status_and_stderr_tail() {
        let failing = AuxCommand::new("sh", ["-c", "echo boom >&2; exit 3"]);
        let err = SystemExecutor
            .execute(&failing, Path::new("."))
            .unwrap_err();
        assert!(matches!(err, HighlightsError::RendererExecution { .. }));
        let message = err.to_string();
        assert!(message.contains("sh failed"), "{message}");
        assert!(message.contains('3'), "{message}");
        assert!(message.ends_with("boom"), "{message}");
    }

    #[test]
    fn test_renderer_progress_lines_end_the_tail() {
        let failing = AuxCommand::new("sh", ["-c", r"printf 'frame=1\rframe=2\n' >&2; exit 1"]);
        let err = SystemExecutor
            .run_renderer(&failing, Path::new("."))
            .unwrap_err();
        assert!(err.to_string().ends_with("frame=1\nframe=2"), "{err}");
    }

    #[test]
    fn test_drain_stderr_keeps_last_lines() {
        let input: String = (0..30).map(|i| format!("line {i}\r\n")).collect();
        let tail = drain_stderr(input.as_bytes(), "test", false);
        assert_eq!(tail.len(), STDERR_TAIL_LINES);
        assert_eq!(tail.front().map(String::as_str), Some("line 10"));
        assert_eq!(tail.back().map(String::as_str), Some("line 29"));
    }

    #[test]
    fn test_command_exists_for_shell() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-real-binary-xyz"));
    }
}
