//! Translation of a project document into a wired filter graph.
//!
//! Chain order in the rendered graph is part of the contract:
//! opening (video, audio), closing (video, audio), each clip (video,
//! audio), the concat chain, then the music merge chain. Input indices
//! follow the same order with the music file last.

use std::path::PathBuf;

use highlights_common::config::RendererConfig;
use highlights_common::error::HighlightsResult;
use highlights_filter_graph::filter;
use highlights_filter_graph::{
    subtitle_artifact, subtitle_path, ChainId, FilterChain, FilterGraph, StreamKind, SubtitleCue,
};
use highlights_project_model::project::{ClipSegment, ImageSegment, Segment, VideoProject};
use highlights_project_model::timestamp::{format_seconds, Timestamp};

/// Pixel format every image segment is converted to before concat.
const PIXEL_FORMAT: &str = "yuv420p";

/// Labels of the concat chain outputs.
pub const CONCAT_VIDEO_LABEL: &str = "outv";
pub const CONCAT_AUDIO_LABEL: &str = "outa";

/// Label of the music merge chain output.
pub const MERGED_AUDIO_LABEL: &str = "outa_merged_bgm";

/// A built graph plus what the runner needs to know about it.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub graph: FilterGraph,

    /// Number of segments joined by the concat filter.
    pub segment_count: usize,

    /// Music file mixed into the final audio, as written in the project.
    pub background_music: Option<PathBuf>,
}

/// Builds a [`RenderPlan`] from a [`VideoProject`].
///
/// The music merge needs both the music and the concatenated track in
/// stereo: `amerge` yields four channels and `pan` sums 0+2 and 1+3.
/// Every segment audio chain ends in `aformat=channel_layouts=stereo`,
/// and the runner checks the music layout before rendering.
#[derive(Debug, Clone)]
pub struct PipelineBuilder<'a> {
    project: &'a VideoProject,
    global_args: Vec<String>,
    output_args: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct SegmentStreams {
    video: ChainId,
    audio: ChainId,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(project: &'a VideoProject) -> Self {
        Self {
            project,
            global_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Take global and output arguments from the renderer config.
    pub fn with_renderer_config(mut self, config: &RendererConfig) -> Self {
        self.global_args = config.global_args();
        self.output_args = config.output_args.clone();
        self
    }

    pub fn build(self) -> HighlightsResult<RenderPlan> {
        let project = self.project;
        project.validate()?;

        let mut graph = FilterGraph::new(&project.output.file);
        graph.set_global_args(self.global_args.clone());
        graph.set_output_args(self.output_args.clone());

        let segments = project.segments();
        let mut streams: Vec<Option<SegmentStreams>> = vec![None; segments.len()];

        // Still images first (opening, then closing), then clips.
        for (position, segment) in segments.iter().enumerate() {
            if let Segment::Opening(image) | Segment::Closing(image) = segment {
                streams[position] = Some(self.build_image(&mut graph, segment, image)?);
            }
        }
        for (position, segment) in segments.iter().enumerate() {
            if let Segment::Clip { clip, .. } = segment {
                streams[position] = Some(self.build_clip(&mut graph, segment, clip)?);
            }
        }

        let timeline: Vec<SegmentStreams> = streams.into_iter().flatten().collect();
        let concat = build_concat(&mut graph, &timeline)?;

        let final_audio = match &project.background_music {
            Some(music) => build_music_merge(&mut graph, music, concat)?,
            None => (concat, 1),
        };

        graph.map_output(concat, 0)?;
        graph.map_output(final_audio.0, final_audio.1)?;

        tracing::info!(
            segments = timeline.len(),
            inputs = graph.inputs().len(),
            chains = graph.chains().len(),
            temp_files = graph.temp_artifacts().len(),
            background_music = project.background_music.is_some(),
            "Pipeline built"
        );

        Ok(RenderPlan {
            graph,
            segment_count: timeline.len(),
            background_music: project.background_music.clone(),
        })
    }

    fn build_image(
        &self,
        graph: &mut FilterGraph,
        segment: &Segment<'_>,
        image: &ImageSegment,
    ) -> HighlightsResult<SegmentStreams> {
        let output = &self.project.output;
        let tag = segment.tag();
        let input = graph.declare_input(&image.file);

        let frames = (image.duration_secs * f64::from(output.fps)).round() as u64;
        let mut video = FilterChain::new(format!("{tag}_v"));
        video.add_source_input(graph, input, StreamKind::Video, 0)?;
        video
            .chain(filter::fps(output.fps))
            .chain(filter::loop_frames(frames))
            .chain(filter::scale_fit(output.width, output.height))
            .chain(filter::pad_center(output.width, output.height))
            .chain(filter::square_pixels())
            .chain(filter::pixel_format(PIXEL_FORMAT));

        if let Some(caption) = image.caption() {
            let path = subtitle_path(&image.file, &tag);
            let cue = SubtitleCue {
                start: Timestamp::ZERO,
                end: Timestamp::from_secs_f64(image.duration_secs),
                text: caption.text.to_string(),
            };
            graph.add_temp_artifact(subtitle_artifact(&path, cue));
            video.chain(filter::subtitles(&path, caption.font_size));
        }

        video.chain(filter::fade_out(
            &format_seconds(image.fade_out_start_secs()),
            &format_seconds(image.fade_out_secs),
        ));

        let mut audio = FilterChain::new(format!("{tag}_a"));
        audio
            .chain(filter::silence(&format_seconds(image.duration_secs)))
            .chain(filter::stereo_layout());

        tracing::debug!(
            segment = %segment.name(),
            input = input.index(),
            frames,
            subtitle = image.caption().is_some(),
            "Image segment wired"
        );

        Ok(SegmentStreams {
            video: graph.add_chain(video),
            audio: graph.add_chain(audio),
        })
    }

    fn build_clip(
        &self,
        graph: &mut FilterGraph,
        segment: &Segment<'_>,
        clip: &ClipSegment,
    ) -> HighlightsResult<SegmentStreams> {
        let output = &self.project.output;
        let name = segment.name();
        let tag = segment.tag();
        let input = graph.declare_input(&clip.file);

        let mut video = FilterChain::new(format!("{tag}_v"));
        video.add_source_input(graph, input, StreamKind::Video, 0)?;
        video
            .chain(filter::scale_fit(output.width, output.height))
            .chain(filter::pad_center(output.width, output.height))
            .chain(filter::square_pixels());

        let mut audio = FilterChain::new(format!("{tag}_a"));
        audio.add_source_input(graph, input, StreamKind::Audio, 0)?;

        let trimmed = clip.is_trimmed();
        let span = if trimmed {
            let range = clip.trim_range().map_err(|e| e.in_segment(&name))?;
            for (chain, kind) in [(&mut video, StreamKind::Video), (&mut audio, StreamKind::Audio)] {
                chain
                    .chain(filter::trim(kind, range.start, range.end))
                    .chain(filter::reset_timestamps(kind));
            }
            range.span()
        } else {
            None
        };
        audio.chain(filter::stereo_layout());

        if let Some(caption) = clip.caption() {
            let path = subtitle_path(&clip.file, &tag);
            let cue = SubtitleCue {
                start: Timestamp::ZERO,
                end: span,
                text: caption.text.to_string(),
            };
            graph.add_temp_artifact(subtitle_artifact(&path, cue));
            video.chain(filter::subtitles(&path, caption.font_size));
        }

        tracing::debug!(
            segment = %name,
            input = input.index(),
            trimmed,
            subtitle = clip.caption().is_some(),
            "Clip segment wired"
        );

        Ok(SegmentStreams {
            video: graph.add_chain(video),
            audio: graph.add_chain(audio),
        })
    }
}

/// Build a plan with default arguments.
pub fn build_pipeline(project: &VideoProject) -> HighlightsResult<RenderPlan> {
    PipelineBuilder::new(project).build()
}

/// Concat chain over `[v0][a0][v1][a1]...` in timeline order.
fn build_concat(graph: &mut FilterGraph, timeline: &[SegmentStreams]) -> HighlightsResult<ChainId> {
    let mut concat = FilterChain::with_labels([CONCAT_VIDEO_LABEL, CONCAT_AUDIO_LABEL]);
    for streams in timeline {
        concat.add_upstream_input(graph, streams.video, 0)?;
        concat.add_upstream_input(graph, streams.audio, 0)?;
    }
    concat.chain(filter::concat(timeline.len(), 1, 1));
    Ok(graph.add_chain(concat))
}

/// Mix the music under the concatenated audio. Returns the output to map.
fn build_music_merge(
    graph: &mut FilterGraph,
    music: &std::path::Path,
    concat: ChainId,
) -> HighlightsResult<(ChainId, usize)> {
    let input = graph.declare_input(music);
    let mut merge = FilterChain::new(MERGED_AUDIO_LABEL);
    merge.add_source_input(graph, input, StreamKind::Audio, 0)?;
    merge.add_upstream_input(graph, concat, 1)?;
    merge
        .chain(filter::amerge(2))
        .chain(filter::pan_sum_to_stereo());
    Ok((graph.add_chain(merge), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlights_common::error::HighlightsError;
    use highlights_project_model::project::{OutputSpec, DEFAULT_FONT_SIZE};
    use proptest::prelude::*;

    fn clip(file: &str, start: &str, end: &str) -> ClipSegment {
        ClipSegment {
            file: PathBuf::from(file),
            start: start.to_string(),
            end: end.to_string(),
            subtitle: String::new(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    fn image(file: &str, duration: f64, fade: f64) -> ImageSegment {
        ImageSegment {
            file: PathBuf::from(file),
            duration_secs: duration,
            fade_out_secs: fade,
            subtitle: String::new(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    fn project(clips: Vec<ClipSegment>) -> VideoProject {
        VideoProject {
            opening: Some(image("op.jpg", 5.0, 1.0)),
            closing: Some(image("ed.jpg", 4.0, 2.0)),
            clips,
            background_music: Some(PathBuf::from("bgm.mp3")),
            output: OutputSpec {
                file: PathBuf::from("out.mp4"),
                width: 1280,
                height: 720,
                fps: 30,
            },
        }
    }

    fn filter_text(plan: &RenderPlan) -> String {
        plan.graph.filter_complex().unwrap()
    }

    #[test]
    fn test_image_chains() {
        let plan = build_pipeline(&project(vec![])).unwrap();
        let chains: Vec<String> = filter_text(&plan).split(';').map(String::from).collect();
        assert_eq!(
            chains[0],
            "[0:v:0]fps=30,loop=loop=150:size=1,scale=1280:720:force_original_aspect_ratio=decrease,\
             pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1:1,format=pix_fmts=yuv420p,fade=t=out:st=4:d=1[op_v]"
        );
        assert_eq!(chains[1], "aevalsrc=0:d=5,aformat=channel_layouts=stereo[op_a]");
        assert!(chains[2].starts_with("[1:v:0]fps=30,loop=loop=120:size=1,"));
        assert!(chains[2].ends_with("fade=t=out:st=2:d=2[ed_v]"));
        assert_eq!(chains[3], "aevalsrc=0:d=4,aformat=channel_layouts=stereo[ed_a]");
    }

    #[test]
    fn test_clip_chains_with_trim() {
        let plan = build_pipeline(&project(vec![clip("a.mp4", "00:00:05", "00:00:10.5")])).unwrap();
        let text = filter_text(&plan);
        assert!(text.contains(
            "[2:v:0]scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,\
             setsar=1:1,trim=start=5:end=10.5,setpts=PTS-STARTPTS[clip_00_v]"
        ));
        assert!(text.contains("[2:a:0]atrim=start=5:end=10.5,asetpts=PTS-STARTPTS,aformat=channel_layouts=stereo[clip_00_a]"));
    }

    #[test]
    fn test_equal_bounds_skip_trim() {
        let plan = build_pipeline(&project(vec![clip("a.mp4", "00:00:05", "00:00:05")])).unwrap();
        let text = filter_text(&plan);
        assert!(!text.contains("trim="));
        assert!(text.contains("[2:a:0]aformat=channel_layouts=stereo[clip_00_a]"));
    }

    #[test]
    fn test_start_only_and_end_only_trims() {
        let plan = build_pipeline(&project(vec![
            clip("a.mp4", "00:00:05", ""),
            clip("b.mp4", "", "00:00:03"),
        ]))
        .unwrap();
        let text = filter_text(&plan);
        assert!(text.contains("trim=start=5,setpts"));
        assert!(text.contains("atrim=start=5,asetpts"));
        assert!(text.contains("trim=end=3,setpts"));
        assert!(text.contains("atrim=end=3,asetpts"));
    }

    #[test]
    fn test_concat_and_music_merge() {
        let plan = build_pipeline(&project(vec![
            clip("a.mp4", "", ""),
            clip("b.mp4", "", ""),
        ]))
        .unwrap();
        let text = filter_text(&plan);
        assert!(text.contains(
            "[op_v][op_a][clip_00_v][clip_00_a][clip_01_v][clip_01_a][ed_v][ed_a]concat=n=4:v=1:a=1[outv][outa]"
        ));
        assert!(text.ends_with("[4:a:0][outa]amerge=inputs=2,pan=stereo|c0<c0+c2|c1<c1+c3[outa_merged_bgm]"));
        assert_eq!(plan.segment_count, 4);

        let args = plan.graph.serialize().unwrap();
        let maps: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(maps, vec!["[outv]", "[outa_merged_bgm]"]);
    }

    #[test]
    fn test_every_segment_audio_is_stereo_before_merge() {
        let plan = build_pipeline(&project(vec![
            clip("a.mp4", "00:00:01", "00:00:02"),
            clip("b.mp4", "", ""),
        ]))
        .unwrap();
        let graph = &plan.graph;
        let audio_chains: Vec<_> = graph
            .chains()
            .iter()
            .filter(|chain| chain.labels().len() == 1 && chain.labels()[0].ends_with("_a"))
            .collect();
        assert_eq!(audio_chains.len(), 4);
        for chain in audio_chains {
            let last = chain.filters().last().unwrap();
            assert_eq!(last.to_string(), "aformat=channel_layouts=stereo", "{}", chain.describe());
        }
    }

    #[test]
    fn test_without_music_maps_concat_audio() {
        let mut p = project(vec![clip("a.mp4", "", "")]);
        p.background_music = None;
        let plan = build_pipeline(&p).unwrap();
        assert!(!filter_text(&plan).contains("amerge"));
        let args = plan.graph.serialize().unwrap();
        assert!(args.ends_with(&[
            "-map".to_string(),
            "[outv]".to_string(),
            "-map".to_string(),
            "[outa]".to_string(),
            "out.mp4".to_string()
        ]));
    }

    #[test]
    fn test_absent_opening_and_closing_reduce_segment_count() {
        let mut p = project(vec![clip("a.mp4", "00:00:05", "00:00:10")]);
        p.opening = None;
        p.closing = None;
        let plan = build_pipeline(&p).unwrap();
        let text = filter_text(&plan);
        assert!(text.contains("[clip_00_v][clip_00_a]concat=n=1:v=1:a=1[outv][outa]"));
        assert!(!text.contains("op_v"));
        assert_eq!(plan.graph.inputs()[0], PathBuf::from("a.mp4"));
    }

    #[test]
    fn test_repeated_clip_file_gets_fresh_inputs() {
        let plan = build_pipeline(&project(vec![
            clip("a.mp4", "0", "1"),
            clip("a.mp4", "2", "3"),
        ]))
        .unwrap();
        let inputs = plan.graph.inputs();
        assert_eq!(inputs[2], inputs[3]);
        let text = filter_text(&plan);
        assert!(text.contains("[2:v:0]"));
        assert!(text.contains("[3:v:0]"));
    }

    #[test]
    fn test_subtitles_create_paired_artifacts() {
        let mut p = project(vec![clip("a.mp4", "00:00:05", "00:00:10")]);
        p.opening.as_mut().unwrap().subtitle = "Good times".to_string();
        p.clips[0].subtitle = "Maomi".to_string();
        p.clips[0].font_size = 40;

        let plan = build_pipeline(&p).unwrap();
        let graph = &plan.graph;
        assert_eq!(graph.pre_commands().len(), 2);
        assert_eq!(graph.post_commands().len(), 2);
        for (pre, post) in graph.pre_commands().iter().zip(graph.post_commands()) {
            assert!(pre.artifact().is_some());
            assert_eq!(pre.artifact(), post.artifact());
        }

        let paths: Vec<PathBuf> = graph
            .temp_artifacts()
            .iter()
            .map(|a| a.path().to_path_buf())
            .collect();
        assert_eq!(paths, vec![PathBuf::from("op.op.srt"), PathBuf::from("a.clip_00.srt")]);

        let text = filter_text(&plan);
        assert!(text.contains(
            "format=pix_fmts=yuv420p,subtitles='op.op.srt':force_style='Fontsize=24',fade=t=out:st=4:d=1[op_v]"
        ));
        assert!(text.contains(
            "setpts=PTS-STARTPTS,subtitles='a.clip_00.srt':force_style='Fontsize=40'[clip_00_v]"
        ));

        let clip_srt = &graph.temp_artifacts()[1].create().args()[3];
        assert_eq!(clip_srt, "1\n00:00:00,000 --> 00:00:05,000\nMaomi\n\n");
    }

    #[test]
    fn test_invalid_timestamp_aborts_build() {
        let err = build_pipeline(&project(vec![clip("a.mp4", "00:00:05", "00:77:00")])).unwrap_err();
        assert!(matches!(err, HighlightsError::InvalidTimestamp { .. }));
        assert!(err.to_string().contains("clip 0"));
    }

    #[test]
    fn test_invalid_fade_aborts_build() {
        let mut p = project(vec![]);
        p.closing.as_mut().unwrap().fade_out_secs = 4.0;
        assert!(matches!(
            build_pipeline(&p),
            Err(HighlightsError::InvalidSegment { ref segment, .. }) if segment == "closing"
        ));
    }

    #[test]
    fn test_renderer_config_args() {
        let config = RendererConfig {
            output_args: vec!["-c:v".to_string(), "libx264".to_string()],
            ..RendererConfig::default()
        };
        let plan = PipelineBuilder::new(&project(vec![]))
            .with_renderer_config(&config)
            .build()
            .unwrap();
        let args = plan.graph.serialize().unwrap();
        assert_eq!(&args[..2], ["-hide_banner", "-y"]);
        assert_eq!(&args[args.len() - 3..], ["-c:v", "libx264", "out.mp4"]);
    }

    proptest! {
        #[test]
        fn prop_concat_interleaves_segments(
            clip_count in 0usize..8,
            with_opening in any::<bool>(),
            with_closing in any::<bool>(),
        ) {
            let mut p = project(
                (0..clip_count).map(|i| clip(&format!("{i}.mp4"), "", "")).collect(),
            );
            if !with_opening {
                p.opening = None;
            }
            if !with_closing {
                p.closing = None;
            }
            prop_assume!(with_opening || with_closing || clip_count > 0);

            let plan = build_pipeline(&p).unwrap();
            let expected_n = clip_count + usize::from(with_opening) + usize::from(with_closing);
            prop_assert_eq!(plan.segment_count, expected_n);

            let mut pads = String::new();
            if with_opening {
                pads.push_str("[op_v][op_a]");
            }
            for i in 0..clip_count {
                pads.push_str(&format!("[clip_{i:02}_v][clip_{i:02}_a]"));
            }
            if with_closing {
                pads.push_str("[ed_v][ed_a]");
            }
            let expected = format!("{pads}concat=n={expected_n}:v=1:a=1[outv][outa]");
            let text = filter_text(&plan);
            prop_assert!(text.contains(&expected), "{} missing from {}", expected, text);
        }
    }
}
