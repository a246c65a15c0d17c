use super::{
    ArtifactGenerator, GenerateError, GenerationJob, path_arg, progress_callback,
    set_progress_length,
};
use crate::config::{PreviewFormat, PreviewSettings};
use crate::tools::{ArtifactKind, ClipSlot, FfmpegRunner, select_clip_slots};
use indicatif::ProgressBar;
use log::{debug, warn};
use std::path::Path;

/// 動態預覽：從影片各段擷取短片段，以轉場串接成一個短片
pub struct AnimatedPreviewGenerator {
    settings: PreviewSettings,
    runner: FfmpegRunner,
}

impl AnimatedPreviewGenerator {
    #[must_use]
    pub const fn new(settings: PreviewSettings, runner: FfmpegRunner) -> Self {
        Self { settings, runner }
    }

    fn slots(&self, duration: f64) -> Result<Vec<ClipSlot>, GenerateError> {
        let wanted = self.settings.clip_count as usize;
        let slots = select_clip_slots(
            duration,
            wanted,
            self.settings.clip_seconds,
            self.settings.start_margin_percent / 100.0,
            self.settings.end_safety_seconds,
        );
        if slots.is_empty() {
            return Err(GenerateError::SourceTooShort {
                duration,
                needed: self.settings.clip_seconds + self.settings.end_safety_seconds,
            });
        }
        if slots.len() < wanted {
            warn!("影片過短，預覽片段由 {wanted} 段減為 {} 段", slots.len());
        }
        Ok(slots)
    }

    /// 實際使用的轉場長度，不超過最短片段的一半
    fn transition_seconds(&self, slots: &[ClipSlot]) -> Option<(&'static str, f64)> {
        let name = self.settings.transition.xfade_name()?;
        if slots.len() < 2 {
            return None;
        }
        let shortest = slots
            .iter()
            .map(|s| s.length)
            .fold(f64::INFINITY, f64::min);
        let seconds = self.settings.transition_seconds.min(shortest / 2.0);
        (seconds > 0.0).then_some((name, seconds))
    }

    /// 輸出總長度：片段總和扣掉重疊的轉場
    fn output_length(&self, slots: &[ClipSlot]) -> f64 {
        let total: f64 = slots.iter().map(|s| s.length).sum();
        match self.transition_seconds(slots) {
            Some((_, d)) => total - d * (slots.len() - 1) as f64,
            None => total,
        }
    }

    fn filter_graph(&self, slots: &[ClipSlot]) -> String {
        let mut parts: Vec<String> = slots
            .iter()
            .enumerate()
            .map(|(i, _)| {
                format!(
                    "[{i}:v:0]fps={},scale=-2:{},setsar=1,format=yuv420p,settb=AVTB,setpts=PTS-STARTPTS[c{i}]",
                    self.settings.fps, self.settings.height
                )
            })
            .collect();

        match self.transition_seconds(slots) {
            Some((name, d)) => {
                let mut previous = "c0".to_string();
                let mut elapsed = slots[0].length;
                for (k, slot) in slots.iter().enumerate().skip(1) {
                    // offset 為目前輸出長度扣掉轉場長度
                    let offset = elapsed - k as f64 * d;
                    let label = if k == slots.len() - 1 {
                        "out".to_string()
                    } else {
                        format!("x{k}")
                    };
                    parts.push(format!(
                        "[{previous}][c{k}]xfade=transition={name}:duration={d:.3}:offset={offset:.3}[{label}]"
                    ));
                    previous = label;
                    elapsed += slot.length;
                }
            }
            None => {
                let inputs: String = (0..slots.len()).map(|i| format!("[c{i}]")).collect();
                parts.push(format!("{inputs}concat=n={}:v=1:a=0[out]", slots.len()));
            }
        }
        parts.join(";")
    }

    fn encoder_args(&self) -> Vec<String> {
        let args: &[&str] = match self.settings.format {
            PreviewFormat::Mp4 => &[
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "26",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ],
            PreviewFormat::Webm => &[
                "-c:v",
                "libvpx-vp9",
                "-b:v",
                "0",
                "-crf",
                "36",
                "-row-mt",
                "1",
                "-pix_fmt",
                "yuv420p",
            ],
            PreviewFormat::Webp => &[
                "-c:v",
                "libwebp",
                "-lossless",
                "0",
                "-q:v",
                "70",
                "-loop",
                "0",
            ],
        };
        args.iter().map(ToString::to_string).collect()
    }

    fn build_args(&self, source: &Path, slots: &[ClipSlot], output: &Path) -> Vec<String> {
        let mut args = Vec::new();
        for slot in slots {
            args.extend([
                "-ss".to_string(),
                format!("{:.3}", slot.start),
                "-t".to_string(),
                format!("{:.3}", slot.length),
                "-i".to_string(),
                path_arg(source),
            ]);
        }
        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(slots),
            "-map".to_string(),
            "[out]".to_string(),
            "-an".to_string(),
        ]);
        args.extend(self.encoder_args());
        args.push(path_arg(output));
        args
    }
}

impl ArtifactGenerator for AnimatedPreviewGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::AnimatedPreview
    }

    fn generate(
        &self,
        job: &GenerationJob<'_>,
        output: &Path,
        progress: &ProgressBar,
    ) -> Result<(), GenerateError> {
        let info = job.source_info()?;
        let slots = self.slots(info.duration_seconds)?;
        debug!(
            "預覽片段: {}",
            slots
                .iter()
                .map(|s| format!("{:.1}+{:.1}", s.start, s.length))
                .collect::<Vec<_>>()
                .join(", ")
        );

        set_progress_length(progress, self.output_length(&slots));
        let args = self.build_args(&job.media.path, &slots, output);
        self.runner.run(&args, &progress_callback(progress))?;
        Ok(())
    }
}
