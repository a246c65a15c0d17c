use super::{
    ArtifactGenerator, GenerateError, GenerationJob, path_arg, progress_callback,
    set_progress_length,
};
use crate::config::ReencodeSettings;
use crate::tools::{ArtifactKind, FfmpegRunner, VideoInfo};
use indicatif::ProgressBar;
use log::info;
use std::path::Path;

/// 重新編碼（預設 x265），來源已是高效率編碼時直接複製串流
pub struct ReencodedVideoGenerator {
    settings: ReencodeSettings,
    runner: FfmpegRunner,
}

impl ReencodedVideoGenerator {
    #[must_use]
    pub const fn new(settings: ReencodeSettings, runner: FfmpegRunner) -> Self {
        Self { settings, runner }
    }

    fn is_stream_copy(&self, info: &VideoInfo) -> bool {
        self.settings
            .copy_codecs
            .iter()
            .any(|codec| codec.eq_ignore_ascii_case(&info.codec_name))
    }

    /// 輸出串流確定是 HEVC 時才需要 hvc1 標籤
    fn outputs_hevc(&self, info: &VideoInfo) -> bool {
        if self.is_stream_copy(info) {
            info.codec_name.eq_ignore_ascii_case("hevc")
        } else {
            self.settings.video_codec == "libx265"
        }
    }

    fn build_args(&self, source: &Path, info: &VideoInfo, title: &str, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-i".to_string(),
            path_arg(source),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "0:a?".to_string(),
            "-sn".to_string(),
            "-dn".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
        ];
        if self.settings.remove_chapters {
            args.extend(["-map_chapters".to_string(), "-1".to_string()]);
        }
        if !title.is_empty() {
            args.extend(["-metadata".to_string(), format!("title={title}")]);
        }

        if self.is_stream_copy(info) {
            args.extend(["-c".to_string(), "copy".to_string()]);
        } else {
            if let Some(max_height) = self.settings.max_height
                && info.height > max_height
            {
                args.extend(["-vf".to_string(), format!("scale=-2:{max_height}")]);
            }
            args.extend([
                "-c:v".to_string(),
                self.settings.video_codec.clone(),
                "-crf".to_string(),
                self.settings.crf.to_string(),
                "-preset".to_string(),
                self.settings.preset.clone(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-c:a".to_string(),
                self.settings.audio_codec.clone(),
                "-b:a".to_string(),
                self.settings.audio_bitrate.clone(),
            ]);
            if self.settings.video_codec == "libx265" {
                args.extend(["-x265-params".to_string(), "log-level=error".to_string()]);
            }
        }

        if self.settings.container.eq_ignore_ascii_case("mp4") {
            if self.outputs_hevc(info) {
                args.extend(["-tag:v".to_string(), "hvc1".to_string()]);
            }
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.push(path_arg(output));
        args
    }
}

impl ArtifactGenerator for ReencodedVideoGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::ReencodedVideo
    }

    fn generate(
        &self,
        job: &GenerationJob<'_>,
        output: &Path,
        progress: &ProgressBar,
    ) -> Result<(), GenerateError> {
        let info = job.source_info()?;
        if self.is_stream_copy(info) {
            info!(
                "{} 已是 {}，直接複製串流",
                job.media.file_name(),
                info.codec_name
            );
        }

        set_progress_length(progress, info.duration_seconds);
        let args = self.build_args(&job.media.path, info, &job.scene.title, output);
        self.runner.run(&args, &progress_callback(progress))?;
        Ok(())
    }
}
