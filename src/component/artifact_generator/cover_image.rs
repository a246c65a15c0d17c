use super::{ArtifactGenerator, GenerateError, GenerationJob, path_arg};
use crate::config::{CoverSettings, CoverTimestamp};
use crate::tools::{ArtifactKind, FfmpegRunner, split_seek};
use indicatif::ProgressBar;
use log::debug;
use std::path::Path;

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 擷取單一畫格作為封面
pub struct CoverImageGenerator {
    settings: CoverSettings,
    runner: FfmpegRunner,
}

/// 設定的時間點超出影片長度時改用備用時間點，再不行則取中間
#[must_use]
pub fn resolve_cover_timestamp(timestamp: CoverTimestamp, fallback: f64, duration: f64) -> f64 {
    let wanted = match timestamp {
        CoverTimestamp::Seconds(seconds) => seconds,
        CoverTimestamp::Percent(percent) => duration * percent / 100.0,
    };
    if (0.0..duration).contains(&wanted) {
        wanted
    } else if (0.0..duration).contains(&fallback) {
        fallback
    } else {
        duration / 2.0
    }
}

impl CoverImageGenerator {
    #[must_use]
    pub const fn new(settings: CoverSettings, runner: FfmpegRunner) -> Self {
        Self { settings, runner }
    }

    fn build_args(&self, source: &Path, timestamp: f64, output: &Path) -> Vec<String> {
        let (coarse, fine) = split_seek(timestamp, SEEK_MARGIN);
        let mut args = Vec::new();
        if coarse > 0.0 {
            args.extend(["-ss".to_string(), format!("{coarse:.3}")]);
        }
        args.extend(["-i".to_string(), path_arg(source)]);
        if fine > 0.0 {
            args.extend(["-ss".to_string(), format!("{fine:.3}")]);
        }
        args.extend(["-an".to_string(), "-sn".to_string(), "-dn".to_string()]);
        if let Some(width) = self.settings.width {
            args.extend(["-vf".to_string(), format!("scale={width}:-2")]);
        }
        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-update".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            path_arg(output),
        ]);
        args
    }
}

impl ArtifactGenerator for CoverImageGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::CoverImage
    }

    fn generate(
        &self,
        job: &GenerationJob<'_>,
        output: &Path,
        progress: &ProgressBar,
    ) -> Result<(), GenerateError> {
        let info = job.source_info()?;
        let timestamp = resolve_cover_timestamp(
            self.settings.timestamp,
            self.settings.fallback_seconds,
            info.duration_seconds,
        );
        debug!("封面時間點 {timestamp:.2}s: {}", job.media.file_name());

        progress.set_length(1);
        self.runner
            .run(&self.build_args(&job.media.path, timestamp, output), &|_| {})?;
        progress.inc(1);
        Ok(())
    }
}
