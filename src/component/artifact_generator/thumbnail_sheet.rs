use super::{ArtifactGenerator, GenerateError, GenerationJob, path_arg};
use crate::config::ThumbnailSettings;
use crate::tools::{
    ArtifactKind, FfmpegRunner, SheetHeader, SheetLayout, VideoInfo, create_contact_sheet,
    escape_filter_path, format_hms, max_sample_count, select_uniform_timestamps, split_seek,
};
use indicatif::ProgressBar;
use log::{debug, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 縮圖表：均勻取樣畫格後以 xstack 合併
pub struct ThumbnailSheetGenerator {
    settings: ThumbnailSettings,
    runner: FfmpegRunner,
}

/// 實際使用的欄列數與時間點
#[derive(Debug, Clone, PartialEq)]
struct SheetPlan {
    columns: u32,
    rows: u32,
    timestamps: Vec<f64>,
}

impl ThumbnailSheetGenerator {
    #[must_use]
    pub const fn new(settings: ThumbnailSettings, runner: FfmpegRunner) -> Self {
        Self { settings, runner }
    }

    /// 影片太短時整列減少，連一列都放不下則回報錯誤
    fn plan(&self, duration: f64) -> Result<SheetPlan, GenerateError> {
        let start = self.settings.start_margin_percent / 100.0;
        let end = self.settings.end_margin_percent / 100.0;
        let columns = self.settings.columns.max(1);

        let capacity = max_sample_count(duration, start, end, self.settings.min_frame_gap_seconds);
        let rows_fit = u32::try_from(capacity / columns as usize)
            .unwrap_or(u32::MAX)
            .min(self.settings.rows);

        if rows_fit == 0 {
            return Err(GenerateError::SourceTooShort {
                duration,
                needed: f64::from(columns) * self.settings.min_frame_gap_seconds
                    / (1.0 - start - end).max(f64::EPSILON),
            });
        }
        if rows_fit < self.settings.rows {
            warn!(
                "影片過短，縮圖表由 {} 列減為 {rows_fit} 列",
                self.settings.rows
            );
        }

        let timestamps =
            select_uniform_timestamps(duration, (columns * rows_fit) as usize, start, end);
        Ok(SheetPlan {
            columns,
            rows: rows_fit,
            timestamps,
        })
    }

    fn frame_filter(&self, timestamp: f64) -> String {
        let (w, h) = (self.settings.tile_width, self.settings.tile_height);
        let mut filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black"
        );
        if self.settings.show_timestamps {
            let font = self
                .settings
                .font_file
                .as_ref()
                .map(|f| format!("fontfile='{}':", escape_filter_path(f)))
                .unwrap_or_default();
            let size = (h / 10).max(10);
            filter.push_str(&format!(
                ",drawtext={font}text='{}':fontsize={size}:fontcolor=white:\
                 box=1:boxcolor=black@0.5:boxborderw=4:x=w-tw-8:y=h-th-8",
                format_hms(timestamp).replace(':', "\\:")
            ));
        }
        filter
    }

    fn extract_frame(
        &self,
        source: &Path,
        timestamp: f64,
        output: &Path,
    ) -> Result<(), GenerateError> {
        let (coarse, fine) = split_seek(timestamp, SEEK_MARGIN);
        let mut args = Vec::new();
        if coarse > 0.0 {
            args.extend(["-ss".to_string(), format!("{coarse:.3}")]);
        }
        args.extend(["-i".to_string(), path_arg(source)]);
        if fine > 0.0 {
            args.extend(["-ss".to_string(), format!("{fine:.3}")]);
        }
        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-an".to_string(),
            "-sn".to_string(),
            "-dn".to_string(),
            "-threads".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            self.frame_filter(timestamp),
            "-update".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            path_arg(output),
        ]);
        self.runner.run(&args, &|_| {})?;
        Ok(())
    }

    fn header_lines(job: &GenerationJob<'_>, info: &VideoInfo) -> Vec<String> {
        let scene = job.scene;
        let mut lines = vec![if scene.title.is_empty() {
            job.media.file_name()
        } else {
            scene.title.clone()
        }];

        let mut details = Vec::new();
        if let Some(studio) = &scene.studio {
            details.push(studio.clone());
        }
        if let Some(date) = scene.release_date {
            details.push(date.to_string());
        }
        if !scene.performers.is_empty() {
            details.push(scene.performers.join(", "));
        }
        if !details.is_empty() {
            lines.push(details.join(" | "));
        }

        let size_mb = fs::metadata(&job.media.path)
            .map(|m| m.len() as f64 / 1024.0 / 1024.0)
            .unwrap_or_default();
        lines.push(format!(
            "{} | {} | {} | {:.2} fps | {size_mb:.1} MB",
            format_hms(info.duration_seconds),
            info.resolution(),
            info.codec_name,
            info.frame_rate,
        ));
        lines
    }
}

impl ArtifactGenerator for ThumbnailSheetGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::ThumbnailSheet
    }

    fn generate(
        &self,
        job: &GenerationJob<'_>,
        output: &Path,
        progress: &ProgressBar,
    ) -> Result<(), GenerateError> {
        let info = job.source_info()?;
        let plan = self.plan(info.duration_seconds)?;
        debug!(
            "縮圖表 {}x{}，共 {} 個時間點",
            plan.columns,
            plan.rows,
            plan.timestamps.len()
        );

        progress.set_length(plan.timestamps.len() as u64 + 1);
        let work_dir = TempDir::new()?;

        let tiles: Vec<PathBuf> = plan
            .timestamps
            .par_iter()
            .enumerate()
            .map(|(i, &timestamp)| {
                let tile = work_dir.path().join(format!("thumb_{i:03}.jpg"));
                self.extract_frame(&job.media.path, timestamp, &tile)?;
                progress.inc(1);
                Ok(tile)
            })
            .collect::<Result<_, GenerateError>>()?;

        let header = if self.settings.show_label {
            let lines = Self::header_lines(job, info);
            let text_file = work_dir.path().join("header.txt");
            fs::write(&text_file, lines.join("\n"))?;
            Some(SheetHeader {
                text_file,
                line_count: lines.len() as u32,
                font_file: self.settings.font_file.clone(),
                font_size: self.settings.font_size,
            })
        } else {
            None
        };

        let layout = SheetLayout {
            columns: plan.columns,
            rows: plan.rows,
            tile_width: self.settings.tile_width,
            tile_height: self.settings.tile_height,
            header,
        };
        create_contact_sheet(&self.runner, &tiles, output, &layout)?;
        progress.inc(1);
        Ok(())
    }
}
