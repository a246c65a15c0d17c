//! 產物產生器
//!
//! 每個產生器把來源影片轉成一個產物檔案，輸出一律先寫到同資料夾的暫存檔，
//! 成功後才改名到正式路徑。
//!
//! 1. 重新編碼的影片
//! 2. 封面圖
//! 3. 縮圖表
//! 4. 動態預覽

mod animated_preview;
mod cover_image;
mod reencoded_video;
mod thumbnail_sheet;

pub use animated_preview::AnimatedPreviewGenerator;
pub use cover_image::{CoverImageGenerator, resolve_cover_timestamp};
pub use reencoded_video::ReencodedVideoGenerator;
pub use thumbnail_sheet::ThumbnailSheetGenerator;

use crate::component::scene_matcher::SceneRecord;
use crate::config::UserSettings;
use crate::tools::{
    ArtifactKind, CommitError, CommitMode, FfmpegError, FfmpegRunner, MediaFile, StagedOutput,
    VideoInfo, get_video_info,
};
use indicatif::ProgressBar;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    /// 無法啟動 ffmpeg 或缺少編碼器，只影響這個產物
    #[error("轉檔引擎無法使用: {0}")]
    TranscodeUnavailable(String),
    #[error("轉檔失敗: {0}")]
    TranscodeFailed(String),
    #[error("影片長度 {duration:.1} 秒不足以產生此產物（至少需要 {needed:.1} 秒）")]
    SourceTooShort { duration: f64, needed: f64 },
    #[error("輸出路徑已被佔用: {}", .0.display())]
    OutputPathConflict(PathBuf),
    #[error("已中斷")]
    Cancelled,
    /// 磁碟空間耗盡，整個批次停止排程
    #[error("磁碟空間不足: {0}")]
    StorageExhausted(String),
    #[error("檔案存取失敗: {0}")]
    Io(String),
}

impl GenerateError {
    #[must_use]
    pub const fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::StorageExhausted(_))
    }
}

impl From<FfmpegError> for GenerateError {
    fn from(error: FfmpegError) -> Self {
        match error {
            FfmpegError::NotFound(_) | FfmpegError::MissingComponent(_) => {
                Self::TranscodeUnavailable(error.to_string())
            }
            FfmpegError::StorageFull(msg) => Self::StorageExhausted(msg),
            FfmpegError::Cancelled => Self::Cancelled,
            FfmpegError::Failed { .. } => Self::TranscodeFailed(error.to_string()),
            FfmpegError::Io(e) => Self::from(e),
        }
    }
}

impl From<CommitError> for GenerateError {
    fn from(error: CommitError) -> Self {
        match error {
            CommitError::Conflict(path) => Self::OutputPathConflict(path),
            CommitError::Io { ref source, .. } if source.kind() == io::ErrorKind::StorageFull => {
                Self::StorageExhausted(error.to_string())
            }
            CommitError::Io { .. } => Self::Io(error.to_string()),
        }
    }
}

impl From<io::Error> for GenerateError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::StorageFull {
            Self::StorageExhausted(error.to_string())
        } else {
            Self::Io(error.to_string())
        }
    }
}

/// 讀取來源影片資訊
pub trait SourceProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoInfo, GenerateError>;
}

pub struct FfprobeProbe {
    program: String,
}

impl FfprobeProbe {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SourceProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<VideoInfo, GenerateError> {
        get_video_info(&self.program, path).map_err(|e| {
            let missing_binary = e.chain().any(|cause| {
                cause
                    .downcast_ref::<io::Error>()
                    .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
            });
            if missing_binary {
                GenerateError::TranscodeUnavailable(format!("{e:#}"))
            } else {
                GenerateError::TranscodeFailed(format!("{e:#}"))
            }
        })
    }
}

/// 單一來源影片的產生工作，四個產生器共用
pub struct GenerationJob<'a> {
    pub media: &'a MediaFile,
    pub scene: &'a SceneRecord,
    probe: &'a dyn SourceProbe,
    info: OnceLock<Result<VideoInfo, GenerateError>>,
}

impl<'a> GenerationJob<'a> {
    #[must_use]
    pub fn new(media: &'a MediaFile, scene: &'a SceneRecord, probe: &'a dyn SourceProbe) -> Self {
        Self {
            media,
            scene,
            probe,
            info: OnceLock::new(),
        }
    }

    /// 第一次呼叫時才執行 ffprobe，之後共用結果
    pub fn source_info(&self) -> Result<&VideoInfo, GenerateError> {
        self.info
            .get_or_init(|| self.probe.probe(&self.media.path))
            .as_ref()
            .map_err(Clone::clone)
    }
}

pub trait ArtifactGenerator: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    /// 將產物寫到 `output`（暫存路徑），不可碰觸正式路徑
    fn generate(
        &self,
        job: &GenerationJob<'_>,
        output: &Path,
        progress: &ProgressBar,
    ) -> Result<(), GenerateError>;
}

/// 產生到暫存檔後發佈到 `target`，任何失敗都不會在正式路徑留下檔案
pub fn produce_artifact(
    generator: &dyn ArtifactGenerator,
    job: &GenerationJob<'_>,
    target: &Path,
    mode: CommitMode,
    progress: &ProgressBar,
) -> Result<PathBuf, GenerateError> {
    let staged = StagedOutput::new(target)?;
    generator.generate(job, staged.path(), progress)?;
    Ok(staged.commit(mode)?)
}

/// 依設定建立啟用中的產生器
#[must_use]
pub fn build_generators(
    settings: &UserSettings,
    runner: &FfmpegRunner,
) -> Vec<Box<dyn ArtifactGenerator>> {
    let mut generators: Vec<Box<dyn ArtifactGenerator>> = Vec::new();
    if settings.reencode.enabled {
        generators.push(Box::new(ReencodedVideoGenerator::new(
            settings.reencode.clone(),
            runner.clone(),
        )));
    }
    if settings.cover.enabled {
        generators.push(Box::new(CoverImageGenerator::new(
            settings.cover.clone(),
            runner.clone(),
        )));
    }
    if settings.thumbnails.enabled {
        generators.push(Box::new(ThumbnailSheetGenerator::new(
            settings.thumbnails.clone(),
            runner.clone(),
        )));
    }
    if settings.preview.enabled {
        generators.push(Box::new(AnimatedPreviewGenerator::new(
            settings.preview.clone(),
            runner.clone(),
        )));
    }
    generators
}

/// 依影片長度設定進度條，單位為毫秒
pub(crate) fn set_progress_length(progress: &ProgressBar, seconds: f64) {
    progress.set_length((seconds.max(0.0) * 1000.0) as u64);
}

pub(crate) fn progress_callback(progress: &ProgressBar) -> impl Fn(f64) + '_ {
    move |seconds| progress.set_position((seconds.max(0.0) * 1000.0) as u64)
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
