use super::run_report::StageKind;
use super::stages::{ReleaseStage, StageContext};
use crate::config::{OutputLayout, TorrentSettings};
use crate::tools::{ArtifactKind, CommitMode, Fingerprint, StagedOutput};
use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;

/// 種子檔內不收錄的檔案
const EXCLUDE_PATTERNS: &str = "*.torrent,.*.partial-*";

/// 呼叫 mktorrent 建立私有種子檔
pub struct MktorrentBuilder {
    settings: TorrentSettings,
}

impl MktorrentBuilder {
    #[must_use]
    pub const fn new(settings: TorrentSettings) -> Self {
        Self { settings }
    }

    /// 子資料夾模式打包整個輸出資料夾，同資料夾模式只打包影片
    fn content_path(context: &StageContext<'_>) -> PathBuf {
        match context.layout.layout() {
            OutputLayout::SubDirectory => context.output_dir(),
            OutputLayout::SameDirectory => context
                .artifact(ArtifactKind::ReencodedVideo)
                .cloned()
                .unwrap_or_else(|| context.media.path.clone()),
        }
    }

    fn torrent_path(&self, content: &Path) -> Result<PathBuf> {
        let Some(name) = content.file_name() else {
            bail!("無法取得種子名稱: {}", content.display());
        };
        let save_dir = match &self.settings.save_path {
            Some(dir) => dir.clone(),
            None => content
                .parent()
                .map(Path::to_path_buf)
                .with_context(|| format!("無法取得上層資料夾: {}", content.display()))?,
        };
        Ok(save_dir.join(format!(
            "{}{}.torrent",
            self.settings.name_prefix,
            name.to_string_lossy()
        )))
    }

    fn build_args(&self, content: &Path, output: &Path) -> Vec<String> {
        let name = content
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        vec![
            "-p".to_string(),
            "-f".to_string(),
            "-a".to_string(),
            self.settings.announce_url.clone(),
            "-l".to_string(),
            self.settings.piece_size_exponent.to_string(),
            "-e".to_string(),
            EXCLUDE_PATTERNS.to_string(),
            "-n".to_string(),
            name,
            "-o".to_string(),
            output.to_string_lossy().to_string(),
            content.to_string_lossy().to_string(),
        ]
    }
}

impl ReleaseStage for MktorrentBuilder {
    fn kind(&self) -> StageKind {
        StageKind::TorrentCreating
    }

    fn run(&self, context: &StageContext<'_>) -> Result<PathBuf> {
        if self.settings.announce_url.trim().is_empty() {
            bail!("尚未設定 announce URL");
        }
        let content = Self::content_path(context);
        if !content.exists() {
            bail!("種子內容不存在: {}", content.display());
        }

        let target = self.torrent_path(&content)?;
        let staged = StagedOutput::new(&target)?;
        let args = self.build_args(&content, staged.path());
        debug!("執行 {} {}", self.settings.mktorrent_path, args.join(" "));

        let output = Command::new(&self.settings.mktorrent_path)
            .args(&args)
            .output()
            .with_context(|| format!("無法執行 {}", self.settings.mktorrent_path))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "mktorrent 失敗 ({}): {}",
                output.status,
                stderr.lines().last().unwrap_or_default()
            );
        }

        let mode = match Fingerprint::of(&target) {
            Ok(existing) => CommitMode::Replace(existing),
            Err(_) => CommitMode::CreateNew,
        };
        let path = staged.commit(mode)?;
        info!("已建立種子檔: {}", path.display());
        Ok(path)
    }
}
