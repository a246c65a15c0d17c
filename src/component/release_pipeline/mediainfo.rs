use super::run_report::StageKind;
use super::stages::{ReleaseStage, StageContext};
use crate::config::MediainfoSettings;
use crate::tools::{ArtifactKind, write_atomically};
use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::PathBuf;
use std::process::Command;

const OUTPUT_TAIL: &str = "_mediainfo.txt";

/// 以 mediainfo 產生 `<base>_mediainfo.txt`，範本的 `{{MEDIAINFO}}` 取自這裡
pub struct MediainfoReporter {
    settings: MediainfoSettings,
}

impl MediainfoReporter {
    #[must_use]
    pub const fn new(settings: MediainfoSettings) -> Self {
        Self { settings }
    }

    /// 優先描述重新編碼後的影片
    fn subject(context: &StageContext<'_>) -> PathBuf {
        context
            .artifact(ArtifactKind::ReencodedVideo)
            .cloned()
            .unwrap_or_else(|| context.media.path.clone())
    }
}

impl ReleaseStage for MediainfoReporter {
    fn kind(&self) -> StageKind {
        StageKind::Mediainfo
    }

    fn run(&self, context: &StageContext<'_>) -> Result<PathBuf> {
        let subject = Self::subject(context);
        debug!("執行 {} {}", self.settings.mediainfo_path, subject.display());

        let output = Command::new(&self.settings.mediainfo_path)
            .arg(&subject)
            .output()
            .with_context(|| format!("無法執行 {}", self.settings.mediainfo_path))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "mediainfo 失敗 ({}): {}",
                output.status,
                stderr.lines().last().unwrap_or_default()
            );
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            bail!("mediainfo 沒有輸出: {}", subject.display());
        }

        let target = context.layout.sidecar_path(context.media, OUTPUT_TAIL);
        let path = write_atomically(&target, &output.stdout)
            .with_context(|| format!("無法寫入 mediainfo: {}", target.display()))?;
        info!("已產生 mediainfo: {}", path.display());
        Ok(path)
    }
}
