use super::run_report::StageKind;
use super::stages::{ReleaseStage, StageContext};
use crate::config::UploadSettings;
use crate::tools::{ArtifactKind, write_atomically};
use anyhow::{Context, Result, bail};
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::blocking::multipart::Form;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const OUTPUT_TAIL: &str = "_imgbb.txt";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadedImage>,
    error: Option<UploadFailure>,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadFailure {
    message: Option<String>,
}

/// 把封面與縮圖表上傳到圖床，網址寫入 `<base>_imgbb.txt`
pub struct ImgbbUploader {
    client: Client,
    settings: UploadSettings,
}

impl ImgbbUploader {
    pub fn new(settings: &UploadSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("已啟用圖片上傳但尚未設定圖床 API 金鑰");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("無法建立 HTTP client")?;
        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    fn selected<'a>(&self, context: &'a StageContext<'_>) -> Vec<(ArtifactKind, &'a PathBuf)> {
        let mut wanted = Vec::new();
        if self.settings.upload_cover {
            wanted.push(ArtifactKind::CoverImage);
        }
        if self.settings.upload_thumbnails {
            wanted.push(ArtifactKind::ThumbnailSheet);
        }
        wanted
            .into_iter()
            .filter_map(|kind| context.artifacts.get(&kind).map(|path| (kind, path)))
            .collect()
    }

    fn upload(&self, path: &Path) -> Result<String> {
        let form = Form::new()
            .text("key", self.settings.api_key.clone())
            .file("image", path)
            .with_context(|| format!("無法讀取圖片: {}", path.display()))?;

        let response = self
            .client
            .post(&self.settings.api_url)
            .multipart(form)
            .send()
            .with_context(|| format!("上傳失敗: {}", path.display()))?;
        let status = response.status();
        let body = response.text().context("無法讀取圖床回應")?;

        parse_upload_response(&body)
            .with_context(|| format!("圖床回應錯誤 (HTTP {status}): {}", path.display()))
    }
}

fn parse_upload_response(body: &str) -> Result<String> {
    let response: UploadResponse = serde_json::from_str(body).context("無法解析圖床回應")?;
    match response.data {
        Some(image) if response.success => Ok(image.url),
        _ => bail!(
            "{}",
            response
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "未知的錯誤".to_string())
        ),
    }
}

impl ReleaseStage for ImgbbUploader {
    fn kind(&self) -> StageKind {
        StageKind::Uploading
    }

    fn run(&self, context: &StageContext<'_>) -> Result<PathBuf> {
        let selected = self.selected(context);
        let mut lines = Vec::with_capacity(selected.len() + 1);
        lines.push(format!("# {}", context.media.base_name));

        if selected.is_empty() {
            warn!("{} 沒有可上傳的圖片", context.media.file_name());
        }
        for (kind, path) in selected {
            let url = self.upload(path)?;
            info!("已上傳 {kind}: {url}");
            lines.push(format!("{kind}={url}"));
        }

        let target = context.layout.sidecar_path(context.media, OUTPUT_TAIL);
        let content = lines.join("\n") + "\n";
        let path = write_atomically(&target, content.as_bytes())
            .with_context(|| format!("無法寫入上傳紀錄: {}", target.display()))?;
        Ok(path)
    }
}
