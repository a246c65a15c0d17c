use super::{ExistingArtifact, ExistingChoice, Operator};
use crate::component::scene_matcher::ScoredCandidate;
use crate::config::NotifierSettings;
use crate::tools::MediaFile;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use reqwest::blocking::Client;
use rust_i18n::t;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// 把需要操作者回應的事件送到外部管道
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API `sendMessage`
pub struct TelegramNotifier {
    client: Client,
    settings: NotifierSettings,
}

impl TelegramNotifier {
    pub fn new(settings: &NotifierSettings) -> Result<Self> {
        if settings.bot_token.trim().is_empty() || settings.chat_id.trim().is_empty() {
            bail!("已啟用通知但尚未設定 bot_token 或 chat_id");
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

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.bot_token.trim()
        )
    }

    fn send_once(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&json!({
                "chat_id": self.settings.chat_id.trim(),
                "text": message,
            }))
            .send()
            .context("無法連線到 Telegram")?;
        let status = response.status();
        let body = response.text().context("無法讀取 Telegram 回應")?;
        parse_telegram_response(&body).with_context(|| format!("Telegram 回應錯誤 (HTTP {status})"))
    }
}

fn parse_telegram_response(body: &str) -> Result<()> {
    let response: TelegramResponse =
        serde_json::from_str(body).context("無法解析 Telegram 回應")?;
    if response.ok {
        Ok(())
    } else {
        bail!(
            "{}",
            response
                .description
                .unwrap_or_else(|| "未知的錯誤".to_string())
        )
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        let attempts = self.settings.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.send_once(message) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("通知失敗 ({attempt}/{attempts}): {e:#}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("通知失敗")))
    }
}

/// 每次提示前先送出通知，通知失敗不影響提示本身
pub struct NotifyingOperator<O, N> {
    inner: O,
    notifier: N,
}

impl<O: Operator, N: Notifier> NotifyingOperator<O, N> {
    #[must_use]
    pub const fn new(inner: O, notifier: N) -> Self {
        Self { inner, notifier }
    }

    fn alert(&self, message: &str) {
        if let Err(e) = self.notifier.notify(message) {
            warn!("無法送出通知: {e:#}");
        }
    }
}

impl<O: Operator, N: Notifier> Operator for NotifyingOperator<O, N> {
    fn existing_artifact(&self, artifact: &ExistingArtifact) -> Result<ExistingChoice> {
        self.alert(&t!(
            "notify.existing_artifact",
            kind = artifact.kind.as_str(),
            name = artifact.media_name
        ));
        self.inner.existing_artifact(artifact)
    }

    fn choose_scene(&self, query: &str, candidates: &[ScoredCandidate]) -> Result<Option<usize>> {
        self.alert(&t!(
            "notify.choose_scene",
            query = query,
            count = candidates.len()
        ));
        self.inner.choose_scene(query, candidates)
    }

    fn free_text_query(&self, media: &MediaFile) -> Result<Option<String>> {
        self.alert(&t!("notify.free_text_query", name = media.file_name()));
        self.inner.free_text_query(media)
    }
}
