use crate::config::types::{Config, StoredApiKeys, UserSettings};
use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::Path;

/// 覆寫 `matcher.api_key` 的環境變數
pub const API_KEY_ENV: &str = "SCENE_PACKAGER_API_KEY";

/// 覆寫 `stages.upload.api_key` 的環境變數
pub const UPLOAD_KEY_ENV: &str = "SCENE_PACKAGER_UPLOAD_KEY";

impl Config {
    pub fn new() -> Result<Self> {
        let mut settings = Self::load_settings().unwrap_or_else(|e| {
            warn!("設定檔讀取失敗，改用預設值: {e:#}");
            UserSettings::default()
        });
        let stored_keys = apply_env_overrides(&mut settings);

        Ok(Self {
            settings,
            stored_keys,
        })
    }

    #[must_use]
    pub fn from_settings(settings: UserSettings) -> Self {
        Self {
            settings,
            stored_keys: StoredApiKeys::default(),
        }
    }

    fn load_settings() -> Result<UserSettings> {
        load_settings_from(Path::new("settings.json"))
    }
}

/// 讀取指定路徑的設定檔，檔案不存在時回傳預設值
pub fn load_settings_from(path: &Path) -> Result<UserSettings> {
    if !path.exists() {
        return Ok(UserSettings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {}", path.display()))
}

fn apply_env_overrides(settings: &mut UserSettings) -> StoredApiKeys {
    let matcher_key = std::env::var(API_KEY_ENV).ok();
    let upload_key = std::env::var(UPLOAD_KEY_ENV).ok();
    override_api_keys(settings, matcher_key.as_deref(), upload_key.as_deref())
}

/// 以非空的覆寫值取代金鑰，回傳被取代的原值
fn override_api_keys(
    settings: &mut UserSettings,
    matcher_key: Option<&str>,
    upload_key: Option<&str>,
) -> StoredApiKeys {
    let mut stored = StoredApiKeys::default();
    if let Some(key) = matcher_key.map(str::trim).filter(|k| !k.is_empty()) {
        stored.matcher = Some(std::mem::replace(
            &mut settings.matcher.api_key,
            key.to_string(),
        ));
    }
    if let Some(key) = upload_key.map(str::trim).filter(|k| !k.is_empty()) {
        stored.upload = Some(std::mem::replace(
            &mut settings.stages.upload.api_key,
            key.to_string(),
        ));
    }
    stored
}
