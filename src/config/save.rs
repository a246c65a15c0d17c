use crate::config::types::{Config, MAX_RECENT_PATHS, StoredApiKeys, UserSettings};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn save_settings(config: &Config) -> Result<()> {
    save_settings_to(&config.settings, &config.stored_keys, Path::new("settings.json"))
}

/// 來自環境變數的金鑰不寫回，保留設定檔原本的值
pub fn save_settings_to(
    settings: &UserSettings,
    stored_keys: &StoredApiKeys,
    path: &Path,
) -> Result<()> {
    let mut persisted = settings.clone();
    stored_keys.restore_into(&mut persisted);

    let content =
        serde_json::to_string_pretty(&persisted).context("Failed to serialize settings")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    Ok(())
}

/// 將新路徑加入最前面，去重並限制數量
pub fn add_recent_path(settings: &mut UserSettings, path: &str) {
    settings.recent_paths.retain(|p| p != path);
    settings.recent_paths.insert(0, path.to_string());
    settings.recent_paths.truncate(MAX_RECENT_PATHS);
}
