use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const MAX_RECENT_PATHS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "zh-TW")]
    ZhTw,
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::ZhTw => "zh-TW",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnUs => write!(f, "English"),
            Self::ZhTw => write!(f, "繁體中文"),
        }
    }
}

/// 檔名解析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameMode {
    #[default]
    StrictFormat,
    FreeText,
}

impl fmt::Display for NameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrictFormat => write!(f, "strict-format"),
            Self::FreeText => write!(f, "free-text"),
        }
    }
}

/// 產物已存在時的處理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegenerationPolicy {
    #[default]
    AskUser,
    ForceRegenerate,
    ForceKeep,
}

impl fmt::Display for RegenerationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AskUser => write!(f, "ask-user"),
            Self::ForceRegenerate => write!(f, "force-regenerate"),
            Self::ForceKeep => write!(f, "force-keep"),
        }
    }
}

/// 影片類（重新編碼、動態預覽）與圖片類（封面、縮圖表）各自獨立的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationSettings {
    pub video: RegenerationPolicy,
    pub images: RegenerationPolicy,
}

/// 多筆候選場景時的選擇方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    BestScore,
    #[default]
    AskUser,
}

impl fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BestScore => write!(f, "best-score"),
            Self::AskUser => write!(f, "ask-user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// 429 回應不計入 `max_attempts`，另有上限
    pub max_rate_limit_waits: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 5_000,
            max_delay_ms: 30_000,
            max_rate_limit_waits: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    pub api_url: String,
    pub api_key: String,
    pub ambiguity: AmbiguityPolicy,
    pub date_tolerance_days: u32,
    pub request_timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.theporndb.net/scenes".to_string(),
            api_key: String::new(),
            ambiguity: AmbiguityPolicy::default(),
            date_tolerance_days: 6,
            request_timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

/// 產物輸出位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLayout {
    /// 每個影片一個同名子資料夾
    #[default]
    SubDirectory,
    /// 與來源影片放在同一個資料夾
    SameDirectory,
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubDirectory => write!(f, "sub-directory"),
            Self::SameDirectory => write!(f, "same-directory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReencodeSettings {
    pub enabled: bool,
    pub suffix: String,
    pub container: String,
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub max_height: Option<u32>,
    pub remove_chapters: bool,
    /// 來源已是這些編碼時直接複製串流
    pub copy_codecs: Vec<String>,
}

impl Default for ReencodeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: String::new(),
            container: "mp4".to_string(),
            video_codec: "libx265".to_string(),
            crf: 24,
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            max_height: Some(1080),
            remove_chapters: true,
            copy_codecs: vec!["hevc".to_string(), "av1".to_string()],
        }
    }
}

/// 封面擷取時間點
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "kebab-case")]
pub enum CoverTimestamp {
    Seconds(f64),
    Percent(f64),
}

impl Default for CoverTimestamp {
    fn default() -> Self {
        Self::Percent(15.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSettings {
    pub enabled: bool,
    pub suffix: String,
    pub format: String,
    pub timestamp: CoverTimestamp,
    pub fallback_seconds: f64,
    pub width: Option<u32>,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: ".cover".to_string(),
            format: "jpg".to_string(),
            timestamp: CoverTimestamp::default(),
            fallback_seconds: 5.0,
            width: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSettings {
    pub enabled: bool,
    pub suffix: String,
    pub format: String,
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub start_margin_percent: f64,
    pub end_margin_percent: f64,
    pub min_frame_gap_seconds: f64,
    pub show_timestamps: bool,
    pub show_label: bool,
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: ".thumbnails".to_string(),
            format: "jpg".to_string(),
            columns: 5,
            rows: 6,
            tile_width: 400,
            tile_height: 225,
            start_margin_percent: 2.0,
            end_margin_percent: 2.0,
            min_frame_gap_seconds: 1.0,
            show_timestamps: true,
            show_label: true,
            font_file: None,
            font_size: 22,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewFormat {
    #[default]
    Mp4,
    Webm,
    Webp,
}

impl PreviewFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewTransition {
    None,
    #[default]
    Fade,
    Dissolve,
    WipeLeft,
    SlideLeft,
    CircleOpen,
}

impl PreviewTransition {
    /// 對應 ffmpeg xfade 濾鏡的 transition 名稱
    #[must_use]
    pub const fn xfade_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Fade => Some("fade"),
            Self::Dissolve => Some("dissolve"),
            Self::WipeLeft => Some("wipeleft"),
            Self::SlideLeft => Some("slideleft"),
            Self::CircleOpen => Some("circleopen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    pub enabled: bool,
    pub suffix: String,
    pub format: PreviewFormat,
    pub clip_count: u32,
    pub clip_seconds: f64,
    pub transition: PreviewTransition,
    pub transition_seconds: f64,
    pub height: u32,
    pub fps: u32,
    pub start_margin_percent: f64,
    pub end_safety_seconds: f64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: ".preview".to_string(),
            format: PreviewFormat::default(),
            clip_count: 8,
            clip_seconds: 2.0,
            transition: PreviewTransition::default(),
            transition_seconds: 0.4,
            height: 360,
            fps: 30,
            start_margin_percent: 5.0,
            end_safety_seconds: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleSettings {
    pub enabled: bool,
    /// 未設定時使用內建範本
    pub template_path: Option<PathBuf>,
    pub suffix: String,
}

impl Default for AssembleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            template_path: None,
            suffix: ".template".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: String,
    pub upload_cover: bool,
    pub upload_thumbnails: bool,
    pub request_timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.imgbb.com/1/upload".to_string(),
            api_key: String::new(),
            upload_cover: true,
            upload_thumbnails: true,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentSettings {
    pub enabled: bool,
    pub announce_url: String,
    /// 未設定時寫入輸出資料夾的上層
    pub save_path: Option<PathBuf>,
    pub name_prefix: String,
    pub mktorrent_path: String,
    /// 2^n bytes，18 = 256 KiB
    pub piece_size_exponent: u8,
}

impl Default for TorrentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            announce_url: String::new(),
            save_path: None,
            name_prefix: String::new(),
            mktorrent_path: "mktorrent".to_string(),
            piece_size_exponent: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediainfoSettings {
    pub enabled: bool,
    pub mediainfo_path: String,
}

impl Default for MediainfoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mediainfo_path: "mediainfo".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub mediainfo: MediainfoSettings,
    pub assemble: AssembleSettings,
    pub upload: UploadSettings,
    pub torrent: TorrentSettings,
}

/// 需要操作者回應時，以 Telegram 訊息通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    pub enabled: bool,
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            request_timeout_secs: 10,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub language: Language,
    pub recent_paths: Vec<String>,
    pub name_mode: NameMode,
    pub matcher: MatcherSettings,
    pub layout: OutputLayout,
    pub regeneration: RegenerationSettings,
    pub reencode: ReencodeSettings,
    pub cover: CoverSettings,
    pub thumbnails: ThumbnailSettings,
    pub preview: PreviewSettings,
    pub stages: StageSettings,
    pub notifier: NotifierSettings,
    /// 0 = 依 CPU 核心數自動決定
    pub workers: usize,
    pub min_free_space_mb: u64,
    pub media_extensions: Vec<String>,
    pub ignore_list: Vec<String>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            recent_paths: Vec::new(),
            name_mode: NameMode::default(),
            matcher: MatcherSettings::default(),
            layout: OutputLayout::default(),
            regeneration: RegenerationSettings::default(),
            reencode: ReencodeSettings::default(),
            cover: CoverSettings::default(),
            thumbnails: ThumbnailSettings::default(),
            preview: PreviewSettings::default(),
            stages: StageSettings::default(),
            notifier: NotifierSettings::default(),
            workers: 0,
            min_free_space_mb: 2048,
            media_extensions: vec!["mp4".to_string()],
            ignore_list: Vec::new(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl UserSettings {
    /// 批次開始前檢查設定是否自相矛盾
    pub fn validate(&self) -> Result<()> {
        if self.layout == OutputLayout::SameDirectory
            && self.reencode.enabled
            && self.reencode.suffix.is_empty()
            && self
                .media_extensions
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(&self.reencode.container))
        {
            bail!("same-directory 模式下重新編碼的影片必須設定 suffix，否則會覆蓋來源檔案");
        }

        let thumbs = &self.thumbnails;
        if thumbs.columns == 0 || thumbs.rows == 0 {
            bail!("縮圖表的欄數與列數必須大於 0");
        }
        if thumbs.tile_width == 0 || thumbs.tile_height == 0 {
            bail!("縮圖尺寸必須大於 0");
        }
        if thumbs.start_margin_percent + thumbs.end_margin_percent >= 100.0 {
            bail!("縮圖表的前後邊界總和必須小於 100%");
        }

        let preview = &self.preview;
        if preview.clip_count == 0 || preview.clip_seconds <= 0.0 {
            bail!("動態預覽的片段數量與長度必須大於 0");
        }
        if preview.transition != PreviewTransition::None
            && (preview.transition_seconds <= 0.0
                || preview.transition_seconds >= preview.clip_seconds)
        {
            bail!("轉場長度必須大於 0 且短於片段長度");
        }

        let names = [
            (self.cover.enabled, &self.cover.suffix, self.cover.format.as_str()),
            (
                self.thumbnails.enabled,
                &self.thumbnails.suffix,
                self.thumbnails.format.as_str(),
            ),
            (
                self.preview.enabled,
                &self.preview.suffix,
                self.preview.format.extension(),
            ),
            (
                self.reencode.enabled,
                &self.reencode.suffix,
                self.reencode.container.as_str(),
            ),
        ];
        for (i, (enabled_a, suffix_a, ext_a)) in names.iter().enumerate() {
            for (enabled_b, suffix_b, ext_b) in names.iter().skip(i + 1) {
                if *enabled_a
                    && *enabled_b
                    && suffix_a == suffix_b
                    && ext_a.eq_ignore_ascii_case(ext_b)
                {
                    bail!("兩種產物使用了相同的檔名: *{suffix_a}.{ext_a}");
                }
            }
        }

        if self.stages.torrent.enabled && self.stages.torrent.announce_url.trim().is_empty() {
            bail!("建立 torrent 需要設定 announce_url");
        }
        if self.notifier.enabled
            && (self.notifier.bot_token.trim().is_empty() || self.notifier.chat_id.trim().is_empty())
        {
            bail!("啟用通知需要設定 bot_token 與 chat_id");
        }

        Ok(())
    }
}

/// 被環境變數覆寫前，設定檔內原本的 API 金鑰
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredApiKeys {
    pub matcher: Option<String>,
    pub upload: Option<String>,
}

impl StoredApiKeys {
    /// 還原成設定檔內的金鑰，避免把環境變數寫進檔案
    pub fn restore_into(&self, settings: &mut UserSettings) {
        if let Some(key) = &self.matcher {
            settings.matcher.api_key.clone_from(key);
        }
        if let Some(key) = &self.upload {
            settings.stages.upload.api_key.clone_from(key);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: UserSettings,
    pub stored_keys: StoredApiKeys,
}
