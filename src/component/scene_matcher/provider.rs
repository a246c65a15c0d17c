use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// 中繼資料服務回傳的一筆候選場景（未正規化）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneCandidate {
    pub scene_id: String,
    pub title: String,
    pub studio: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub performers: Vec<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// 429，可重試且不計入一般重試次數
    #[error("請求過於頻繁")]
    RateLimited { retry_after: Option<Duration> },
    /// 網路錯誤或 5xx
    #[error("暫時性錯誤: {0}")]
    Transient(String),
    /// 認證失敗或其他 4xx，重試也不會成功
    #[error("請求被拒絕: {0}")]
    Rejected(String),
}

/// 場景中繼資料來源
///
/// 空陣列代表服務確認沒有結果，與錯誤不同。
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// 依服務的排序回傳候選場景
    fn search_scenes(&self, query: &str) -> Result<Vec<SceneCandidate>, ProviderError>;
}
