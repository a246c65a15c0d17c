//! 操作者決策
//!
//! 管線中所有需要人工判斷的地方都經過 [`Operator`]，只會在協調執行緒上呼叫，
//! 測試時可用腳本化的實作取代。

mod console;
mod notifier;

pub use console::ConsoleOperator;
pub use notifier::{Notifier, NotifyingOperator, TelegramNotifier};

use crate::component::scene_matcher::ScoredCandidate;
use crate::tools::{ArtifactKind, MediaFile};
use anyhow::Result;
use std::path::PathBuf;
use std::time::SystemTime;

/// 已存在的產物，提供給操作者判斷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingArtifact {
    pub media_name: String,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingChoice {
    Keep,
    Regenerate,
}

pub trait Operator: Send + Sync {
    /// 產物已存在且策略為 ask-user 時詢問
    fn existing_artifact(&self, artifact: &ExistingArtifact) -> Result<ExistingChoice>;

    /// 多筆候選場景時選擇其中一筆，`None` 表示都不是
    fn choose_scene(&self, query: &str, candidates: &[ScoredCandidate]) -> Result<Option<usize>>;

    /// 自由文字模式下取得搜尋字串，`None` 表示沿用檔名
    fn free_text_query(&self, media: &MediaFile) -> Result<Option<String>>;
}
