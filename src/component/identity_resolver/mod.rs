//! 檔名 / 身分解析元件
//!
//! 從檔名（嚴格格式）或自由文字取得片商、日期、演員與分段資訊，
//! 兩種策略都實作 [`Resolver`]，由設定的 `name_mode` 決定使用哪一個。

mod free_text;
mod identity;
mod strict_format;

pub use free_text::FreeTextResolver;
pub use identity::{Identity, Performer, ReleaseFlag, part_number_word};
pub use strict_format::StrictFormatResolver;

use crate::config::NameMode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("無法解析檔名 {name}: {reason}")]
    UnparsableName { name: String, reason: String },
}

impl ResolveError {
    pub(crate) fn unparsable(name: &str, reason: impl Into<String>) -> Self {
        Self::UnparsableName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub trait Resolver: Send + Sync {
    fn mode(&self) -> NameMode;

    /// 純函式，不讀寫檔案
    fn resolve(&self, input: &str) -> Result<Identity, ResolveError>;
}

#[must_use]
pub fn resolver_for(mode: NameMode) -> Box<dyn Resolver> {
    match mode {
        NameMode::StrictFormat => Box::new(StrictFormatResolver),
        NameMode::FreeText => Box::new(FreeTextResolver),
    }
}
