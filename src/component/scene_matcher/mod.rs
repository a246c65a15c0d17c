//! 場景比對元件
//!
//! 以解析出的身分查詢中繼資料服務，回傳正規化後的 [`SceneRecord`]。
//! 「確認找不到」與「服務無法使用」是不同的結果。

mod matcher;
mod normalize;
mod provider;
mod scoring;
mod tpdb_client;

pub use matcher::{MatchError, SceneMatcher, SceneRecord};
pub use normalize::{normalize_studio, normalize_tag, normalize_tags, normalize_title};
pub use provider::{MetadataProvider, ProviderError, SceneCandidate};
pub use scoring::{ScoredCandidate, score_candidates};
pub use tpdb_client::TpdbClient;
