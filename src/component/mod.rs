//! 功能元件模組
//!
//! 每個子模組實現管線中的一個階段，包含主要邏輯和專用工具

pub mod artifact_generator;
pub mod artifact_inspector;
pub mod identity_resolver;
pub mod operator;
pub mod release_pipeline;
pub mod scene_matcher;

pub use release_pipeline::{ReleasePipeline, ReleasePreparer};
