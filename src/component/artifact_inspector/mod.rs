//! 產物狀態檢查
//!
//! 依命名規則找出產物應在的位置，再依重新產生策略決定略過、產生或重新產生。

mod inspector;

pub use inspector::{ArtifactInspector, Decision, Inspection};
