//! 發佈準備管線
//!
//! 每個檔案依序經過解析、比對、產物產生，最後是範本、上傳與種子檔階段。
//! 所有結果寫入 [`RunReport`]，單一檔案失敗不會中止整個批次。

mod image_upload;
mod main;
mod mediainfo;
mod orchestrator;
mod run_report;
mod stages;
mod template;
mod torrent;

pub use image_upload::ImgbbUploader;
pub use main::{ReleasePreparer, print_summary};
pub use mediainfo::MediainfoReporter;
pub use orchestrator::{Collaborators, ReleasePipeline};
pub use run_report::{
    ArtifactOutcome, FileFailure, FileOutcome, OutcomeCounts, ReportEntry, ReportRecord,
    RunReport, RunSummary, StageKind, StageOutcome,
};
pub use stages::{ReleaseStage, StageContext, build_stages};
pub use template::{TemplateAssembler, release_title};
pub use torrent::MktorrentBuilder;
