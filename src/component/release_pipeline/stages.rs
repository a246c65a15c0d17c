use super::image_upload::ImgbbUploader;
use super::mediainfo::MediainfoReporter;
use super::run_report::StageKind;
use super::template::TemplateAssembler;
use super::torrent::MktorrentBuilder;
use crate::component::identity_resolver::Identity;
use crate::component::scene_matcher::SceneRecord;
use crate::config::UserSettings;
use crate::tools::{ArtifactKind, ArtifactLayout, MediaFile, VideoInfo};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;

/// 下游階段需要的資料，產物只包含確實存在的檔案
pub struct StageContext<'a> {
    pub media: &'a MediaFile,
    pub identity: &'a Identity,
    pub scene: &'a SceneRecord,
    pub layout: &'a ArtifactLayout,
    pub artifacts: &'a HashMap<ArtifactKind, PathBuf>,
    pub source_info: Option<&'a VideoInfo>,
    /// 同一檔案先前完成的階段輸出
    pub stage_outputs: &'a HashMap<StageKind, PathBuf>,
}

impl StageContext<'_> {
    #[must_use]
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&PathBuf> {
        self.artifacts.get(&kind)
    }

    #[must_use]
    pub fn stage_output(&self, kind: StageKind) -> Option<&PathBuf> {
        self.stage_outputs.get(&kind)
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.layout.output_dir(self.media)
    }
}

/// 範本、上傳與種子檔階段，每個檔案每次執行最多呼叫一次
pub trait ReleaseStage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// 成功時回傳輸出檔案
    fn run(&self, context: &StageContext<'_>) -> Result<PathBuf>;
}

/// 依設定建立啟用中的階段，順序固定為 mediainfo、範本、上傳、種子
pub fn build_stages(settings: &UserSettings) -> Result<Vec<Box<dyn ReleaseStage>>> {
    let mut stages: Vec<Box<dyn ReleaseStage>> = Vec::new();
    if settings.stages.mediainfo.enabled {
        stages.push(Box::new(MediainfoReporter::new(
            settings.stages.mediainfo.clone(),
        )));
    }
    if settings.stages.assemble.enabled {
        stages.push(Box::new(TemplateAssembler::from_settings(
            &settings.stages.assemble,
        )?));
    }
    if settings.stages.upload.enabled {
        stages.push(Box::new(ImgbbUploader::new(&settings.stages.upload)?));
    }
    if settings.stages.torrent.enabled {
        stages.push(Box::new(MktorrentBuilder::new(
            settings.stages.torrent.clone(),
        )));
    }
    Ok(stages)
}
