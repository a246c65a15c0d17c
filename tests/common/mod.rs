//! 整合測試共用的假協作者

#![allow(dead_code)]

use chrono::NaiveDate;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use scene_packager::component::artifact_generator::{
    ArtifactGenerator, GenerateError, GenerationJob, SourceProbe,
};
use scene_packager::component::operator::{ExistingArtifact, ExistingChoice, Operator};
use scene_packager::component::release_pipeline::{
    Collaborators, ReleasePipeline, ReleaseStage, RunSummary, build_stages,
};
use scene_packager::component::scene_matcher::{
    MetadataProvider, ProviderError, SceneCandidate, ScoredCandidate,
};
use scene_packager::config::UserSettings;
use scene_packager::tools::{
    ArtifactKind, ArtifactLayout, MediaFile, ScanFilter, VideoInfo, scan_media_files,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const FILE_NAME: &str = "Studio.24.01.02.Jane.Doe.mp4";
pub const BASE_NAME: &str = "Studio.24.01.02.Jane.Doe";

/// 不依賴磁碟空間與網路的預設設定
pub fn test_settings() -> UserSettings {
    let mut settings = UserSettings::default();
    settings.min_free_space_mb = 0;
    settings.workers = 2;
    settings.matcher.retry.base_delay_ms = 1;
    settings.matcher.retry.max_delay_ms = 5;
    settings
}

pub fn candidate() -> SceneCandidate {
    SceneCandidate {
        scene_id: "scene-1".to_string(),
        title: "Morning Light".to_string(),
        studio: Some("Studio".to_string()),
        release_date: NaiveDate::from_ymd_opt(2024, 1, 2),
        performers: vec!["Jane Doe".to_string()],
        tags: vec!["Outdoor".to_string()],
        description: Some("A scene.".to_string()),
        ..SceneCandidate::default()
    }
}

/// 依設定的結果回答所有查詢，並記錄收到的查詢字串
pub struct FakeProvider {
    result: Result<Vec<SceneCandidate>, ProviderError>,
    /// 前幾次查詢回傳空結果
    empty_calls: usize,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn matching() -> Self {
        Self::returning(Ok(vec![candidate()]))
    }

    pub fn returning(result: Result<Vec<SceneCandidate>, ProviderError>) -> Self {
        Self {
            result,
            empty_calls: 0,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn matching_after(empty_calls: usize) -> Self {
        Self {
            empty_calls,
            ..Self::matching()
        }
    }
}

impl MetadataProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn search_scenes(&self, query: &str) -> Result<Vec<SceneCandidate>, ProviderError> {
        let mut queries = self.queries.lock().unwrap();
        queries.push(query.to_string());
        if queries.len() <= self.empty_calls {
            return Ok(Vec::new());
        }
        self.result.clone()
    }
}

pub struct FakeProbe;

impl SourceProbe for FakeProbe {
    fn probe(&self, _path: &Path) -> Result<VideoInfo, GenerateError> {
        Ok(VideoInfo {
            duration_seconds: 600.0,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            codec_name: "h264".to_string(),
        })
    }
}

/// 寫入固定內容，或回傳指定錯誤
pub struct FakeGenerator {
    kind: ArtifactKind,
    content: Vec<u8>,
    failure: Option<GenerateError>,
    /// 分段寫入時每段之間的等待
    chunk_delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeGenerator {
    pub fn writing(kind: ArtifactKind, content: &[u8]) -> Self {
        Self {
            kind,
            content: content.to_vec(),
            failure: None,
            chunk_delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 每次寫入一小段並等待，模擬耗時的編碼
    pub fn slowly(kind: ArtifactKind, content: &[u8], chunk_delay: Duration) -> Self {
        Self {
            chunk_delay: Some(chunk_delay),
            ..Self::writing(kind, content)
        }
    }

    pub fn failing(kind: ArtifactKind, failure: GenerateError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::writing(kind, b"")
        }
    }
}

impl ArtifactGenerator for FakeGenerator {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn generate(
        &self,
        job: &GenerationJob<'_>,
        output: &Path,
        progress: &ProgressBar,
    ) -> Result<(), GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        job.source_info()?;
        if let Some(failure) = &self.failure {
            // 失敗前留下半成品，確認不會出現在正式路徑
            fs::write(output, b"partial")?;
            return Err(failure.clone());
        }
        progress.inc(1);
        match self.chunk_delay {
            Some(delay) => {
                let mut file = fs::File::create(output)?;
                for chunk in self.content.chunks(64) {
                    file.write_all(chunk)?;
                    file.flush()?;
                    thread::sleep(delay);
                }
            }
            None => fs::write(output, &self.content)?,
        }
        Ok(())
    }
}

/// 四種產物都寫入 `new <kind>`
pub fn writing_generators() -> Vec<Box<dyn ArtifactGenerator>> {
    ArtifactKind::ALL
        .into_iter()
        .map(|kind| {
            Box::new(FakeGenerator::writing(kind, format!("new {kind}").as_bytes()))
                as Box<dyn ArtifactGenerator>
        })
        .collect()
}

/// 腳本化的操作者，記錄被詢問的產物
pub struct ScriptedOperator {
    existing_choice: ExistingChoice,
    free_text: Option<String>,
    pub asked: Arc<Mutex<Vec<ArtifactKind>>>,
}

impl ScriptedOperator {
    pub fn answering(existing_choice: ExistingChoice) -> Self {
        Self {
            existing_choice,
            free_text: None,
            asked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_free_text(mut self, query: &str) -> Self {
        self.free_text = Some(query.to_string());
        self
    }
}

impl Operator for ScriptedOperator {
    fn existing_artifact(&self, artifact: &ExistingArtifact) -> anyhow::Result<ExistingChoice> {
        self.asked.lock().unwrap().push(artifact.kind);
        Ok(self.existing_choice)
    }

    fn choose_scene(
        &self,
        _query: &str,
        candidates: &[ScoredCandidate],
    ) -> anyhow::Result<Option<usize>> {
        Ok((!candidates.is_empty()).then_some(0))
    }

    fn free_text_query(&self, _media: &MediaFile) -> anyhow::Result<Option<String>> {
        Ok(self.free_text.clone())
    }
}

pub struct Harness {
    pub settings: UserSettings,
    pub provider: FakeProvider,
    pub generators: Vec<Box<dyn ArtifactGenerator>>,
    pub stages: Option<Vec<Box<dyn ReleaseStage>>>,
    pub operator: ScriptedOperator,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            settings: test_settings(),
            provider: FakeProvider::matching(),
            generators: writing_generators(),
            stages: None,
            operator: ScriptedOperator::answering(ExistingChoice::Keep),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Harness {
    /// 掃描資料夾後執行一次批次
    pub fn run(self, directory: &Path) -> RunSummary {
        let layout = ArtifactLayout::from_settings(&self.settings);
        let filter = ScanFilter {
            extensions: &self.settings.media_extensions,
            ignore_list: &self.settings.ignore_list,
            layout: &layout,
        };
        let media_files = scan_media_files(directory, &filter).unwrap();

        let stages = match self.stages {
            Some(stages) => stages,
            None => build_stages(&self.settings).unwrap(),
        };
        let collaborators = Collaborators {
            provider: Box::new(self.provider),
            probe: Box::new(FakeProbe),
            generators: self.generators,
            stages,
            operator: Box::new(self.operator),
        };
        let pipeline = ReleasePipeline::new(&self.settings, collaborators, self.shutdown_signal)
            .unwrap()
            .with_progress(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()));
        pipeline.run(&media_files)
    }
}

pub fn write_source(directory: &Path, file_name: &str) {
    fs::write(directory.join(file_name), b"source video bytes").unwrap();
}

pub fn artifact_path(directory: &Path, kind: ArtifactKind) -> std::path::PathBuf {
    let file = match kind {
        ArtifactKind::ReencodedVideo => format!("{BASE_NAME}.mp4"),
        ArtifactKind::CoverImage => format!("{BASE_NAME}.cover.jpg"),
        ArtifactKind::ThumbnailSheet => format!("{BASE_NAME}.thumbnails.jpg"),
        ArtifactKind::AnimatedPreview => format!("{BASE_NAME}.preview.mp4"),
    };
    directory.join(BASE_NAME).join(file)
}

/// 輸出資料夾內是否還有暫存檔
pub fn partial_files(directory: &Path) -> Vec<String> {
    fs::read_dir(directory.join(BASE_NAME))
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|name| name.contains(".partial-"))
                .collect()
        })
        .unwrap_or_default()
}
