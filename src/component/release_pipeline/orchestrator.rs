use super::run_report::{
    ArtifactOutcome, FileFailure, FileOutcome, ReportEntry, RunReport, RunSummary, StageKind,
    StageOutcome,
};
use super::stages::{ReleaseStage, StageContext, build_stages};
use crate::component::artifact_generator::{
    ArtifactGenerator, FfprobeProbe, GenerationJob, SourceProbe, build_generators,
    produce_artifact,
};
use crate::component::artifact_inspector::{ArtifactInspector, Decision, Inspection};
use crate::component::identity_resolver::{Identity, ResolveError, Resolver, resolver_for};
use crate::component::operator::{
    ConsoleOperator, ExistingArtifact, ExistingChoice, NotifyingOperator, Operator,
    TelegramNotifier,
};
use crate::component::scene_matcher::{
    MatchError, MetadataProvider, SceneMatcher, SceneRecord, ScoredCandidate, TpdbClient,
};
use crate::config::{NameMode, RegenerationSettings, UserSettings};
use crate::tools::{
    ArtifactKind, ArtifactLayout, CommitMode, DiskMonitor, FfmpegRunner, MediaFile,
    sweep_stale_partials,
};
use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 單一檔案在管線中的狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStage {
    Resolving,
    Matching,
    GeneratingArtifacts,
    Mediainfo,
    Assembling,
    Uploading,
    TorrentCreating,
    Done,
    Failed,
}

impl From<StageKind> for FileStage {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Mediainfo => Self::Mediainfo,
            StageKind::Assembling => Self::Assembling,
            StageKind::Uploading => Self::Uploading,
            StageKind::TorrentCreating => Self::TorrentCreating,
        }
    }
}

/// 管線的外部協作者，測試時可整組替換
pub struct Collaborators {
    pub provider: Box<dyn MetadataProvider>,
    pub probe: Box<dyn SourceProbe>,
    pub generators: Vec<Box<dyn ArtifactGenerator>>,
    pub stages: Vec<Box<dyn ReleaseStage>>,
    pub operator: Box<dyn Operator>,
}

impl Collaborators {
    /// 以設定建立正式環境用的協作者
    pub fn from_settings(settings: &UserSettings, shutdown_signal: &Arc<AtomicBool>) -> Result<Self> {
        let runner = FfmpegRunner::new(settings.ffmpeg_path.clone(), Arc::clone(shutdown_signal));
        let operator: Box<dyn Operator> = if settings.notifier.enabled {
            Box::new(NotifyingOperator::new(
                ConsoleOperator,
                TelegramNotifier::new(&settings.notifier)?,
            ))
        } else {
            Box::new(ConsoleOperator)
        };
        Ok(Self {
            provider: Box::new(TpdbClient::new(&settings.matcher)?),
            probe: Box::new(FfprobeProbe::new(settings.ffprobe_path.clone())),
            generators: build_generators(settings, &runner),
            stages: build_stages(settings)?,
            operator,
        })
    }
}

/// 完成解析、比對與產物檢查，等待交給工作執行緒的檔案
struct PreparedFile {
    media: MediaFile,
    identity: Identity,
    scene: SceneRecord,
    inspections: Vec<Inspection>,
}

/// 提示操作者前先暫停進度條，避免畫面互相覆蓋
struct SuspendingOperator<'a> {
    inner: &'a dyn Operator,
    progress: &'a MultiProgress,
}

impl Operator for SuspendingOperator<'_> {
    fn existing_artifact(&self, artifact: &ExistingArtifact) -> Result<ExistingChoice> {
        self.progress
            .suspend(|| self.inner.existing_artifact(artifact))
    }

    fn choose_scene(&self, query: &str, candidates: &[ScoredCandidate]) -> Result<Option<usize>> {
        self.progress
            .suspend(|| self.inner.choose_scene(query, candidates))
    }

    fn free_text_query(&self, media: &MediaFile) -> Result<Option<String>> {
        self.progress.suspend(|| self.inner.free_text_query(media))
    }
}

/// 批次處理媒體檔案
///
/// 解析、比對與產物檢查都在呼叫端執行緒上依序進行，所有操作者提示只會出現在這裡；
/// 產物產生與下游階段交給有上限的工作執行緒池，各檔案互不等待。
pub struct ReleasePipeline {
    layout: ArtifactLayout,
    regeneration: RegenerationSettings,
    resolver: Box<dyn Resolver>,
    matcher: SceneMatcher,
    probe: Box<dyn SourceProbe>,
    generators: Vec<Box<dyn ArtifactGenerator>>,
    stages: Vec<Box<dyn ReleaseStage>>,
    operator: Box<dyn Operator>,
    shutdown_signal: Arc<AtomicBool>,
    pool: ThreadPool,
    progress: MultiProgress,
    min_free_space_mb: u64,
}

impl ReleasePipeline {
    pub fn new(
        settings: &UserSettings,
        collaborators: Collaborators,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|index| format!("release-worker-{index}"))
            .build()
            .context("無法建立工作執行緒池")?;

        let Collaborators {
            provider,
            probe,
            generators,
            stages,
            operator,
        } = collaborators;

        Ok(Self {
            layout: ArtifactLayout::from_settings(settings),
            regeneration: settings.regeneration.clone(),
            resolver: resolver_for(settings.name_mode),
            matcher: SceneMatcher::new(provider, &settings.matcher, Arc::clone(&shutdown_signal)),
            probe,
            generators,
            stages,
            operator,
            shutdown_signal,
            pool,
            progress: MultiProgress::new(),
            min_free_space_mb: settings.min_free_space_mb,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn run(&self, media_files: &[MediaFile]) -> RunSummary {
        let report = RunReport::new();
        info!(
            "批次 {} 開始，共 {} 個檔案，{} 個工作執行緒",
            report.run_id(),
            media_files.len(),
            self.pool.current_num_threads()
        );

        self.sweep_partials(media_files);

        let operator = SuspendingOperator {
            inner: self.operator.as_ref(),
            progress: &self.progress,
        };
        let mut disk_monitor = DiskMonitor::new(self.min_free_space_mb);

        self.pool.in_place_scope(|scope| {
            for media in media_files {
                if let Some(failure) = self.scheduling_blocked(&report, &mut disk_monitor, media) {
                    Self::record_file(&report, media, FileOutcome::Failed(failure));
                    continue;
                }

                let Some(prepared) = self.prepare(media, &operator, &report) else {
                    continue;
                };
                let report = &report;
                scope.spawn(move |_| self.complete(prepared, report));
            }
        });

        let summary = report.finish();
        info!(
            "批次 {} 結束 - 完成: {}, 失敗: {}, 耗時 {} 秒",
            summary.run_id,
            summary.counts.files_done,
            summary.counts.files_failed,
            summary.duration().num_seconds()
        );
        summary
    }

    /// 上次中斷留下的暫存檔只在開始前清一次，避免刪到本次正在寫入的檔案
    fn sweep_partials(&self, media_files: &[MediaFile]) {
        let directories: BTreeSet<PathBuf> = media_files
            .iter()
            .map(|media| self.layout.output_dir(media))
            .collect();
        let removed: usize = directories
            .iter()
            .map(|dir| sweep_stale_partials(dir))
            .sum();
        if removed > 0 {
            info!("已清除 {removed} 個上次中斷留下的暫存檔");
        }
    }

    fn scheduling_blocked(
        &self,
        report: &RunReport,
        disk_monitor: &mut DiskMonitor,
        media: &MediaFile,
    ) -> Option<FileFailure> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Some(FileFailure::Cancelled);
        }
        if let Some(reason) = report.abort_reason() {
            return Some(FileFailure::BatchAborted(reason));
        }
        if let Err(available) = disk_monitor.check(media.directory()) {
            let reason = format!(
                "可用空間剩 {} MB，低於 {} MB",
                available / 1024 / 1024,
                self.min_free_space_mb
            );
            error!("{reason}，停止排程");
            report.abort(reason.clone());
            return Some(FileFailure::BatchAborted(reason));
        }
        None
    }

    fn transition(media: &MediaFile, stage: FileStage) {
        debug!("{} -> {stage:?}", media.file_name());
    }

    fn record_file(report: &RunReport, media: &MediaFile, outcome: FileOutcome) {
        match &outcome {
            FileOutcome::Done => {
                Self::transition(media, FileStage::Done);
                info!("{} 完成", media.file_name());
            }
            FileOutcome::Failed(failure) => {
                Self::transition(media, FileStage::Failed);
                warn!("{} 失敗: {failure}", media.file_name());
            }
        }
        report.append(
            media.path.clone(),
            media.file_name(),
            ReportEntry::File { outcome },
        );
    }

    fn resolve(&self, media: &MediaFile, operator: &dyn Operator) -> Result<Identity, ResolveError> {
        let input = match self.resolver.mode() {
            NameMode::StrictFormat => media.file_name(),
            NameMode::FreeText => match operator.free_text_query(media) {
                Ok(Some(query)) if !query.trim().is_empty() => query,
                Ok(_) => media.base_name.replace(['.', '_'], " "),
                Err(e) => {
                    warn!("無法取得搜尋字串，改用檔名: {e:#}");
                    media.base_name.replace(['.', '_'], " ")
                }
            },
        };
        self.resolver.resolve(&input)
    }

    /// 在協調執行緒上完成需要操作者參與的部分
    fn prepare(
        &self,
        media: &MediaFile,
        operator: &dyn Operator,
        report: &RunReport,
    ) -> Option<PreparedFile> {
        Self::transition(media, FileStage::Resolving);
        let identity = match self.resolve(media, operator) {
            Ok(identity) => identity,
            Err(e) => {
                Self::record_file(
                    report,
                    media,
                    FileOutcome::Failed(FileFailure::UnparsableName(e.to_string())),
                );
                return None;
            }
        };
        debug!("{} 解析結果: {identity:?}", media.file_name());

        Self::transition(media, FileStage::Matching);
        let scene = match self.matcher.find_scene(&identity, operator) {
            Ok(scene) => scene,
            Err(e) => {
                let failure = match e {
                    MatchError::NoMatchFound { query } => FileFailure::NoMatchFound(query),
                    MatchError::MatchServiceUnavailable { reason } => {
                        FileFailure::MatchServiceUnavailable(reason)
                    }
                    MatchError::Cancelled => FileFailure::Cancelled,
                };
                Self::record_file(report, media, FileOutcome::Failed(failure));
                return None;
            }
        };

        Self::transition(media, FileStage::GeneratingArtifacts);
        let inspector = ArtifactInspector::new(&self.layout, self.regeneration.clone());
        let mut inspections = Vec::with_capacity(self.generators.len());
        for generator in &self.generators {
            let kind = generator.kind();
            match inspector.inspect(media, kind, operator) {
                Ok(inspection) => inspections.push(inspection),
                Err(e) => {
                    error!("無法檢查 {} 的 {kind}: {e}", media.file_name());
                    Self::record_artifact(
                        report,
                        media,
                        kind,
                        ArtifactOutcome::Failed(format!("無法檢查既有產物: {e}")),
                    );
                }
            }
        }

        Some(PreparedFile {
            media: media.clone(),
            identity,
            scene,
            inspections,
        })
    }

    fn record_artifact(
        report: &RunReport,
        media: &MediaFile,
        kind: ArtifactKind,
        outcome: ArtifactOutcome,
    ) {
        report.append(
            media.path.clone(),
            media.file_name(),
            ReportEntry::Artifact { kind, outcome },
        );
    }

    /// 在工作執行緒上產生產物並執行下游階段
    fn complete(&self, prepared: PreparedFile, report: &RunReport) {
        let PreparedFile {
            media,
            identity,
            scene,
            inspections,
        } = prepared;
        let job = GenerationJob::new(&media, &scene, self.probe.as_ref());

        let artifacts: HashMap<ArtifactKind, PathBuf> = inspections
            .par_iter()
            .filter_map(|inspection| {
                let (outcome, present) = self.realize(&job, inspection, report);
                Self::record_artifact(report, &media, inspection.kind, outcome);
                present.map(|path| (inspection.kind, path))
            })
            .collect();

        let source_info = job.source_info().ok();
        if let Some(info) = source_info
            && let Some(difference) = scene.duration_mismatch(info.duration_seconds)
        {
            warn!(
                "{} 的長度與場景資料相差 {difference:.0} 秒，可能比對到錯誤的場景",
                media.file_name()
            );
        }

        let mut stage_outputs: HashMap<StageKind, PathBuf> = HashMap::new();
        for stage in &self.stages {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                Self::record_file(report, &media, FileOutcome::Failed(FileFailure::Cancelled));
                return;
            }

            let kind = stage.kind();
            Self::transition(&media, FileStage::from(kind));
            let context = StageContext {
                media: &media,
                identity: &identity,
                scene: &scene,
                layout: &self.layout,
                artifacts: &artifacts,
                source_info,
                stage_outputs: &stage_outputs,
            };
            let result = stage.run(&context);
            let outcome = match result {
                Ok(output) => {
                    stage_outputs.insert(kind, output.clone());
                    StageOutcome::Completed { output }
                }
                Err(e) => StageOutcome::Failed {
                    reason: format!("{e:#}"),
                },
            };
            let failed = matches!(outcome, StageOutcome::Failed { .. });
            if let StageOutcome::Failed { reason } = &outcome {
                error!("{} 的 {kind} 失敗: {reason}", media.file_name());
            }
            report.append(
                media.path.clone(),
                media.file_name(),
                ReportEntry::Stage {
                    stage: kind,
                    outcome,
                },
            );
            if failed {
                Self::record_file(
                    report,
                    &media,
                    FileOutcome::Failed(FileFailure::StageFailed(kind)),
                );
                return;
            }
        }

        Self::record_file(report, &media, FileOutcome::Done);
    }

    /// 依檢查結果產生單一產物，回傳結果與可供下游使用的路徑
    fn realize(
        &self,
        job: &GenerationJob<'_>,
        inspection: &Inspection,
        report: &RunReport,
    ) -> (ArtifactOutcome, Option<PathBuf>) {
        let kind = inspection.kind;
        let (mode, outcome_on_success) = match inspection.decision {
            Decision::Skip => {
                info!("{} 保留既有的 {kind}", job.media.file_name());
                return (
                    ArtifactOutcome::SkippedAlreadyPresent,
                    Some(inspection.path.clone()),
                );
            }
            Decision::Generate => (CommitMode::CreateNew, ArtifactOutcome::GeneratedNew),
            Decision::Regenerate(existing) => {
                (CommitMode::Replace(existing), ArtifactOutcome::Regenerated)
            }
        };

        if self.shutdown_signal.load(Ordering::SeqCst) {
            return (ArtifactOutcome::Failed("已中斷".to_string()), None);
        }
        if let Some(reason) = report.abort_reason() {
            return (ArtifactOutcome::Failed(format!("批次已中止: {reason}")), None);
        }
        let Some(generator) = self.generators.iter().find(|g| g.kind() == kind) else {
            return (ArtifactOutcome::Failed(format!("沒有 {kind} 的產生器")), None);
        };

        let bar = self.progress.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        bar.set_message(format!("{} {kind}", job.media.base_name));

        let result = produce_artifact(generator.as_ref(), job, &inspection.path, mode, &bar);
        bar.finish_and_clear();
        self.progress.remove(&bar);

        match result {
            Ok(path) => {
                info!("{} 的 {kind} 已產生: {}", job.media.file_name(), path.display());
                (outcome_on_success, Some(path))
            }
            Err(e) => {
                if e.is_batch_fatal() {
                    error!("{e}，停止排程");
                    report.abort(e.to_string());
                } else {
                    error!("{} 的 {kind} 失敗: {e}", job.media.file_name());
                }
                (ArtifactOutcome::Failed(e.to_string()), None)
            }
        }
    }
}
