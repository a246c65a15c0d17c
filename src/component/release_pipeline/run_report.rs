use crate::tools::ArtifactKind;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// 單一產物的結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum ArtifactOutcome {
    SkippedAlreadyPresent,
    Regenerated,
    GeneratedNew,
    Failed(String),
}

impl ArtifactOutcome {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ArtifactOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedAlreadyPresent => write!(f, "skipped-already-present"),
            Self::Regenerated => write!(f, "regenerated"),
            Self::GeneratedNew => write!(f, "generated-new"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// 產物之後的下游階段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    Mediainfo,
    Assembling,
    Uploading,
    TorrentCreating,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mediainfo => write!(f, "mediainfo"),
            Self::Assembling => write!(f, "assembling"),
            Self::Uploading => write!(f, "uploading"),
            Self::TorrentCreating => write!(f, "torrent-creating"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StageOutcome {
    Completed { output: PathBuf },
    Failed { reason: String },
}

/// 檔案層級的失敗原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", content = "reason", rename_all = "kebab-case")]
pub enum FileFailure {
    UnparsableName(String),
    NoMatchFound(String),
    MatchServiceUnavailable(String),
    StageFailed(StageKind),
    Cancelled,
    /// 批次因資源耗盡停止，未排程的檔案
    BatchAborted(String),
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparsableName(reason) => write!(f, "UnparsableName: {reason}"),
            Self::NoMatchFound(query) => write!(f, "NoMatchFound: {query}"),
            Self::MatchServiceUnavailable(reason) => {
                write!(f, "MatchServiceUnavailable: {reason}")
            }
            Self::StageFailed(stage) => write!(f, "{stage} failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::BatchAborted(reason) => write!(f, "batch aborted: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "failure", rename_all = "kebab-case")]
pub enum FileOutcome {
    Done,
    Failed(FileFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entry", rename_all = "kebab-case")]
pub enum ReportEntry {
    Artifact {
        kind: ArtifactKind,
        outcome: ArtifactOutcome,
    },
    Stage {
        stage: StageKind,
        outcome: StageOutcome,
    },
    File {
        outcome: FileOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    pub media: PathBuf,
    pub file_name: String,
    pub entry: ReportEntry,
    pub recorded_at: DateTime<Local>,
}

/// 一次批次執行的結果紀錄，只能追加
///
/// 多個工作執行緒同時追加，每筆紀錄在鎖內一次寫入。
#[derive(Debug)]
pub struct RunReport {
    run_id: Uuid,
    started_at: DateTime<Local>,
    records: Mutex<Vec<ReportRecord>>,
    abort_reason: Mutex<Option<String>>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            records: Mutex::new(Vec::new()),
            abort_reason: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn append(&self, media: PathBuf, file_name: String, entry: ReportEntry) {
        let record = ReportRecord {
            media,
            file_name,
            entry,
            recorded_at: Local::now(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// 記錄批次中止原因，只保留第一個
    pub fn abort(&self, reason: impl Into<String>) {
        let mut guard = self
            .abort_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(reason.into());
        }
    }

    #[must_use]
    pub fn abort_reason(&self) -> Option<String> {
        self.abort_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 結束批次，之後紀錄不再變動
    #[must_use]
    pub fn finish(self) -> RunSummary {
        let records = self
            .records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let aborted = self
            .abort_reason
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut counts = OutcomeCounts::default();
        for record in &records {
            match &record.entry {
                ReportEntry::Artifact { outcome, .. } => match outcome {
                    ArtifactOutcome::SkippedAlreadyPresent => counts.artifacts_skipped += 1,
                    ArtifactOutcome::Regenerated => counts.artifacts_regenerated += 1,
                    ArtifactOutcome::GeneratedNew => counts.artifacts_generated += 1,
                    ArtifactOutcome::Failed(_) => counts.artifacts_failed += 1,
                },
                ReportEntry::Stage { .. } => {}
                ReportEntry::File { outcome } => match outcome {
                    FileOutcome::Done => counts.files_done += 1,
                    FileOutcome::Failed(_) => counts.files_failed += 1,
                },
            }
        }

        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Local::now(),
            aborted,
            counts,
            records,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub files_done: usize,
    pub files_failed: usize,
    pub artifacts_generated: usize,
    pub artifacts_regenerated: usize,
    pub artifacts_skipped: usize,
    pub artifacts_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub aborted: Option<String>,
    pub counts: OutcomeCounts,
    pub records: Vec<ReportRecord>,
}

impl RunSummary {
    /// 有任何檔案失敗或批次中止時為 1
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.counts.files_failed > 0 || self.aborted.is_some() {
            1
        } else {
            0
        }
    }

    #[must_use]
    pub fn file_outcomes(&self) -> Vec<(&ReportRecord, &FileOutcome)> {
        self.records
            .iter()
            .filter_map(|record| match &record.entry {
                ReportEntry::File { outcome } => Some((record, outcome)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn artifact_outcomes_for(&self, file_name: &str) -> Vec<(ArtifactKind, &ArtifactOutcome)> {
        let mut outcomes: Vec<_> = self
            .records
            .iter()
            .filter(|record| record.file_name == file_name)
            .filter_map(|record| match &record.entry {
                ReportEntry::Artifact { kind, outcome } => Some((*kind, outcome)),
                _ => None,
            })
            .collect();
        outcomes.sort_by_key(|(kind, _)| *kind);
        outcomes
    }

    #[must_use]
    pub fn duration(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn artifact(kind: ArtifactKind, outcome: ArtifactOutcome) -> ReportEntry {
        ReportEntry::Artifact { kind, outcome }
    }

    #[test]
    fn test_concurrent_append() {
        let report = Arc::new(RunReport::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let report = Arc::clone(&report);
                thread::spawn(move || {
                    for kind in ArtifactKind::ALL {
                        report.append(
                            PathBuf::from(format!("/v/{i}.mp4")),
                            format!("{i}.mp4"),
                            artifact(kind, ArtifactOutcome::GeneratedNew),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = Arc::try_unwrap(report).unwrap();
        assert_eq!(report.len(), 32);
        let summary = report.finish();
        assert_eq!(summary.counts.artifacts_generated, 32);
        assert_eq!(summary.artifact_outcomes_for("3.mp4").len(), 4);
    }

    #[test]
    fn test_exit_code() {
        let report = RunReport::new();
        report.append(
            PathBuf::from("/v/a.mp4"),
            "a.mp4".to_string(),
            ReportEntry::File {
                outcome: FileOutcome::Done,
            },
        );
        assert_eq!(report.finish().exit_code(), 0);

        let report = RunReport::new();
        report.append(
            PathBuf::from("/v/b.mp4"),
            "b.mp4".to_string(),
            ReportEntry::File {
                outcome: FileOutcome::Failed(FileFailure::UnparsableName("b.mp4".to_string())),
            },
        );
        let summary = report.finish();
        assert_eq!(summary.counts.files_failed, 1);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_abort_keeps_first_reason() {
        let report = RunReport::new();
        report.abort("disk full");
        report.abort("second");
        assert_eq!(report.abort_reason().as_deref(), Some("disk full"));

        let summary = report.finish();
        assert_eq!(summary.aborted.as_deref(), Some("disk full"));
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_record_serializes() {
        let report = RunReport::new();
        report.append(
            PathBuf::from("/v/a.mp4"),
            "a.mp4".to_string(),
            artifact(
                ArtifactKind::CoverImage,
                ArtifactOutcome::Failed("boom".to_string()),
            ),
        );
        let summary = report.finish();
        let json = serde_json::to_value(&summary.records[0]).unwrap();

        assert_eq!(json["entry"]["entry"], "artifact");
        assert_eq!(json["entry"]["outcome"]["status"], "failed");
        assert_eq!(json["entry"]["outcome"]["reason"], "boom");
    }
}
