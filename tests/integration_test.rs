//! 整合測試 - 管線在各種既有檔案狀態與錯誤下的行為

mod common;

use common::{
    FILE_NAME, FakeGenerator, FakeProvider, Harness, artifact_path, partial_files,
    writing_generators, write_source,
};
use scene_packager::component::artifact_generator::{ArtifactGenerator, GenerateError};
use scene_packager::component::release_pipeline::{
    ArtifactOutcome, FileFailure, FileOutcome, ReportEntry, StageKind, StageOutcome,
};
use scene_packager::component::scene_matcher::ProviderError;
use scene_packager::config::RegenerationPolicy;
use scene_packager::tools::ArtifactKind;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn seed_existing_artifacts(directory: &Path) {
    for kind in ArtifactKind::ALL {
        let path = artifact_path(directory, kind);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("old {kind}")).unwrap();
    }
}

/// 測試 1: force-keep 不會呼叫產生器，也不改動既有檔案
#[test]
fn test_force_keep_leaves_bytes_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);
    seed_existing_artifacts(temp_dir.path());

    let generator = FakeGenerator::writing(ArtifactKind::CoverImage, b"new");
    let calls = Arc::clone(&generator.calls);
    let mut generators = writing_generators();
    generators[1] = Box::new(generator);

    let mut harness = Harness {
        generators,
        ..Harness::default()
    };
    harness.settings.regeneration.video = RegenerationPolicy::ForceKeep;
    harness.settings.regeneration.images = RegenerationPolicy::ForceKeep;

    let summary = harness.run(temp_dir.path());

    assert_eq!(summary.counts.artifacts_skipped, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    for kind in ArtifactKind::ALL {
        assert_eq!(
            fs::read_to_string(artifact_path(temp_dir.path(), kind)).unwrap(),
            format!("old {kind}")
        );
    }
    assert_eq!(summary.counts.files_done, 1);
}

/// 測試 2: force-regenerate 只留下新內容，沒有暫存檔殘留
#[test]
fn test_force_regenerate_replaces_content() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);
    seed_existing_artifacts(temp_dir.path());

    let mut harness = Harness::default();
    harness.settings.regeneration.video = RegenerationPolicy::ForceRegenerate;
    harness.settings.regeneration.images = RegenerationPolicy::ForceRegenerate;

    let summary = harness.run(temp_dir.path());

    assert_eq!(summary.counts.artifacts_regenerated, 4);
    for kind in ArtifactKind::ALL {
        assert_eq!(
            fs::read_to_string(artifact_path(temp_dir.path(), kind)).unwrap(),
            format!("new {kind}")
        );
    }
    assert!(partial_files(temp_dir.path()).is_empty());
}

/// 測試 3: 單一產物無法轉檔不影響其他產物與下游階段
#[test]
fn test_transcode_unavailable_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);

    let mut generators = writing_generators();
    generators[1] = Box::new(FakeGenerator::failing(
        ArtifactKind::CoverImage,
        GenerateError::TranscodeUnavailable("ffmpeg 不存在".to_string()),
    ));
    let harness = Harness {
        generators,
        ..Harness::default()
    };

    let summary = harness.run(temp_dir.path());

    let outcomes = summary.artifact_outcomes_for(FILE_NAME);
    assert_eq!(outcomes.len(), 4);
    for (kind, outcome) in outcomes {
        if kind == ArtifactKind::CoverImage {
            assert!(outcome.is_failed());
        } else {
            assert_eq!(*outcome, ArtifactOutcome::GeneratedNew);
        }
    }
    assert!(!artifact_path(temp_dir.path(), ArtifactKind::CoverImage).exists());
    assert!(partial_files(temp_dir.path()).is_empty());

    // 範本仍會產生，只是省略封面那一行
    let template = summary
        .records
        .iter()
        .find_map(|record| match &record.entry {
            ReportEntry::Stage {
                stage: StageKind::Assembling,
                outcome: StageOutcome::Completed { output },
            } => Some(output.clone()),
            _ => None,
        })
        .unwrap();
    let text = fs::read_to_string(template).unwrap();
    assert!(!text.contains("Cover:"));
    assert!(text.contains("Thumbnails:"));
    assert_eq!(summary.counts.files_done, 1);
}

/// 測試 4: 重新產生失敗時保留原本的檔案
#[test]
fn test_failed_regeneration_keeps_previous_file() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);
    seed_existing_artifacts(temp_dir.path());

    let mut generators = writing_generators();
    generators[2] = Box::new(FakeGenerator::failing(
        ArtifactKind::ThumbnailSheet,
        GenerateError::TranscodeFailed("exit 1".to_string()),
    ));
    let mut harness = Harness {
        generators,
        ..Harness::default()
    };
    harness.settings.regeneration.images = RegenerationPolicy::ForceRegenerate;
    harness.settings.regeneration.video = RegenerationPolicy::ForceKeep;

    let summary = harness.run(temp_dir.path());

    assert_eq!(
        fs::read_to_string(artifact_path(temp_dir.path(), ArtifactKind::ThumbnailSheet)).unwrap(),
        "old thumbnail-sheet"
    );
    assert_eq!(summary.counts.artifacts_failed, 1);
    assert_eq!(summary.counts.artifacts_regenerated, 1);
    assert_eq!(summary.counts.artifacts_skipped, 2);
}

/// 測試 5: 重複執行不會重做已存在的產物
#[test]
fn test_second_run_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);

    let first = Harness::default().run(temp_dir.path());
    assert_eq!(first.counts.artifacts_generated, 4);

    let mut harness = Harness::default();
    harness.settings.regeneration.video = RegenerationPolicy::ForceKeep;
    harness.settings.regeneration.images = RegenerationPolicy::ForceKeep;
    let second = harness.run(temp_dir.path());

    assert_eq!(second.counts.artifacts_generated, 0);
    assert_eq!(second.counts.artifacts_skipped, 4);
    assert_ne!(first.run_id, second.run_id);
}

/// 測試 6: 找不到場景與服務無法使用是不同的失敗
#[test]
fn test_match_failures_are_distinguished() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);

    let empty = Harness {
        provider: FakeProvider::returning(Ok(Vec::new())),
        ..Harness::default()
    };
    let summary = empty.run(temp_dir.path());
    assert!(matches!(
        summary.file_outcomes()[0].1,
        FileOutcome::Failed(FileFailure::NoMatchFound(_))
    ));

    let provider = FakeProvider::returning(Err(ProviderError::Transient("timeout".to_string())));
    let queries = Arc::clone(&provider.queries);
    let unavailable = Harness {
        provider,
        ..Harness::default()
    };
    let summary = unavailable.run(temp_dir.path());
    assert!(matches!(
        summary.file_outcomes()[0].1,
        FileOutcome::Failed(FileFailure::MatchServiceUnavailable(_))
    ));
    // 預設最多嘗試 3 次
    assert_eq!(queries.lock().unwrap().len(), 3);
    assert!(summary.artifact_outcomes_for(FILE_NAME).is_empty());
}

/// 測試 7: 磁碟空間耗盡時停止排程
#[test]
fn test_storage_exhausted_aborts_batch() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);
    write_source(temp_dir.path(), "Studio.24.01.03.Jane.Doe.mp4");
    write_source(temp_dir.path(), "Studio.24.01.04.Jane.Doe.mp4");

    let generators: Vec<Box<dyn ArtifactGenerator>> = ArtifactKind::ALL
        .into_iter()
        .map(|kind| {
            Box::new(FakeGenerator::failing(
                kind,
                GenerateError::StorageExhausted("No space left on device".to_string()),
            )) as Box<dyn ArtifactGenerator>
        })
        .collect();
    let mut harness = Harness {
        generators,
        ..Harness::default()
    };
    harness.settings.workers = 1;

    let summary = harness.run(temp_dir.path());

    assert!(summary.aborted.is_some());
    assert_eq!(summary.counts.artifacts_generated, 0);
    assert_eq!(summary.exit_code(), 1);
}

/// 測試 8: 已中斷時不再排程任何檔案
#[test]
fn test_cancelled_before_start() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);

    let harness = Harness::default();
    harness.shutdown_signal.store(true, Ordering::SeqCst);
    let summary = harness.run(temp_dir.path());

    assert_eq!(summary.counts.files_failed, 1);
    assert!(matches!(
        summary.file_outcomes()[0].1,
        FileOutcome::Failed(FileFailure::Cancelled)
    ));
    assert!(!temp_dir.path().join(common::BASE_NAME).exists());
}

/// 測試 9: 下游階段失敗時檔案標記為失敗
#[test]
fn test_stage_failure_marks_file_failed() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);

    let mut harness = Harness::default();
    harness.settings.stages.torrent.enabled = true;
    harness.settings.stages.torrent.announce_url = "https://tracker.example/announce".to_string();
    harness.settings.stages.torrent.mktorrent_path = "/nonexistent/mktorrent".to_string();

    let summary = harness.run(temp_dir.path());

    assert!(matches!(
        summary.file_outcomes()[0].1,
        FileOutcome::Failed(FileFailure::StageFailed(StageKind::TorrentCreating))
    ));
    assert_eq!(summary.counts.artifacts_generated, 4);
}

/// 測試 10: 暫存檔在開始前清除
#[test]
fn test_stale_partials_are_swept() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);
    let output_dir = temp_dir.path().join(common::BASE_NAME);
    fs::create_dir_all(&output_dir).unwrap();
    fs::write(
        output_dir.join(".Studio.24.01.02.Jane.Doe.cover.jpg.partial-abc123.jpg"),
        b"half",
    )
    .unwrap();

    let summary = Harness::default().run(temp_dir.path());

    assert!(partial_files(temp_dir.path()).is_empty());
    assert_eq!(summary.counts.artifacts_generated, 4);
}

/// 測試 11: 產物寫入期間，正式路徑只會是舊內容或完整的新內容
#[test]
fn test_replacement_is_never_observed_half_written() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), FILE_NAME);
    seed_existing_artifacts(temp_dir.path());

    let cover = artifact_path(temp_dir.path(), ArtifactKind::CoverImage);
    let old_bytes = fs::read(&cover).unwrap();
    let new_bytes: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();

    let mut generators = writing_generators();
    generators[1] = Box::new(FakeGenerator::slowly(
        ArtifactKind::CoverImage,
        &new_bytes,
        Duration::from_millis(3),
    ));
    let mut harness = Harness {
        generators,
        ..Harness::default()
    };
    harness.settings.regeneration.images = RegenerationPolicy::ForceRegenerate;

    let finished = AtomicBool::new(false);
    let (summary, observed) = thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut observed = Vec::new();
            while !finished.load(Ordering::SeqCst) {
                observed.push(fs::read(&cover));
                thread::sleep(Duration::from_millis(1));
            }
            observed.push(fs::read(&cover));
            observed
        });
        let summary = harness.run(temp_dir.path());
        finished.store(true, Ordering::SeqCst);
        (summary, reader.join().unwrap())
    });

    assert_eq!(summary.counts.files_done, 1);
    assert!(observed.len() > 1);
    for read in &observed {
        let bytes = read.as_ref().expect("canonical path must stay readable");
        assert!(
            *bytes == old_bytes || *bytes == new_bytes,
            "observed {} bytes that are neither the old nor the new file",
            bytes.len()
        );
    }
    assert_eq!(observed.last().unwrap().as_ref().unwrap(), &new_bytes);
    assert!(partial_files(temp_dir.path()).is_empty());
}

/// 測試 12: 第一個搜尋字串沒有結果時依序改用備用字串
#[test]
fn test_empty_results_fall_through_to_fallback_queries() {
    let temp_dir = TempDir::new().unwrap();
    let file_name = "Studio.24.01.02.Jane.Doe.Part.2.mp4";
    write_source(temp_dir.path(), file_name);

    let provider = FakeProvider::matching_after(2);
    let queries = Arc::clone(&provider.queries);
    let harness = Harness {
        provider,
        ..Harness::default()
    };

    let summary = harness.run(temp_dir.path());

    assert_eq!(
        *queries.lock().unwrap(),
        vec![
            "Studio.24.01.02.Jane.Doe.Part.2",
            "Studio.24.01.02.Jane.Doe.Part.two",
            "Studio.Jane.Doe.Part.2",
        ]
    );
    assert_eq!(*summary.file_outcomes()[0].1, FileOutcome::Done);
}
