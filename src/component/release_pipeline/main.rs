use super::orchestrator::{Collaborators, ReleasePipeline};
use super::run_report::{ArtifactOutcome, FileOutcome, RunReport, RunSummary};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::tools::{ArtifactLayout, ScanFilter, scan_media_files, validate_directory_exists};
use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use log::{info, warn};
use rust_i18n::t;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 「準備發佈」功能：選擇資料夾後跑完整條管線
pub struct ReleasePreparer<'a> {
    config: &'a mut Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl<'a> ReleasePreparer<'a> {
    pub fn new(config: &'a mut Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    /// 互動模式，取消選擇資料夾時回傳 `None`
    pub fn run(&mut self) -> Result<Option<RunSummary>> {
        println!("{}", style(t!("pipeline.title")).cyan().bold());

        let Some(directory) = self.prompt_directory()? else {
            return Ok(None);
        };
        self.run_in(&directory).map(Some)
    }

    pub fn run_in(&mut self, directory: &Path) -> Result<RunSummary> {
        validate_directory_exists(directory)?;
        let settings = &self.config.settings;
        settings
            .validate()
            .with_context(|| t!("pipeline.invalid_settings").to_string())?;

        let layout = ArtifactLayout::from_settings(settings);
        let filter = ScanFilter {
            extensions: &settings.media_extensions,
            ignore_list: &settings.ignore_list,
            layout: &layout,
        };
        let media_files = scan_media_files(directory, &filter)?;

        let directory_text = directory.to_string_lossy().to_string();
        add_recent_path(&mut self.config.settings, &directory_text);
        if let Err(e) = save_settings(self.config) {
            warn!("無法儲存最近使用的路徑: {e:#}");
        }

        if media_files.is_empty() {
            println!("{}", style(t!("pipeline.no_files")).yellow());
            return Ok(RunReport::new().finish());
        }
        println!(
            "{}",
            style(t!("pipeline.found_files", count = media_files.len())).green()
        );
        for (index, media) in media_files.iter().enumerate() {
            println!("  {}. {}", index + 1, media.file_name());
        }
        println!();

        let collaborators =
            Collaborators::from_settings(&self.config.settings, &self.shutdown_signal)?;
        let pipeline = ReleasePipeline::new(
            &self.config.settings,
            collaborators,
            Arc::clone(&self.shutdown_signal),
        )?;
        let summary = pipeline.run(&media_files);

        print_summary(&summary);
        Ok(summary)
    }

    fn prompt_directory(&self) -> Result<Option<PathBuf>> {
        let recent = &self.config.settings.recent_paths;
        if !recent.is_empty() {
            let mut items: Vec<String> = recent.clone();
            items.push(t!("pipeline.enter_new_path").to_string());

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt(t!("pipeline.choose_path"))
                .items(&items)
                .default(0)
                .interact_opt()?;
            match selection {
                Some(index) if index < recent.len() => {
                    return Ok(Some(PathBuf::from(&recent[index])));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("pipeline.input_path"))
            .allow_empty(true)
            .interact_text()?;
        let path = path.trim();
        Ok((!path.is_empty()).then(|| PathBuf::from(path)))
    }
}

pub fn print_summary(summary: &RunSummary) {
    let counts = &summary.counts;
    println!();
    println!("{}", style(t!("summary.title")).cyan().bold());
    println!("  {} {}", style(t!("summary.run_id")).dim(), summary.run_id);

    for (record, outcome) in summary.file_outcomes() {
        let status = match outcome {
            FileOutcome::Done => style(t!("summary.done").to_string()).green(),
            FileOutcome::Failed(failure) => {
                style(format!("{} ({failure})", t!("summary.failed"))).red()
            }
        };
        println!("  {} {status}", record.file_name);
        for (kind, artifact) in summary.artifact_outcomes_for(&record.file_name) {
            let line = format!("      {kind:<18} {artifact}");
            match artifact {
                ArtifactOutcome::Failed(_) => println!("{}", style(line).red()),
                ArtifactOutcome::SkippedAlreadyPresent => println!("{}", style(line).dim()),
                _ => println!("{line}"),
            }
        }
    }

    println!();
    println!(
        "  {}",
        t!(
            "summary.files",
            done = counts.files_done,
            failed = counts.files_failed
        )
    );
    println!(
        "  {}",
        t!(
            "summary.artifacts",
            generated = counts.artifacts_generated,
            regenerated = counts.artifacts_regenerated,
            skipped = counts.artifacts_skipped,
            failed = counts.artifacts_failed
        )
    );
    if let Some(reason) = &summary.aborted {
        println!(
            "  {}",
            style(t!("summary.aborted", reason = reason)).red().bold()
        );
    }

    info!(
        "批次摘要 - 完成: {}, 失敗: {}, 產生: {}, 重新產生: {}, 保留: {}, 產物失敗: {}",
        counts.files_done,
        counts.files_failed,
        counts.artifacts_generated,
        counts.artifacts_regenerated,
        counts.artifacts_skipped,
        counts.artifacts_failed
    );
}
