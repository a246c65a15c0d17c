use super::{ExistingArtifact, ExistingChoice, Operator};
use crate::component::scene_matcher::ScoredCandidate;
use crate::tools::MediaFile;
use anyhow::Result;
use chrono::{DateTime, Local};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use rust_i18n::t;

/// 以終端機提示詢問操作者
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn existing_artifact(&self, artifact: &ExistingArtifact) -> Result<ExistingChoice> {
        let modified = artifact
            .modified
            .map(|m| DateTime::<Local>::from(m).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!();
        println!(
            "{}",
            style(t!(
                "prompt.existing_artifact",
                kind = artifact.kind.as_str(),
                name = artifact.media_name
            ))
            .yellow()
        );
        println!("  {}", artifact.path.display());
        println!(
            "  {}",
            t!(
                "prompt.existing_details",
                size = format_size(artifact.size),
                modified = modified
            )
        );

        let options = [t!("prompt.keep"), t!("prompt.regenerate")];
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("prompt.choose_action"))
            .items(&options)
            .default(0)
            .interact()?;

        Ok(if selection == 1 {
            ExistingChoice::Regenerate
        } else {
            ExistingChoice::Keep
        })
    }

    fn choose_scene(&self, query: &str, candidates: &[ScoredCandidate]) -> Result<Option<usize>> {
        println!();
        println!("{}", style(t!("prompt.choose_scene", query = query)).cyan());

        let mut items: Vec<String> = candidates
            .iter()
            .map(|scored| {
                let scene = &scored.candidate;
                format!(
                    "[{:>3}] {} | {} | {} | {}",
                    scored.score,
                    scene.studio.as_deref().unwrap_or("-"),
                    scene
                        .release_date
                        .map_or_else(|| "-".to_string(), |d| d.to_string()),
                    scene.title,
                    scene.url.as_deref().unwrap_or(""),
                )
            })
            .collect();
        items.push(t!("prompt.none_of_these").to_string());

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("prompt.choose_action"))
            .items(&items)
            .default(0)
            .interact()?;

        Ok((selection < candidates.len()).then_some(selection))
    }

    fn free_text_query(&self, media: &MediaFile) -> Result<Option<String>> {
        let default = media.base_name.replace(['.', '_'], " ");
        let query: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("prompt.free_text_query", name = media.file_name()))
            .default(default)
            .interact_text()?;
        let query = query.trim().to_string();
        Ok((!query.is_empty()).then_some(query))
    }
}

fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / 1024.0 / 1024.0;
    if mb >= 1024.0 {
        format!("{:.2} GB", mb / 1024.0)
    } else {
        format!("{mb:.2} MB")
    }
}
