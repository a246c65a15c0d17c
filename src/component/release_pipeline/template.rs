use super::run_report::StageKind;
use super::stages::{ReleaseStage, StageContext};
use crate::config::AssembleSettings;
use crate::tools::{ArtifactKind, format_hms, write_atomically};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z_]+)\}\}").expect("Invalid regex"));

const DEFAULT_TEMPLATE: &str = "\
{{TITLE}}

Studio: {{STUDIO}}
Release date: {{DATE}}
Performers: {{PERFORMERS}}
Duration: {{DURATION}}
Resolution: {{RESOLUTION}}
Codec: {{CODEC}}
Scene: {{SCENE_URL}}
Poster: {{SCENE_IMAGE}}

{{DESCRIPTION}}

Cover: {{COVER}}
Thumbnails: {{THUMBNAILS}}
Preview: {{PREVIEW}}
Video: {{VIDEO}}

Tags: {{TAGS}}

{{MEDIAINFO}}
";

/// 以 `{{PLACEHOLDER}}` 取代產生發佈說明
pub struct TemplateAssembler {
    template: String,
    suffix: String,
}

impl TemplateAssembler {
    pub fn from_settings(settings: &AssembleSettings) -> Result<Self> {
        let template = match &settings.template_path {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("無法讀取範本檔: {}", path.display()))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self::new(template, settings.suffix.clone()))
    }

    #[must_use]
    pub const fn new(template: String, suffix: String) -> Self {
        Self { template, suffix }
    }

    /// 任何一行只要引用了缺少的值就整行省略，未知的名稱原樣保留
    #[must_use]
    pub fn render(&self, values: &HashMap<&'static str, Option<String>>) -> String {
        let mut output = String::with_capacity(self.template.len());
        for line in self.template.lines() {
            let missing = PLACEHOLDER_REGEX
                .captures_iter(line)
                .any(|caps| matches!(values.get(&caps[1]), Some(None)));
            if missing {
                continue;
            }

            let rendered = PLACEHOLDER_REGEX.replace_all(line, |caps: &regex::Captures| {
                match values.get(&caps[1]) {
                    Some(Some(value)) => value.clone(),
                    _ => caps[0].to_string(),
                }
            });
            output.push_str(&rendered);
            output.push('\n');
        }
        output
    }

    fn values(context: &StageContext<'_>) -> HashMap<&'static str, Option<String>> {
        let scene = context.scene;
        let non_empty = |text: &str| (!text.trim().is_empty()).then(|| text.trim().to_string());
        let artifact_name = |kind: ArtifactKind| {
            context
                .artifact(kind)
                .and_then(|path| path.file_name())
                .map(|name| name.to_string_lossy().to_string())
        };
        let info = context.source_info;

        HashMap::from([
            ("TITLE", Some(release_title(context))),
            ("SCENE_TITLE", non_empty(&scene.title)),
            ("STUDIO", studio(context)),
            (
                "DATE",
                release_date(context).map(|date| date.format("%Y-%m-%d").to_string()),
            ),
            ("PERFORMERS", non_empty(&scene.performers.join(", "))),
            ("TAGS", non_empty(&scene.tags.join(" "))),
            ("DESCRIPTION", non_empty(&scene.description)),
            ("SCENE_URL", scene.url.clone()),
            ("SCENE_IMAGE", scene.image_url.clone()),
            ("COVER", artifact_name(ArtifactKind::CoverImage)),
            ("THUMBNAILS", artifact_name(ArtifactKind::ThumbnailSheet)),
            ("PREVIEW", artifact_name(ArtifactKind::AnimatedPreview)),
            ("VIDEO", artifact_name(ArtifactKind::ReencodedVideo)),
            ("DURATION", info.map(|i| format_hms(i.duration_seconds))),
            ("RESOLUTION", info.map(|i| i.resolution())),
            ("CODEC", info.map(|i| i.codec_name.clone())),
            ("MEDIAINFO", mediainfo_text(context)),
        ])
    }
}

fn mediainfo_text(context: &StageContext<'_>) -> Option<String> {
    let path = context.stage_output(StageKind::Mediainfo)?;
    match fs::read_to_string(path) {
        Ok(text) => Some(text.trim_end().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            warn!("無法讀取 mediainfo 輸出 {}: {e}", path.display());
            None
        }
    }
}

fn studio(context: &StageContext<'_>) -> Option<String> {
    context
        .scene
        .studio
        .clone()
        .or_else(|| context.identity.studio.clone())
}

fn release_date(context: &StageContext<'_>) -> Option<chrono::NaiveDate> {
    context.scene.release_date.or(context.identity.release_date)
}

/// `Studio - YYYY-Month-DD - Title - Performers[ - Suffix]`，缺少的欄位省略
#[must_use]
pub fn release_title(context: &StageContext<'_>) -> String {
    let scene = context.scene;
    let mut parts = Vec::new();
    if let Some(studio) = studio(context) {
        parts.push(studio);
    }
    if let Some(date) = release_date(context) {
        parts.push(date.format("%Y-%B-%d").to_string());
    }
    if !scene.title.trim().is_empty() {
        parts.push(scene.title.trim().to_string());
    } else {
        parts.push(context.media.base_name.clone());
    }
    if !scene.performers.is_empty() {
        parts.push(scene.performers.join(", "));
    }
    if let Some(suffix) = context.identity.release_suffix() {
        parts.push(suffix.to_string());
    }
    parts.join(" - ")
}

impl ReleaseStage for TemplateAssembler {
    fn kind(&self) -> StageKind {
        StageKind::Assembling
    }

    fn run(&self, context: &StageContext<'_>) -> Result<PathBuf> {
        let target = context
            .layout
            .sidecar_path(context.media, &format!("{}.txt", self.suffix));
        let text = self.render(&Self::values(context));
        debug!("範本共 {} 行", text.lines().count());

        let path = write_atomically(&target, text.as_bytes())
            .with_context(|| format!("無法寫入範本: {}", target.display()))?;
        info!("已產生發佈說明: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::identity_resolver::{Resolver, StrictFormatResolver};
    use crate::component::scene_matcher::SceneRecord;
    use crate::config::UserSettings;
    use crate::tools::{ArtifactLayout, MediaFile, VideoInfo};
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::TempDir;

    fn scene() -> SceneRecord {
        SceneRecord {
            scene_id: "42".to_string(),
            title: "Morning Light".to_string(),
            studio: Some("Studio".to_string()),
            release_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            performers: vec!["Jane Doe".to_string()],
            tags: vec!["outdoor".to_string(), "4k".to_string()],
            description: "A scene.".to_string(),
            url: None,
            image_url: None,
            duration_seconds: Some(1800),
        }
    }

    #[test]
    fn test_render_drops_lines_with_missing_values() {
        let assembler = TemplateAssembler::new(
            "Title: {{TITLE}}\nCover: {{COVER}}\nOther: {{UNKNOWN}}\n".to_string(),
            ".template".to_string(),
        );
        let values = HashMap::from([
            ("TITLE", Some("A".to_string())),
            ("COVER", None),
        ]);

        assert_eq!(assembler.render(&values), "Title: A\nOther: {{UNKNOWN}}\n");
    }

    #[test]
    fn test_release_title_with_suffix() {
        let media = MediaFile::from_path(Path::new("/v/Studio.24.01.02.Jane.Doe.BTS.mp4")).unwrap();
        let identity = StrictFormatResolver.resolve(&media.file_name()).unwrap();
        let layout = ArtifactLayout::from_settings(&UserSettings::default());
        let scene = scene();
        let artifacts = HashMap::new();
        let stage_outputs = HashMap::new();
        let context = StageContext {
            media: &media,
            identity: &identity,
            scene: &scene,
            layout: &layout,
            artifacts: &artifacts,
            source_info: None,
            stage_outputs: &stage_outputs,
        };

        assert_eq!(
            release_title(&context),
            "Studio - 2024-January-02 - Morning Light - Jane Doe - BTS"
        );
    }

    #[test]
    fn test_run_writes_template_without_missing_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("Studio.24.01.02.Jane.Doe.mp4");
        fs::write(&source, b"video").unwrap();
        let media = MediaFile::from_path(&source).unwrap();
        let identity = StrictFormatResolver.resolve(&media.file_name()).unwrap();
        let layout = ArtifactLayout::from_settings(&UserSettings::default());
        let scene = scene();
        let cover = layout.expected_path(&media, ArtifactKind::CoverImage);
        let artifacts = HashMap::from([(ArtifactKind::CoverImage, cover)]);
        let info = VideoInfo {
            duration_seconds: 1800.0,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            codec_name: "hevc".to_string(),
        };
        let mediainfo = temp_dir.path().join("Studio.24.01.02.Jane.Doe_mediainfo.txt");
        fs::write(&mediainfo, "General\nFormat : MPEG-4\n\n").unwrap();
        let stage_outputs = HashMap::from([(StageKind::Mediainfo, mediainfo)]);
        let context = StageContext {
            media: &media,
            identity: &identity,
            scene: &scene,
            layout: &layout,
            artifacts: &artifacts,
            source_info: Some(&info),
            stage_outputs: &stage_outputs,
        };

        let assembler = TemplateAssembler::from_settings(&AssembleSettings::default()).unwrap();
        let path = assembler.run(&context).unwrap();
        assert_eq!(
            path,
            temp_dir
                .path()
                .join("Studio.24.01.02.Jane.Doe")
                .join("Studio.24.01.02.Jane.Doe.template.txt")
        );

        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("Cover: Studio.24.01.02.Jane.Doe.cover.jpg"));
        assert!(text.contains("Duration: 00:30:00"));
        assert!(!text.contains("Preview:"));
        assert!(!text.contains("Scene:"));
        assert!(!text.contains("Poster:"));
        assert!(text.contains("General\nFormat : MPEG-4\n"));
        assert!(!text.contains("{{"));
    }
}
