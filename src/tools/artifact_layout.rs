//! 產物命名規則
//!
//! 每種產物的輸出路徑只由來源檔名與產物種類決定，檢查器、產生器與
//! 後續階段（範本、上傳、torrent）都依賴同一套規則。

use crate::config::{OutputLayout, UserSettings};
use crate::tools::media_scanner::MediaFile;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    ReencodedVideo,
    CoverImage,
    ThumbnailSheet,
    AnimatedPreview,
}

impl ArtifactKind {
    pub const ALL: [Self; 4] = [
        Self::ReencodedVideo,
        Self::CoverImage,
        Self::ThumbnailSheet,
        Self::AnimatedPreview,
    ];

    #[must_use]
    pub const fn family(self) -> ArtifactFamily {
        match self {
            Self::ReencodedVideo | Self::AnimatedPreview => ArtifactFamily::Video,
            Self::CoverImage | Self::ThumbnailSheet => ArtifactFamily::Images,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReencodedVideo => "re-encoded-video",
            Self::CoverImage => "cover-image",
            Self::ThumbnailSheet => "thumbnail-sheet",
            Self::AnimatedPreview => "animated-preview",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::ReencodedVideo => 0,
            Self::CoverImage => 1,
            Self::ThumbnailSheet => 2,
            Self::AnimatedPreview => 3,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 重新產生策略以家族為單位設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFamily {
    Video,
    Images,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    pub suffix: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    layout: OutputLayout,
    naming: [ArtifactNaming; 4],
}

impl ArtifactLayout {
    #[must_use]
    pub fn from_settings(settings: &UserSettings) -> Self {
        let naming = |suffix: &str, extension: &str| ArtifactNaming {
            suffix: suffix.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        };

        Self {
            layout: settings.layout,
            naming: [
                naming(&settings.reencode.suffix, &settings.reencode.container),
                naming(&settings.cover.suffix, &settings.cover.format),
                naming(&settings.thumbnails.suffix, &settings.thumbnails.format),
                naming(&settings.preview.suffix, settings.preview.format.extension()),
            ],
        }
    }

    #[must_use]
    pub const fn layout(&self) -> OutputLayout {
        self.layout
    }

    #[must_use]
    pub const fn naming(&self, kind: ArtifactKind) -> &ArtifactNaming {
        &self.naming[kind.index()]
    }

    /// 產物所在資料夾
    #[must_use]
    pub fn output_dir(&self, media: &MediaFile) -> PathBuf {
        match self.layout {
            OutputLayout::SubDirectory => media.directory().join(&media.base_name),
            OutputLayout::SameDirectory => media.directory().to_path_buf(),
        }
    }

    #[must_use]
    pub fn file_name(&self, base_name: &str, kind: ArtifactKind) -> String {
        let naming = self.naming(kind);
        format!("{base_name}{}.{}", naming.suffix, naming.extension)
    }

    #[must_use]
    pub fn expected_path(&self, media: &MediaFile, kind: ArtifactKind) -> PathBuf {
        self.output_dir(media)
            .join(self.file_name(&media.base_name, kind))
    }

    /// 非產物的附屬輸出，例如 `<base>.template.txt`
    #[must_use]
    pub fn sidecar_path(&self, media: &MediaFile, tail: &str) -> PathBuf {
        self.output_dir(media)
            .join(format!("{}{tail}", media.base_name))
    }

    /// 同資料夾模式下判斷檔名是否為某個來源的產物
    #[must_use]
    pub fn is_artifact_name(&self, file_name: &str) -> bool {
        if self.layout != OutputLayout::SameDirectory {
            return false;
        }
        let lower = file_name.to_lowercase();
        self.naming
            .iter()
            .filter(|naming| !naming.suffix.is_empty())
            .any(|naming| {
                let tail = format!("{}.{}", naming.suffix, naming.extension).to_lowercase();
                lower.len() > tail.len() && lower.ends_with(&tail)
            })
    }
}
