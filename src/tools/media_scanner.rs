use crate::tools::artifact_layout::ArtifactLayout;
use crate::tools::atomic_output::is_partial_name;
use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 一個待處理的來源影片
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFile {
    pub path: PathBuf,
    pub base_name: String,
    pub extension: String,
}

impl MediaFile {
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let base_name = path.file_stem()?.to_str()?.to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        if base_name.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            base_name,
            extension,
        })
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}.{}", self.base_name, self.extension)
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// 掃描條件
#[derive(Debug, Clone, Copy)]
pub struct ScanFilter<'a> {
    pub extensions: &'a [String],
    pub ignore_list: &'a [String],
    pub layout: &'a ArtifactLayout,
}

/// 掃描資料夾第一層的來源影片，依檔名排序（不分大小寫）
pub fn scan_media_files(directory: &Path, filter: &ScanFilter<'_>) -> Result<Vec<MediaFile>> {
    let mut files: Vec<MediaFile> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| is_candidate(name, filter))
        })
        .filter_map(|entry| MediaFile::from_path(entry.path()))
        .collect();

    files.sort_by_key(|file| file.file_name().to_lowercase());
    Ok(files)
}

fn is_candidate(name: &str, filter: &ScanFilter<'_>) -> bool {
    if name.starts_with('.') || is_partial_name(name) {
        return false;
    }
    if filter.ignore_list.iter().any(|ignored| ignored == name) {
        return false;
    }

    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if !filter
        .extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    {
        return false;
    }

    // 上次中斷留下的暫存或舊檔
    let lower_stem = stem.to_lowercase();
    if lower_stem.ends_with("_old") || lower_stem.ends_with("_temp") {
        return false;
    }

    !filter.layout.is_artifact_name(name)
}
