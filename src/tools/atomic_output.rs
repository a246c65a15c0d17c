//! 先寫暫存檔再改名的輸出
//!
//! 暫存檔與正式檔位於同一資料夾，名稱為 `.<name>.partial-XXXXXX.<ext>`。
//! 改名是唯一的發佈點；暫存檔在任何失敗路徑上都會隨 drop 刪除。

use log::{debug, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

const PARTIAL_MARKER: &str = ".partial-";

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("輸出路徑已被其他寫入者佔用: {}", .0.display())]
    Conflict(PathBuf),
    #[error("無法寫入輸出檔案 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 既有檔案的識別資訊，用於偵測取代前是否被別人改動
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl Fingerprint {
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// 目標必須不存在
    CreateNew,
    /// 目標仍是決策當下看到的那個檔案（或已不存在）才取代
    Replace(Fingerprint),
}

pub struct StagedOutput {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedOutput {
    /// 在目標所在資料夾建立暫存檔，保留副檔名讓 ffmpeg 能判斷格式
    pub fn new(target: &Path) -> Result<Self, CommitError> {
        let io_err = |source| CommitError::Io {
            path: target.to_path_buf(),
            source,
        };
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output");
        let suffix = target
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        fs::create_dir_all(dir).map_err(io_err)?;
        let file = Builder::new()
            .prefix(&format!(".{name}{PARTIAL_MARKER}"))
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(io_err)?;

        Ok(Self {
            file,
            target: target.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), CommitError> {
        self.file
            .write_all(bytes)
            .and_then(|()| self.file.flush())
            .map_err(|source| CommitError::Io {
                path: self.target.clone(),
                source,
            })
    }

    /// 將暫存檔改名為正式檔
    pub fn commit(self, mode: CommitMode) -> Result<PathBuf, CommitError> {
        let Self { file, target } = self;
        let io_err = |source| CommitError::Io {
            path: target.clone(),
            source,
        };

        let written = fs::metadata(file.path()).map_err(io_err)?;
        if written.len() == 0 {
            return Err(io_err(io::Error::new(
                io::ErrorKind::InvalidData,
                "產生的檔案是空的",
            )));
        }
        file.as_file().sync_all().map_err(io_err)?;

        match mode {
            CommitMode::CreateNew => {
                file.persist_noclobber(&target).map_err(|e| {
                    if e.error.kind() == io::ErrorKind::AlreadyExists {
                        CommitError::Conflict(target.clone())
                    } else {
                        io_err(e.error)
                    }
                })?;
            }
            CommitMode::Replace(expected) => {
                match Fingerprint::of(&target) {
                    Ok(current) if current != expected => {
                        return Err(CommitError::Conflict(target));
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(io_err(e)),
                }
                file.persist(&target).map_err(|e| io_err(e.error))?;
            }
        }

        debug!("已寫入: {}", target.display());
        Ok(target)
    }
}

/// 一次寫入小型文字輸出（範本、上傳紀錄）
pub fn write_atomically(target: &Path, bytes: &[u8]) -> Result<PathBuf, CommitError> {
    let mut staged = StagedOutput::new(target)?;
    staged.write_all(bytes)?;
    let mode = match Fingerprint::of(target) {
        Ok(existing) => CommitMode::Replace(existing),
        Err(_) => CommitMode::CreateNew,
    };
    staged.commit(mode)
}

#[must_use]
pub fn is_partial_name(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.contains(PARTIAL_MARKER)
}

/// 清除上次中斷留下的暫存檔，回傳刪除數量
pub fn sweep_stale_partials(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_partial_name(name) || !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("已清除殘留暫存檔: {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("無法清除殘留暫存檔 {}: {e}", entry.path().display()),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staged_output_keeps_extension_and_is_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("clip.cover.jpg");
        let staged = StagedOutput::new(&target).unwrap();

        let name = staged.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(".clip.cover.jpg.partial-"));
        assert!(name.ends_with(".jpg"));
        assert!(is_partial_name(&name));
        assert!(!target.exists());
    }

    #[test]
    fn test_commit_create_new() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.txt");
        let mut staged = StagedOutput::new(&target).unwrap();
        staged.write_all(b"hello").unwrap();

        let path = staged.commit(CommitMode::CreateNew).unwrap();
        assert_eq!(path, target);
        assert_eq!(fs::read(&target).unwrap(), b"hello");
        assert_eq!(sweep_stale_partials(temp_dir.path()), 0);
    }

    #[test]
    fn test_commit_create_new_conflict_keeps_existing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.txt");
        let mut staged = StagedOutput::new(&target).unwrap();
        staged.write_all(b"new").unwrap();
        fs::write(&target, b"someone else").unwrap();

        let result = staged.commit(CommitMode::CreateNew);
        assert!(matches!(result, Err(CommitError::Conflict(_))));
        assert_eq!(fs::read(&target).unwrap(), b"someone else");
        // 暫存檔隨 drop 刪除
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_commit_replace_checks_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.txt");
        fs::write(&target, b"old").unwrap();
        let seen = Fingerprint::of(&target).unwrap();

        let mut staged = StagedOutput::new(&target).unwrap();
        staged.write_all(b"replacement").unwrap();
        staged.commit(CommitMode::Replace(seen)).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"replacement");

        // 決策後被改動的檔案不會被覆蓋
        let mut staged = StagedOutput::new(&target).unwrap();
        staged.write_all(b"late").unwrap();
        let result = staged.commit(CommitMode::Replace(seen));
        assert!(matches!(result, Err(CommitError::Conflict(_))));
        assert_eq!(fs::read(&target).unwrap(), b"replacement");
    }

    #[test]
    fn test_empty_output_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.txt");
        let staged = StagedOutput::new(&target).unwrap();

        assert!(matches!(
            staged.commit(CommitMode::CreateNew),
            Err(CommitError::Io { .. })
        ));
        assert!(!target.exists());
    }

    #[test]
    fn test_write_atomically_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("clip.template.txt");
        write_atomically(&target, b"first").unwrap();
        write_atomically(&target, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn test_sweep_stale_partials() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".clip.mp4.partial-abc123.mp4"), b"x").unwrap();
        fs::write(temp_dir.path().join("clip.mp4"), b"x").unwrap();

        assert_eq!(sweep_stale_partials(temp_dir.path()), 1);
        assert!(temp_dir.path().join("clip.mp4").exists());
    }
}
