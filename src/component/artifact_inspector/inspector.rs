use crate::component::operator::{ExistingArtifact, ExistingChoice, Operator};
use crate::config::{RegenerationPolicy, RegenerationSettings};
use crate::tools::{ArtifactFamily, ArtifactKind, ArtifactLayout, Fingerprint, MediaFile};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Generate,
    /// 帶著決策當下既有檔案的識別資訊，取代前會再比對一次
    Regenerate(Fingerprint),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub decision: Decision,
}

pub struct ArtifactInspector<'a> {
    layout: &'a ArtifactLayout,
    policies: RegenerationSettings,
}

impl<'a> ArtifactInspector<'a> {
    #[must_use]
    pub const fn new(layout: &'a ArtifactLayout, policies: RegenerationSettings) -> Self {
        Self { layout, policies }
    }

    #[must_use]
    pub const fn policy_for(&self, kind: ArtifactKind) -> RegenerationPolicy {
        match kind.family() {
            ArtifactFamily::Video => self.policies.video,
            ArtifactFamily::Images => self.policies.images,
        }
    }

    /// ask-user 策略下會在呼叫端執行緒上詢問操作者
    pub fn inspect(
        &self,
        media: &MediaFile,
        kind: ArtifactKind,
        operator: &dyn Operator,
    ) -> io::Result<Inspection> {
        let path = self.layout.expected_path(media, kind);
        let policy = self.policy_for(kind);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{kind} 不存在，需要產生: {}", path.display());
                return Ok(Inspection {
                    kind,
                    path,
                    decision: Decision::Generate,
                });
            }
            Err(e) => return Err(e),
        };

        if !metadata.is_file() {
            return Err(io::Error::other(format!(
                "產物路徑不是檔案: {}",
                path.display()
            )));
        }

        let fingerprint = Fingerprint {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        };

        let decision = match policy {
            RegenerationPolicy::ForceKeep => Decision::Skip,
            RegenerationPolicy::ForceRegenerate => Decision::Regenerate(fingerprint),
            RegenerationPolicy::AskUser => {
                let existing = ExistingArtifact {
                    media_name: media.file_name(),
                    kind,
                    path: path.clone(),
                    size: fingerprint.size,
                    modified: fingerprint.modified,
                };
                match operator.existing_artifact(&existing) {
                    Ok(ExistingChoice::Keep) => Decision::Skip,
                    Ok(ExistingChoice::Regenerate) => Decision::Regenerate(fingerprint),
                    Err(e) => {
                        warn!("無法詢問操作者，保留既有的 {kind}: {e:#}");
                        Decision::Skip
                    }
                }
            }
        };

        debug!("{kind} 已存在，策略 {policy}，決定 {decision:?}");
        Ok(Inspection {
            kind,
            path,
            decision,
        })
    }
}
