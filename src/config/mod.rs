pub mod load;
pub mod save;
pub mod types;

pub use types::{
    AmbiguityPolicy, AssembleSettings, Config, CoverSettings, CoverTimestamp, Language,
    MAX_RECENT_PATHS, MatcherSettings, MediainfoSettings, NameMode, NotifierSettings,
    OutputLayout, PreviewFormat, PreviewSettings, PreviewTransition, ReencodeSettings,
    RegenerationPolicy, RegenerationSettings, RetrySettings, StageSettings, StoredApiKeys,
    ThumbnailSettings, TorrentSettings, UploadSettings, UserSettings,
};
