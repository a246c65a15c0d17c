pub mod artifact_layout;
pub mod atomic_output;
mod contact_sheet_merger;
mod disk_monitor;
pub mod ffmpeg_runner;
mod ffprobe_info;
pub mod media_scanner;
mod path_validator;
mod timestamp_selector;

pub use artifact_layout::{ArtifactFamily, ArtifactKind, ArtifactLayout, ArtifactNaming};
pub use atomic_output::{
    CommitError, CommitMode, Fingerprint, StagedOutput, sweep_stale_partials, write_atomically,
};
pub use contact_sheet_merger::{SheetHeader, SheetLayout, create_contact_sheet, escape_filter_path};
pub use disk_monitor::DiskMonitor;
pub use ffmpeg_runner::{FfmpegError, FfmpegRunner, format_hms, split_seek};
pub use ffprobe_info::{VideoInfo, get_video_info};
pub use media_scanner::{MediaFile, ScanFilter, scan_media_files};
pub use path_validator::{ensure_directory_exists, validate_directory_exists};
pub use timestamp_selector::{
    ClipSlot, max_sample_count, select_clip_slots, select_uniform_timestamps,
};
