use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "scene_packager")]
#[command(author, version, about = "Prepare scene releases: artifacts, template, upload and torrent")]
pub struct Cli {
    /// 直接處理這個資料夾，省略時進入互動選單
    pub directory: Option<PathBuf>,
}
