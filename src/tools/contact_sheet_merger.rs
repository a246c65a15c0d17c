use crate::tools::ffmpeg_runner::{FfmpegError, FfmpegRunner};
use log::debug;
use std::path::{Path, PathBuf};

/// 縮圖表的排版
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub header: Option<SheetHeader>,
}

/// 縮圖表上方的文字標題
#[derive(Debug, Clone, PartialEq)]
pub struct SheetHeader {
    /// 文字內容寫在檔案中，避免濾鏡跳脫問題
    pub text_file: PathBuf,
    pub line_count: u32,
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
}

impl SheetHeader {
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.font_size * (self.line_count + 1) + self.font_size / 2
    }
}

impl SheetLayout {
    #[must_use]
    pub const fn tile_count(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    /// 最終尺寸（含標題）
    #[must_use]
    pub fn sheet_size(&self) -> (u32, u32) {
        let header = self.header.as_ref().map_or(0, SheetHeader::height);
        (
            self.columns * self.tile_width,
            self.rows * self.tile_height + header,
        )
    }
}

/// 使用 ffmpeg xstack 濾鏡把縮圖合併成一張圖
pub fn create_contact_sheet(
    runner: &FfmpegRunner,
    tiles: &[PathBuf],
    output_path: &Path,
    layout: &SheetLayout,
) -> Result<(), FfmpegError> {
    let expected = layout.tile_count();
    if tiles.len() != expected {
        return Err(FfmpegError::Failed {
            code: None,
            stderr: format!("縮圖數量不符: 需要 {expected} 張，實際 {} 張", tiles.len()),
        });
    }

    debug!(
        "合併 {} 張縮圖為 {}x{} 縮圖表",
        tiles.len(),
        layout.columns,
        layout.rows
    );

    let mut args: Vec<String> = Vec::with_capacity(tiles.len() * 2 + 8);
    for tile in tiles {
        args.push("-i".to_string());
        args.push(tile.to_string_lossy().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        build_filter(layout),
        "-map".to_string(),
        "[sheet]".to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-update".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        output_path.to_string_lossy().to_string(),
    ]);

    runner.run(&args, &|_| {})
}

fn build_filter(layout: &SheetLayout) -> String {
    let count = layout.tile_count();
    let mut filter = if count == 1 {
        "[0:v]null[grid]".to_string()
    } else {
        let inputs: String = (0..count).map(|i| format!("[{i}:v]")).collect();
        format!(
            "{inputs}xstack=inputs={count}:layout={}[grid]",
            build_xstack_layout(layout)
        )
    };

    match &layout.header {
        Some(header) => {
            let height = header.height();
            let font = header
                .font_file
                .as_ref()
                .map(|f| format!("fontfile='{}':", escape_filter_path(f)))
                .unwrap_or_default();
            filter.push_str(&format!(
                ";[grid]pad=iw:ih+{height}:0:{height}:color=black,\
                 drawtext={font}textfile='{}':fontsize={}:fontcolor=white:\
                 x={}:y={}:line_spacing={}[sheet]",
                escape_filter_path(&header.text_file),
                header.font_size,
                header.font_size / 2,
                header.font_size / 2,
                header.font_size / 4,
            ));
        }
        None => filter.push_str(";[grid]null[sheet]"),
    }
    filter
}

/// 每個位置為 `x_y`，以 `|` 分隔
fn build_xstack_layout(layout: &SheetLayout) -> String {
    let mut positions = Vec::with_capacity(layout.tile_count());
    for row in 0..layout.rows {
        for col in 0..layout.columns {
            let x = col * layout.tile_width;
            let y = row * layout.tile_height;
            positions.push(format!("{x}_{y}"));
        }
    }
    positions.join("|")
}

/// 濾鏡參數中的路徑需跳脫 `\`、`'` 與 `:`
#[must_use]
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}
