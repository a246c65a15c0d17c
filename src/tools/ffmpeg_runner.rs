use log::{debug, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::process::{ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// stderr 只保留最後幾行作為錯誤訊息
const STDERR_TAIL_LINES: usize = 12;

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("無法執行 {0}")]
    NotFound(String),
    #[error("ffmpeg 缺少所需的編碼器或濾鏡: {0}")]
    MissingComponent(String),
    #[error("磁碟空間不足: {0}")]
    StorageFull(String),
    #[error("ffmpeg 已中斷")]
    Cancelled,
    #[error("ffmpeg 結束碼 {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("無法與 ffmpeg 程序溝通: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_ms: u64,
}

/// 以子程序執行 ffmpeg，讀取 `-progress` 輸出並在收到中斷信號時終止
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: String,
    shutdown_signal: Arc<AtomicBool>,
}

impl FfmpegRunner {
    #[must_use]
    pub fn new(program: impl Into<String>, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            program: program.into(),
            shutdown_signal,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }

    /// 執行 ffmpeg，`on_progress` 收到已處理的秒數
    pub fn run(&self, args: &[String], on_progress: &dyn Fn(f64)) -> Result<(), FfmpegError> {
        if self.is_cancelled() {
            return Err(FfmpegError::Cancelled);
        }

        let mut command = Command::new(&self.program);
        command
            .args(["-hide_banner", "-nostdin", "-loglevel", "error"])
            .args(["-progress", "pipe:1", "-nostats", "-y"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("{} {}", self.program, args.join(" "));

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FfmpegError::NotFound(self.program.clone())
            } else {
                FfmpegError::Io(e)
            }
        })?;

        let progress = Arc::new(Mutex::new(ProgressState::default()));
        let progress_reader = spawn_progress_reader(child.stdout.take(), Arc::clone(&progress));
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = stderr.read_to_string(&mut buffer);
                buffer
            })
        });

        let status = loop {
            if self.is_cancelled() {
                warn!("收到中斷信號，終止 ffmpeg [{}]", child.id());
                let _ = child.kill();
                let _ = child.wait();
                join_quietly(progress_reader);
                return Err(FfmpegError::Cancelled);
            }

            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FfmpegError::Io(e));
                }
            }

            let out_time_ms = progress
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .out_time_ms;
            on_progress(out_time_ms as f64 / 1000.0);

            thread::sleep(POLL_INTERVAL);
        };

        join_quietly(progress_reader);
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        Err(classify_failure(status.code(), &stderr))
    }
}

fn join_quietly(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}

/// 從 ffmpeg 標準輸出讀取 `-progress` 的 key=value 行
fn spawn_progress_reader(
    stdout: Option<ChildStdout>,
    progress: Arc<Mutex<ProgressState>>,
) -> Option<JoinHandle<()>> {
    let stdout = stdout?;
    Some(thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        while let Ok(bytes) = reader.read_line(&mut line) {
            if bytes == 0 {
                break;
            }
            if let Some((key, value)) = line.trim().split_once('=')
                && matches!(key, "out_time_ms" | "out_time_us")
                && let Some(ms) = parse_out_time_ms(value)
            {
                progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .out_time_ms = ms;
            }
            line.clear();
        }
    }))
}

/// `out_time_ms` 的單位其實是微秒
fn parse_out_time_ms(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().map(|us| us / 1000)
}

fn classify_failure(code: Option<i32>, stderr: &str) -> FfmpegError {
    let tail = stderr_tail(stderr);

    if stderr.contains("No space left on device") {
        return FfmpegError::StorageFull(tail);
    }
    if ["Unknown encoder", "Encoder not found", "No such filter"]
        .iter()
        .any(|marker| stderr.contains(marker))
    {
        return FfmpegError::MissingComponent(tail);
    }
    FfmpegError::Failed { code, stderr: tail }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// 秒數轉為 `HH:MM:SS`
#[must_use]
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// 兩段式 seek 的參數：輸入前快速跳到關鍵幀，輸入後精準解碼
#[must_use]
pub fn split_seek(timestamp: f64, margin: f64) -> (f64, f64) {
    let coarse = (timestamp - margin).max(0.0);
    (coarse, timestamp - coarse)
}
