use crate::component::ReleasePreparer;
use crate::config::Config;
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use rust_i18n::t;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 從選單執行一次批次，回傳批次的結束代碼
pub fn run_release_preparer(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<i32> {
    let mut preparer = ReleasePreparer::new(config, Arc::clone(shutdown_signal));

    let exit_code = match preparer.run() {
        Ok(Some(summary)) => summary.exit_code(),
        Ok(None) => 0,
        Err(e) => {
            eprintln!("{} {e:#}", style(t!("common.error")).red().bold());
            1
        }
    };

    pause(term)?;
    Ok(exit_code)
}

/// 非互動模式：直接處理指定資料夾
pub fn run_batch_once(
    directory: &Path,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<i32> {
    let mut preparer = ReleasePreparer::new(config, Arc::clone(shutdown_signal));
    let summary = preparer.run_in(directory)?;
    Ok(summary.exit_code())
}
