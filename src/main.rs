use anyhow::Result;
use clap::Parser;
use console::Term;
use log::{info, warn};
use scene_packager::cli::Cli;
use scene_packager::config::Config;
use scene_packager::init;
use scene_packager::menu::{run_batch_once, run_main_menu};
use scene_packager::set_language;
use scene_packager::signal::setup_shutdown_signal;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init::init();
    let term = Term::stdout();
    let shutdown_signal = setup_shutdown_signal()?;

    let mut config = Config::new()?;
    set_language(config.settings.language.as_str());

    // 指定資料夾時直接執行一次批次，不進入選單
    let exit_code = match cli.directory {
        Some(directory) => run_batch_once(&directory, &shutdown_signal, &mut config)?,
        None => run_main_menu(&term, &shutdown_signal, &mut config)?,
    };

    if exit_code == 0 {
        info!("Program exited normally");
    } else {
        warn!("Program exited with failures (exit code {exit_code})");
        std::process::exit(exit_code);
    }

    Ok(())
}
