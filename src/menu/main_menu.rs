use crate::config::save::save_settings;
use crate::config::types::{Config, Language, NameMode, RegenerationPolicy};
use crate::menu::handlers::run_release_preparer;
use anyhow::Result;
use console::{Term, style};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use rust_i18n::t;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 主選單迴圈，回傳最差的批次結束代碼
pub fn run_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<i32> {
    let mut exit_code = 0;
    while show_main_menu(term, shutdown_signal, config, &mut exit_code)? {}
    Ok(exit_code)
}

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
    exit_code: &mut i32,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style(t!("main_menu.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let options = vec![
        t!("main_menu.opt_prepare"),
        t!("main_menu.opt_settings"),
        t!("main_menu.exit"),
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("main_menu.prompt"))
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            let code = run_release_preparer(term, shutdown_signal, config)?;
            *exit_code = (*exit_code).max(code);
            Ok(true)
        }
        Some(1) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        _ => Ok(false), // ESC 或離開
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style(t!("settings.title")).cyan().bold());
        println!("{}", style(t!("common.esc_hint")).dim());

        let options = vec![
            t!("settings.opt_video_policy"),
            t!("settings.opt_image_policy"),
            t!("settings.opt_name_mode"),
            t!("settings.opt_language"),
            t!("settings.back"),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("settings.prompt"))
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => {
                let current = config.settings.regeneration.video;
                if let Some(policy) = choose_setting(
                    term,
                    &t!("settings.video_policy_title"),
                    &POLICIES,
                    current,
                )? {
                    config.settings.regeneration.video = policy;
                    save_changed(current, policy, config)?;
                }
            }
            Some(1) => {
                let current = config.settings.regeneration.images;
                if let Some(policy) = choose_setting(
                    term,
                    &t!("settings.image_policy_title"),
                    &POLICIES,
                    current,
                )? {
                    config.settings.regeneration.images = policy;
                    save_changed(current, policy, config)?;
                }
            }
            Some(2) => {
                let current = config.settings.name_mode;
                if let Some(mode) = choose_setting(
                    term,
                    &t!("settings.name_mode_title"),
                    &[NameMode::StrictFormat, NameMode::FreeText],
                    current,
                )? {
                    config.settings.name_mode = mode;
                    save_changed(current, mode, config)?;
                }
            }
            Some(3) => {
                let current = config.settings.language;
                if let Some(language) = choose_setting(
                    term,
                    &t!("settings.language_title"),
                    &[Language::EnUs, Language::ZhTw],
                    current,
                )? {
                    config.settings.language = language;
                    rust_i18n::set_locale(language.as_str());
                    save_changed(current, language, config)?;
                }
            }
            _ => break, // ESC 或返回
        }
    }

    Ok(())
}

const POLICIES: [RegenerationPolicy; 3] = [
    RegenerationPolicy::AskUser,
    RegenerationPolicy::ForceRegenerate,
    RegenerationPolicy::ForceKeep,
];

/// 顯示目前值並讓使用者選擇，ESC 回傳 `None`
fn choose_setting<T: Copy + PartialEq + Display>(
    term: &Term,
    title: &str,
    options: &[T],
    current: T,
) -> Result<Option<T>> {
    term.clear_screen()?;

    println!("{}", style(title).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());
    println!("\n{} {current}\n", style(t!("settings.current")).dim());

    let items: Vec<String> = options.iter().map(ToString::to_string).collect();
    let default_index = options.iter().position(|&o| o == current).unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.choose"))
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    Ok(selection.map(|index| options[index]))
}

fn save_changed<T: PartialEq + Display>(previous: T, selected: T, config: &Config) -> Result<()> {
    if previous != selected {
        save_settings(config)?;
        println!("\n{} {selected}", style(t!("settings.saved")).green());
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
    Ok(())
}
