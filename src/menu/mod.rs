//! 互動式選單

mod handlers;
mod main_menu;

pub use handlers::{run_batch_once, run_release_preparer};
pub use main_menu::{run_main_menu, show_main_menu};
