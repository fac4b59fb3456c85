//! Screens are [`MenuDelegate`](core_menu::MenuDelegate) implementations over the one generic
//! menu controller.

pub mod config_editor;
pub mod log_viewer;
pub mod main_screen;
pub mod value_editor;
pub mod variables;

use core_config::Config;
use core_menu::MenuOptions;

/// Options shared by every screen, derived from the `[ui]` config section.
pub(crate) fn menu_options(config: &Config, label: impl Into<String>) -> MenuOptions {
    MenuOptions::new(label)
        .ascii_only(config.file.ui.ascii_only)
        .poll_timeout(config.poll_timeout())
}
