//! Color support with NO_COLOR and CLICOLOR environment variable handling
//!
//! **Environment Variables**:
//! - `NO_COLOR`: If set (to any value), disable colors
//! - `CLICOLOR`: If set to 0, disable colors
//! - `CLICOLOR_FORCE`: If set to non-zero, force colors even when not a TTY
//!
//! The same decision drives both `colored` output and the selection menu.

use colored::control;
use inquire::ui::RenderConfig;

/// Configure color output for the whole program. Returns whether colors are on.
pub fn init_colors() -> bool {
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stdout());
    let enabled = colors_enabled(|key| std::env::var(key).ok(), is_tty);
    control::set_override(enabled);
    enabled
}

fn colors_enabled(lookup: impl Fn(&str) -> Option<String>, is_tty: bool) -> bool {
    // NO_COLOR takes precedence over everything (https://no-color.org/)
    if lookup("NO_COLOR").is_some() {
        return false;
    }

    if lookup("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
        return true;
    }

    if lookup("CLICOLOR").is_some_and(|v| v == "0") {
        return false;
    }

    is_tty
}

/// Menu styling matching the color decision.
pub fn menu_render_config(enabled: bool) -> RenderConfig<'static> {
    if enabled {
        RenderConfig::default()
    } else {
        RenderConfig::empty()
    }
}
