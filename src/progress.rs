//! Progress rendering and terminal integration
//!
//! Draws the download bar with indicatif and mirrors it to the native
//! terminal progress indicator (OSC 9;4) where the terminal supports one.

use crate::download::ProgressSample;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

const ERROR_HOLD: Duration = Duration::from_millis(200);

/// Terminal capabilities for native progress integration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminalCapabilities {
    /// OSC 9;4 support (Ghostty, Windows Terminal, ConEmu)
    OSC94,
    /// No native progress support
    None,
}

/// Progress state for terminal indicators
#[derive(Debug, Clone, Copy)]
pub enum ProgressState {
    Off = 0,
    Normal = 1,
    Error = 2,
    Indeterminate = 3,
}

/// Detects terminal capabilities
pub fn detect_terminal_capabilities() -> TerminalCapabilities {
    match env::var("TERM_PROGRAM").ok().as_deref() {
        Some("ghostty") | Some("WezTerm") => return TerminalCapabilities::OSC94,
        _ => {}
    }

    if env::var("WT_SESSION").is_ok() || env::var("ConEmuPID").is_ok() {
        return TerminalCapabilities::OSC94;
    }

    // Unsupported terminals ignore the sequence
    TerminalCapabilities::OSC94
}

/// Set terminal progress using OSC 9;4
pub fn set_terminal_progress(progress: u8, state: ProgressState) {
    let progress = progress.min(100);
    print!("\x1b]9;4;{};{}\x1b\\", state as u8, progress);
    let _ = io::stdout().flush();
}

/// Clear terminal progress
pub fn clear_terminal_progress() {
    set_terminal_progress(0, ProgressState::Off);
}

/// Helper to check if we should show progress indicators
pub fn should_show_progress() -> bool {
    if !io::stdout().is_terminal() {
        return false;
    }
    env::var("NO_COLOR").is_err()
}

/// Percentage shown for a sample, `None` while indeterminate.
pub fn percent(sample: &ProgressSample) -> Option<u8> {
    sample
        .fraction()
        .map(|f| (f * 100.0).round().clamp(0.0, 100.0) as u8)
}

fn bar_style(width: usize) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!(
            "{{msg}} [{{bar:{}.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}})",
            width
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Download progress view: a bar when the size is known, a spinner otherwise.
pub struct DownloadProgress {
    bar: ProgressBar,
    capabilities: TerminalCapabilities,
    determinate: bool,
    width: usize,
}

impl DownloadProgress {
    pub fn new(label: &str, width: usize, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(spinner_style());
        bar.set_message(format!("⬇ {}", label));
        bar.enable_steady_tick(Duration::from_millis(100));

        let capabilities = if visible {
            detect_terminal_capabilities()
        } else {
            TerminalCapabilities::None
        };
        if capabilities == TerminalCapabilities::OSC94 {
            set_terminal_progress(0, ProgressState::Indeterminate);
        }

        Self {
            bar,
            capabilities,
            determinate: false,
            width,
        }
    }

    pub fn update(&mut self, sample: &ProgressSample) {
        if let Some(total) = sample.total {
            if !self.determinate {
                self.determinate = true;
                self.bar.disable_steady_tick();
                self.bar.set_style(bar_style(self.width));
            }
            self.bar.set_length(total);
        }
        self.bar.set_position(sample.downloaded);

        if self.capabilities == TerminalCapabilities::OSC94
            && let Some(percent) = percent(sample)
        {
            set_terminal_progress(percent, ProgressState::Normal);
        }
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width;
        if self.determinate {
            self.bar.set_style(bar_style(width));
        }
    }

    pub fn finish_success(&mut self, message: String) {
        self.bar.finish_with_message(message);
        if self.capabilities == TerminalCapabilities::OSC94 {
            set_terminal_progress(100, ProgressState::Normal);
        }
    }

    /// Abandon the bar and raise the terminal's error indicator. Returns how
    /// long the indicator should stay up before the view is dropped.
    pub fn finish_error(&mut self) -> Duration {
        self.bar.abandon();
        if self.capabilities == TerminalCapabilities::OSC94 {
            set_terminal_progress(100, ProgressState::Error);
            ERROR_HOLD
        } else {
            Duration::ZERO
        }
    }

    pub fn clear(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for DownloadProgress {
    fn drop(&mut self) {
        if self.capabilities == TerminalCapabilities::OSC94 {
            clear_terminal_progress();
        }
    }
}
