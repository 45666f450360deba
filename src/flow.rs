//! Interactive download state machine.
//!
//! [`DownloadFlow`] owns all mutable UI state. Every input (key press, window
//! resize, progress from the download task, completion or failure) arrives as
//! a [`FlowEvent`] and is applied by [`DownloadFlow::handle`], which answers
//! with the side effect the driver must perform, if any.
//!
//! ```text
//! Selecting --Confirm--> Downloading --Completed--> Done
//!     |                      |  \------Failed-----> Failed
//!     \------Cancel-------> Cancelled <--Cancel--/
//! ```
//!
//! Only `Selecting` can emit [`Effect::StartDownload`], so at most one
//! download is ever started.

use crate::api::Formula;
use crate::download::ProgressSample;
use crate::error::BottleError;
use crate::platform::{self, DownloadOption};
use std::path::PathBuf;

const PADDING: usize = 2;
const MAX_BAR_WIDTH: usize = 80;
const DEFAULT_BAR_WIDTH: usize = 40;

/// Inputs to the state machine.
#[derive(Debug)]
pub enum FlowEvent {
    /// User confirmed the option at this index
    Confirm(usize),
    /// Esc or Ctrl-C in the menu, Ctrl-C during a download
    Cancel,
    /// Terminal width changed
    Resize(usize),
    Progress(ProgressSample),
    Completed { path: PathBuf, bytes: u64 },
    Failed(BottleError),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartDownload(DownloadOption),
    AbortDownload,
    Exit,
}

#[derive(Debug)]
pub enum DownloadState {
    Selecting,
    Downloading {
        option: DownloadOption,
        progress: Option<ProgressSample>,
    },
    Done {
        path: PathBuf,
        bytes: u64,
    },
    Failed(BottleError),
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Done { .. } | DownloadState::Failed(_) | DownloadState::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DownloadState::Selecting => "selecting",
            DownloadState::Downloading { .. } => "downloading",
            DownloadState::Done { .. } => "done",
            DownloadState::Failed(_) => "failed",
            DownloadState::Cancelled => "cancelled",
        }
    }
}

pub struct DownloadFlow {
    formula: Formula,
    options: Vec<DownloadOption>,
    state: DownloadState,
    bar_width: usize,
}

impl DownloadFlow {
    pub fn new(formula: Formula) -> Self {
        let options = platform::download_options(&formula);
        Self {
            formula,
            options,
            state: DownloadState::Selecting,
            bar_width: DEFAULT_BAR_WIDTH,
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn options(&self) -> &[DownloadOption] {
        &self.options
    }

    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    pub fn bar_width(&self) -> usize {
        self.bar_width
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Latest progress sample while downloading.
    pub fn progress(&self) -> Option<ProgressSample> {
        match &self.state {
            DownloadState::Downloading { progress, .. } => *progress,
            _ => None,
        }
    }

    /// Apply one event. Events that make no sense in the current state are
    /// dropped.
    pub fn handle(&mut self, event: FlowEvent) -> Option<Effect> {
        if let FlowEvent::Resize(width) = event {
            self.bar_width = bar_width_for(width);
            return None;
        }

        let state = std::mem::replace(&mut self.state, DownloadState::Cancelled);
        let from = state.name();
        let (next, effect) = match (state, event) {
            (DownloadState::Selecting, FlowEvent::Confirm(index)) => {
                match self.options.get(index) {
                    Some(option) => (
                        DownloadState::Downloading {
                            option: option.clone(),
                            progress: None,
                        },
                        Some(Effect::StartDownload(option.clone())),
                    ),
                    None => (DownloadState::Selecting, None),
                }
            }
            (DownloadState::Selecting, FlowEvent::Cancel) => {
                (DownloadState::Cancelled, Some(Effect::Exit))
            }

            (DownloadState::Downloading { option, progress }, FlowEvent::Progress(sample)) => {
                let progress = match progress {
                    Some(prev) if prev.downloaded > sample.downloaded => Some(prev),
                    _ => Some(sample),
                };
                (DownloadState::Downloading { option, progress }, None)
            }
            (DownloadState::Downloading { .. }, FlowEvent::Completed { path, bytes }) => {
                (DownloadState::Done { path, bytes }, Some(Effect::Exit))
            }
            (DownloadState::Downloading { .. }, FlowEvent::Failed(err)) => {
                (DownloadState::Failed(err), Some(Effect::Exit))
            }
            (DownloadState::Downloading { .. }, FlowEvent::Cancel) => {
                (DownloadState::Cancelled, Some(Effect::AbortDownload))
            }

            (state, FlowEvent::Cancel) if state.is_terminal() => (state, Some(Effect::Exit)),
            (state, event) => {
                tracing::trace!(state = state.name(), ?event, "ignored event");
                (state, None)
            }
        };

        if from != next.name() {
            tracing::debug!(from, to = next.name(), "transition");
        }
        self.state = next;
        effect
    }
}

/// Progress bar width for a terminal `width` columns wide.
pub fn bar_width_for(width: usize) -> usize {
    width
        .saturating_sub(PADDING * 2 + 4)
        .clamp(1, MAX_BAR_WIDTH)
}
