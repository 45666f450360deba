//! Library interface for bottle-bomb
//!
//! Fetches a Homebrew formula, offers its bottles for every platform and
//! downloads the chosen one. The pieces are exposed for testing.

pub mod api;
pub mod colors;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod flow;
pub mod platform;
pub mod progress;

// Re-export commonly used types
pub use api::{BrewApi, Formula};
pub use config::Config;
pub use error::{BottleError, Result};
pub use flow::{DownloadFlow, DownloadState, Effect, FlowEvent};
