//! Command implementations for the bottle-bomb CLI
//!
//! - **fetch**: fetch a formula, pick a bottle, download it

pub mod fetch;

pub use fetch::{Outcome, drive_download, fetch};
