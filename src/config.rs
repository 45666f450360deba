//! Runtime configuration.
//!
//! Values are resolved in three layers: built-in defaults, Homebrew's own
//! environment variables, then command-line flags.
//!
//! **Environment Variables**:
//! - `HOMEBREW_API_DOMAIN`: base URL of the formula JSON API
//! - `HOMEBREW_DOCKER_REGISTRY_TOKEN`: bearer token sent to the bottle registry

use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://formulae.brew.sh/api";

/// Anonymous token accepted by ghcr.io for public Homebrew bottles
pub const ANONYMOUS_REGISTRY_TOKEN: &str = "QQ==";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub registry_token: String,
    pub output_dir: PathBuf,
    pub verify_checksum: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            registry_token: ANONYMOUS_REGISTRY_TOKEN.to_string(),
            output_dir: PathBuf::from("."),
            verify_checksum: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(domain) = lookup("HOMEBREW_API_DOMAIN").filter(|v| !v.trim().is_empty()) {
            config.api_base = domain.trim_end_matches('/').to_string();
        }
        if let Some(token) = lookup("HOMEBREW_DOCKER_REGISTRY_TOKEN").filter(|v| !v.is_empty()) {
            config.registry_token = token;
        }

        config
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output_dir = dir;
        }
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Destination of a formula's bottle: `<output-dir>/<name>.tar.gz`
    pub fn destination_for(&self, formula_name: &str) -> PathBuf {
        bottle_file_name(&self.output_dir, formula_name)
    }
}

fn bottle_file_name(dir: &Path, formula_name: &str) -> PathBuf {
    dir.join(format!("{}.tar.gz", formula_name))
}
