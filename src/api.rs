//! Homebrew JSON API client.
//!
//! This module provides a [`BrewApi`] client for querying a single formula from
//! Homebrew's public JSON API. Only the fields the downloader actually reads are
//! modelled; everything else in the response is dropped during deserialization.
//!
//! # Errors
//!
//! - transport failures surface as [`BottleError::NetworkError`]
//! - non-2xx responses surface as [`BottleError::FetchError`] with the status text
//! - malformed bodies surface as [`BottleError::ParseError`]
//!
//! Requests are made exactly once. There is no retry and no cache.
//!
//! # Examples
//!
//! ```no_run
//! use bottle_bomb::{BrewApi, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = BrewApi::new(&Config::from_env())?;
//!     let formula = api.fetch_formula("jq").await?;
//!     println!("Latest version: {}", formula.versions.stable.unwrap_or_default());
//!     Ok(())
//! }
//! ```

use crate::config::Config;
use crate::error::{BottleError, Result};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Homebrew formula metadata from JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub versions: Versions,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    #[serde(default)]
    pub bottle: Option<Bottle>,
}

impl Formula {
    /// Bottle files of the stable release, keyed by platform tag.
    pub fn bottle_files(&self) -> Option<&HashMap<String, BottleFile>> {
        self.bottle
            .as_ref()
            .and_then(|b| b.stable.as_ref())
            .map(|stable| &stable.files)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub stable: Option<String>,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub bottle: bool,
}

/// Bottle file metadata for a specific platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BottleFile {
    #[serde(default)]
    pub cellar: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha256: String,
}

/// Bottle metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BottleData {
    #[serde(default)]
    pub rebuild: u32,
    #[serde(default)]
    pub root_url: Option<String>,
    #[serde(default)]
    pub files: HashMap<String, BottleFile>,
}

/// Bottle information from API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bottle {
    #[serde(default)]
    pub stable: Option<BottleData>,
}

/// Homebrew API client
#[derive(Clone)]
pub struct BrewApi {
    client: reqwest::Client,
    base_url: String,
}

impl BrewApi {
    /// Create a new Homebrew API client pointed at `config.api_base`.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(format!("bottle-bomb/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// The underlying HTTP client, shared with the bottle download.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn formula_url(&self, name: &str) -> String {
        format!("{}/formula/{}.json", self.base_url, name)
    }

    /// Fetch metadata for a specific formula by name.
    ///
    /// # Errors
    ///
    /// Returns [`BottleError::FetchError`] with the HTTP status text when the API
    /// answers with anything but success, e.g. `404 Not Found` for an unknown
    /// formula.
    pub async fn fetch_formula(&self, name: &str) -> Result<Formula> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BottleError::InvalidFormulaName);
        }

        let url = self.formula_url(name);
        tracing::debug!(%url, "fetching formula");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, formula = name, "formula request failed");
            return Err(BottleError::from_status(name, status));
        }

        let body = response.bytes().await?;
        let formula: Formula = serde_json::from_slice(&body)?;

        tracing::debug!(
            formula = %formula.name,
            bottles = formula.bottle_files().map_or(0, |f| f.len()),
            "parsed formula"
        );

        Ok(formula)
    }
}
