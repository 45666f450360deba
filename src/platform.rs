//! Platform tags and the download options derived from them.
//!
//! Homebrew publishes one bottle per platform tag:
//! - `<arch>_<os_version>` for Apple Silicon, e.g. `arm64_sonoma`
//! - the bare macOS codename for Intel, e.g. `sonoma`
//! - `arm64_linux` / `x86_64_linux` for Linux
//! - `all` for architecture-independent bottles
//!
//! [`download_options`] turns a formula's bottle map into the ordered menu the
//! user picks from.

use crate::api::Formula;
use anyhow::Result;
#[cfg(target_os = "macos")]
use anyhow::Context;
#[cfg(target_os = "macos")]
use std::process::Command;

/// Known bottle tags in menu order, with their display labels.
pub const BOTTLE_TAGS: &[(&str, &str)] = &[
    ("arm64_tahoe", "macOS Tahoe (arm64)"),
    ("arm64_sequoia", "macOS Sequoia (arm64)"),
    ("arm64_sonoma", "macOS Sonoma (arm64)"),
    ("arm64_ventura", "macOS Ventura (arm64)"),
    ("arm64_monterey", "macOS Monterey (arm64)"),
    ("arm64_big_sur", "macOS Big Sur (arm64)"),
    ("tahoe", "macOS Tahoe (x86_64)"),
    ("sequoia", "macOS Sequoia (x86_64)"),
    ("sonoma", "macOS Sonoma (x86_64)"),
    ("ventura", "macOS Ventura (x86_64)"),
    ("monterey", "macOS Monterey (x86_64)"),
    ("big_sur", "macOS Big Sur (x86_64)"),
    ("arm64_linux", "Linux (arm64)"),
    ("x86_64_linux", "Linux (x86_64)"),
    ("all", "All platforms"),
];

/// One selectable bottle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOption {
    pub label: String,
    pub url: String,
    pub sha256: String,
    pub tag: String,
}

impl std::fmt::Display for DownloadOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

/// Display label for a bottle tag; unknown tags are shown verbatim.
pub fn label_for_tag(tag: &str) -> String {
    BOTTLE_TAGS
        .iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| tag.to_string())
}

/// Build the menu of bottles with a non-empty URL.
///
/// Known tags keep the order of [`BOTTLE_TAGS`]; any tag Homebrew adds later is
/// appended in lexical order.
pub fn download_options(formula: &Formula) -> Vec<DownloadOption> {
    let Some(files) = formula.bottle_files() else {
        return Vec::new();
    };

    let mut tags: Vec<&String> = files
        .iter()
        .filter(|(_, file)| !file.url.trim().is_empty())
        .map(|(tag, _)| tag)
        .collect();

    tags.sort_by_key(|tag| {
        let rank = BOTTLE_TAGS
            .iter()
            .position(|(known, _)| known == tag)
            .unwrap_or(BOTTLE_TAGS.len());
        (rank, tag.to_string())
    });

    tags.into_iter()
        .map(|tag| {
            let file = &files[tag];
            DownloadOption {
                label: label_for_tag(tag),
                url: file.url.clone(),
                sha256: file.sha256.clone(),
                tag: tag.clone(),
            }
        })
        .collect()
}

/// Index of the option built for `tag`, falling back to the `all` bottle.
pub fn preferred_index(options: &[DownloadOption], tag: &str) -> Option<usize> {
    options
        .iter()
        .position(|o| o.tag == tag)
        .or_else(|| options.iter().position(|o| o.tag == "all"))
}

/// Detect the current system platform for bottle selection.
///
/// Examples of returned tags:
/// - `arm64_sequoia` - Apple Silicon on macOS 15
/// - `sonoma` - Intel on macOS 14
/// - `x86_64_linux` - x86_64 Linux
///
/// # Errors
///
/// Returns an error if `sw_vers` is unavailable on macOS, or on platforms
/// Homebrew does not build bottles for.
pub fn detect_bottle_tag() -> Result<String> {
    #[cfg(target_os = "macos")]
    {
        let os_name = macos_name(&macos_version()?);
        // Intel bottles carry the bare codename
        match std::env::consts::ARCH {
            "aarch64" => Ok(format!("arm64_{}", os_name)),
            _ => Ok(os_name.to_string()),
        }
    }

    #[cfg(target_os = "linux")]
    {
        let arch = match std::env::consts::ARCH {
            "aarch64" => "arm64",
            other => other,
        };
        Ok(format!("{}_linux", arch))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        anyhow::bail!("Unsupported platform")
    }
}

#[cfg(target_os = "macos")]
fn macos_version() -> Result<String> {
    let output = Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .context("Failed to run sw_vers")?;

    let version = String::from_utf8(output.stdout)
        .context("Invalid UTF-8 in sw_vers output")?
        .trim()
        .to_string();

    Ok(version)
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn macos_name(version: &str) -> &'static str {
    let major: u32 = version
        .split('.')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    match major {
        26 | 16 => "tahoe",
        15 => "sequoia",
        14 => "sonoma",
        13 => "ventura",
        12 => "monterey",
        11 => "big_sur",
        _ => "sonoma",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Bottle, BottleData, BottleFile};
    use std::collections::HashMap;

    fn formula_with(files: &[(&str, &str)]) -> Formula {
        let files: HashMap<String, BottleFile> = files
            .iter()
            .map(|(tag, url)| {
                (
                    tag.to_string(),
                    BottleFile {
                        cellar: ":any".to_string(),
                        url: url.to_string(),
                        sha256: format!("sha-{}", tag),
                    },
                )
            })
            .collect();

        Formula {
            name: "jq".to_string(),
            full_name: "jq".to_string(),
            desc: None,
            homepage: None,
            versions: Default::default(),
            dependencies: vec![],
            build_dependencies: vec![],
            bottle: Some(Bottle {
                stable: Some(BottleData {
                    files,
                    ..Default::default()
                }),
            }),
        }
    }

    #[test]
    fn test_no_bottles_gives_no_options() {
        let mut formula = formula_with(&[]);
        assert!(download_options(&formula).is_empty());

        formula.bottle = None;
        assert!(download_options(&formula).is_empty());
    }

    #[test]
    fn test_empty_urls_are_skipped() {
        let formula = formula_with(&[("arm64_sonoma", ""), ("x86_64_linux", "  ")]);
        assert!(download_options(&formula).is_empty());
    }

    #[test]
    fn test_single_bottle_uses_canonical_label() {
        let formula = formula_with(&[
            ("arm64_sonoma", "https://example/jq-arm64.tar.gz"),
            ("sonoma", ""),
        ]);
        let options = download_options(&formula);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "macOS Sonoma (arm64)");
        assert_eq!(options[0].url, "https://example/jq-arm64.tar.gz");
        assert_eq!(options[0].sha256, "sha-arm64_sonoma");
    }

    #[test]
    fn test_options_follow_canonical_order() {
        let formula = formula_with(&[
            ("x86_64_linux", "u1"),
            ("sonoma", "u2"),
            ("zz_future", "u3"),
            ("arm64_ventura", "u4"),
            ("arm64_sonoma", "u5"),
            ("aa_future", "u6"),
        ]);
        let labels: Vec<_> = download_options(&formula)
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "macOS Sonoma (arm64)",
                "macOS Ventura (arm64)",
                "macOS Sonoma (x86_64)",
                "Linux (x86_64)",
                "aa_future",
                "zz_future",
            ]
        );
    }

    #[test]
    fn test_preferred_index() {
        let formula = formula_with(&[("arm64_sonoma", "a"), ("x86_64_linux", "b"), ("all", "c")]);
        let options = download_options(&formula);
        assert_eq!(preferred_index(&options, "x86_64_linux"), Some(1));
        assert_eq!(preferred_index(&options, "arm64_linux"), Some(2));
        assert_eq!(preferred_index(&options[..2], "arm64_linux"), None);
    }

    #[test]
    fn test_detect_bottle_tag() {
        let tag = detect_bottle_tag().unwrap();
        assert!(!tag.is_empty());
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert_eq!(tag, "x86_64_linux");
        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert!(tag.starts_with("arm64_"));
    }

    #[test]
    fn test_macos_names() {
        assert_eq!(macos_name("15.1"), "sequoia");
        assert_eq!(macos_name("14.0"), "sonoma");
        assert_eq!(macos_name("13.0"), "ventura");
        assert_eq!(macos_name("12.0"), "monterey");
        assert_eq!(macos_name("26.0"), "tahoe");
    }
}
