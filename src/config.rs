//! Tool configuration module.
//!
//! Handles loading, validating, and layering `tutorial-tools.toml`. Every key
//! has a stock default; a config file in the tutorial's working directory only
//! needs the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [project]
//! # title = "My Tutorial"   # Overrides the metadata.yaml title
//! metadata_files = ["../support/metadata.yaml", "../metadata/metadata.yaml"]
//! # repository = "imp_tutorial"  # Overrides `git config remote.origin.url`
//! github_owner = "salilab"
//! license_file = "LICENSE"  # Relative to the repository top
//!
//! [docs]
//! doc_root = "https://integrativemodeling.org"
//! stable_release = "2.17.0"
//! stable_branch = "main"
//! tag_doctypes = ["manual", "ref"]
//!
//! [doxygen]
//! binary = "doxygen"
//! support_dir = "../support/tutorial_tools/doxygen"
//!
//! [notebook]
//! template_prefix = ".template."
//! python = "python3"
//! shell = "sh"
//!
//! [cache]
//! dir = ".cache"
//! max_age_secs = 86400
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "tutorial-tools.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `tutorial-tools.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Project identity: title, repository, license.
    pub project: ProjectConfig,
    /// Where the reference documentation lives and which version to link to.
    pub docs: DocsConfig,
    /// Doxygen binary and layout/header/footer templates.
    pub doxygen: DoxygenConfig,
    /// Notebook template naming and interpreters used for cell outputs.
    pub notebook: NotebookConfig,
    /// On-disk cache for downloaded tag files and inventories.
    pub cache: CacheConfig,
}

impl ToolConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.docs.doc_root.starts_with("http://") || self.docs.doc_root.starts_with("https://"))
        {
            return Err(ConfigError::Validation(
                "docs.doc_root must be an http(s) URL".into(),
            ));
        }
        if self.docs.stable_release.trim().is_empty() {
            return Err(ConfigError::Validation(
                "docs.stable_release must not be empty".into(),
            ));
        }
        if self.docs.tag_doctypes.is_empty() {
            return Err(ConfigError::Validation(
                "docs.tag_doctypes must not be empty".into(),
            ));
        }
        if self.notebook.template_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "notebook.template_prefix must not be empty".into(),
            ));
        }
        if self.project.github_owner.is_empty() {
            return Err(ConfigError::Validation(
                "project.github_owner must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Explicit project title. When absent, read from the metadata files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Candidate metadata files (relative to the working directory); the
    /// first one that exists supplies the `title:` key.
    pub metadata_files: Vec<String>,
    /// Repository name used in edit links. When absent, derived from the
    /// `origin` remote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// GitHub account that owns the tutorial repositories.
    pub github_owner: String,
    /// License file, relative to the repository top.
    pub license_file: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            title: None,
            metadata_files: vec![
                "../support/metadata.yaml".to_string(),
                "../metadata/metadata.yaml".to_string(),
            ],
            repository: None,
            github_owner: "salilab".to_string(),
            license_file: "LICENSE".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocsConfig {
    /// Root URL of the published reference documentation.
    pub doc_root: String,
    /// Latest stable release; linked to from the stable branch.
    pub stable_release: String,
    /// Branch whose tutorials target the stable release. All other branches
    /// link to the nightly documentation.
    pub stable_branch: String,
    /// Tag files to download, by documentation type.
    pub tag_doctypes: Vec<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            doc_root: "https://integrativemodeling.org".to_string(),
            stable_release: "2.17.0".to_string(),
            stable_branch: "main".to_string(),
            tag_doctypes: vec!["manual".to_string(), "ref".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DoxygenConfig {
    /// Doxygen executable, looked up on `PATH` unless it contains a slash.
    pub binary: String,
    /// Directory holding `layout.xml`, `header.html`, and `footer.html`,
    /// relative to the working directory.
    pub support_dir: String,
}

impl Default for DoxygenConfig {
    fn default() -> Self {
        Self {
            binary: "doxygen".to_string(),
            support_dir: "../support/tutorial_tools/doxygen".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotebookConfig {
    /// Filename prefix of notebook templates (`<prefix><root>.ipynb`).
    pub template_prefix: String,
    /// Python interpreter used to generate cell outputs.
    pub python: String,
    /// Shell used to generate cell outputs for bash notebooks.
    pub shell: String,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            template_prefix: ".template.".to_string(),
            python: "python3".to_string(),
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache directory, relative to the working directory.
    pub dir: String,
    /// Cached files older than this are fetched again.
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: ".cache".to_string(),
            max_age_secs: 86_400,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ToolConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ToolConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<ToolConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `tutorial-tools.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tutorial-tools configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file next to the notebook templates (the directory you run
# tutorial-tools in). Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Project identity
# ---------------------------------------------------------------------------
[project]
# Title used for the doxygen PROJECT_NAME. When omitted, the `title:` key of
# the first existing metadata file below is used.
# title = "My Tutorial"

# Metadata files to search for the title, relative to this directory.
metadata_files = ["../support/metadata.yaml", "../metadata/metadata.yaml"]

# Repository name for "Edit on GitHub" links. When omitted, it is derived
# from `git config --get remote.origin.url`.
# repository = "imp_tutorial"

# GitHub account hosting the repository.
github_owner = "salilab"

# License file, relative to the top of the repository. A CC BY-SA 4.0
# license adds a license badge to every page.
license_file = "LICENSE"

# ---------------------------------------------------------------------------
# Reference documentation
# ---------------------------------------------------------------------------
[docs]
# Root URL of the published documentation.
doc_root = "https://integrativemodeling.org"

# The stable branch links to this release; other branches link to nightly.
stable_release = "2.17.0"
stable_branch = "main"

# Doxygen tag files to download (<doc_root>/<version>/doc/<type>-tags.xml).
tag_doctypes = ["manual", "ref"]

# ---------------------------------------------------------------------------
# Doxygen
# ---------------------------------------------------------------------------
[doxygen]
binary = "doxygen"

# Directory with layout.xml, header.html and footer.html.
support_dir = "../support/tutorial_tools/doxygen"

# ---------------------------------------------------------------------------
# Notebooks
# ---------------------------------------------------------------------------
[notebook]
# Templates are named <template_prefix><root>.ipynb.
template_prefix = ".template."

# Interpreters used when a template asks for generated cell outputs.
python = "python3"
shell = "sh"

# ---------------------------------------------------------------------------
# Download cache
# ---------------------------------------------------------------------------
[cache]
dir = ".cache"

# Re-download cached files older than this (seconds).
max_age_secs = 86400
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_links_to_integrativemodeling() {
        let config = ToolConfig::default();
        assert_eq!(config.docs.doc_root, "https://integrativemodeling.org");
        assert_eq!(config.docs.stable_branch, "main");
        assert_eq!(config.docs.tag_doctypes, vec!["manual", "ref"]);
    }

    #[test]
    fn default_config_has_notebook_settings() {
        let config = ToolConfig::default();
        assert_eq!(config.notebook.template_prefix, ".template.");
        assert_eq!(config.notebook.python, "python3");
        assert_eq!(config.cache.max_age(), Duration::from_secs(86_400));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[docs]
stable_release = "2.20.2"
"#;
        let config: ToolConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.docs.stable_release, "2.20.2");
        // Defaults preserved
        assert_eq!(config.docs.stable_branch, "main");
        assert_eq!(config.doxygen.binary, "doxygen");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
[docs]
stable_relase = "2.20.2"
"#;
        let result: Result<ToolConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn merge_toml_overlay_wins_and_base_survives() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: ToolConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ToolConfig::default();
        assert_eq!(config.docs.stable_release, defaults.docs.stable_release);
        assert_eq!(config.project.metadata_files, defaults.project.metadata_files);
        assert_eq!(config.cache.max_age_secs, defaults.cache.max_age_secs);
        assert!(config.project.title.is_none());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.docs.stable_release, "2.17.0");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[project]
title = "RNA Pol II stalk"
repository = "imp_tutorial"

[cache]
max_age_secs = 60
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.project.title.as_deref(), Some("RNA Pol II stalk"));
        assert_eq!(config.project.repository.as_deref(), Some("imp_tutorial"));
        assert_eq!(config.cache.max_age_secs, 60);
        assert_eq!(config.project.github_owner, "salilab");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validate_rejects_non_http_doc_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[docs]\ndoc_root = \"ftp://example.org\"\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_empty_doctypes() {
        let mut config = ToolConfig::default();
        config.docs.tag_doctypes.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
