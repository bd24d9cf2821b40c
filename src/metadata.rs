//! Project metadata: title and license.
//!
//! ## Title
//!
//! The title shown on every generated page comes from, in order:
//!
//! - `project.title` in `tutorial-tools.toml`,
//! - the `title:` key of the first metadata file that exists among
//!   `project.metadata_files` (by default `../support/metadata.yaml`, then
//!   `../metadata/metadata.yaml`, both relative to the doc directory).
//!
//! A metadata file that exists is authoritative: if it has no usable title
//! the build fails rather than falling through to the next candidate.
//!
//! ## License
//!
//! Pages get a license badge when the repository's license file is the
//! Creative Commons Attribution-ShareAlike 4.0 text. A missing license file
//! simply means no badge.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker identifying the CC BY-SA 4.0 license text.
pub const CC_BY_SA_MARKER: &str = "Attribution-ShareAlike 4.0 International";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Could not find metadata; tried {}", display_paths(.0))]
    MissingMetadata(Vec<PathBuf>),
    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid metadata in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("{0} has no title")]
    NoTitle(PathBuf),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The parts of `metadata.yaml` this tool reads; other keys are ignored.
#[derive(Debug, Deserialize)]
struct ProjectMetadata {
    title: Option<String>,
}

/// Resolve the project title; see the module docs for the order.
pub fn resolve_title(
    configured: Option<&str>,
    dir: &Path,
    candidates: &[String],
) -> Result<String, MetadataError> {
    if let Some(title) = configured.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(title.to_string());
    }
    let paths: Vec<PathBuf> = candidates.iter().map(|c| dir.join(c)).collect();
    match paths.iter().find(|p| p.exists()) {
        Some(path) => read_title(path),
        None => Err(MetadataError::MissingMetadata(paths)),
    }
}

/// Read the `title:` key of a metadata YAML file.
pub fn read_title(path: &Path) -> Result<String, MetadataError> {
    let text = fs::read_to_string(path).map_err(|source| MetadataError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata: ProjectMetadata =
        serde_yaml::from_str(&text).map_err(|source| MetadataError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    metadata
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MetadataError::NoTitle(path.to_path_buf()))
}

/// Whether the license at `path` is CC BY-SA 4.0. Missing file → `false`.
pub fn is_cc_by_sa(path: &Path) -> bool {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).contains(CC_BY_SA_MARKER))
        .unwrap_or(false)
}
