//! Jupyter notebook (`.ipynb`) documents.
//!
//! Only the parts of the nbformat schema the tool rewrites are typed: the
//! cell list, each cell's kind, source lines and outputs, and the kernel
//! language. Everything else (cell ids, cell metadata, `nbformat`, language
//! info, ...) is carried through untouched in flattened maps that keep the
//! template's key order. Typed fields are written ahead of those keys.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("Could not read notebook {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid notebook {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Could not write notebook {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}: please clear all cell outputs first!")]
    StaleOutputs(PathBuf),
    #[error("{0}: notebook has no kernelspec language")]
    MissingKernel(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Code,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellKind,
    /// Source lines, each keeping its trailing newline (except possibly the
    /// last).
    #[serde(deserialize_with = "deserialize_source")]
    pub source: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cell {
    pub fn markdown(source: &[&str]) -> Self {
        Self::new(CellKind::Markdown, source, None)
    }

    pub fn code(source: &[&str]) -> Self {
        Self::new(CellKind::Code, source, Some(Vec::new()))
    }

    fn new(cell_type: CellKind, source: &[&str], outputs: Option<Vec<Value>>) -> Self {
        Self {
            cell_type,
            source: source.iter().map(|s| s.to_string()).collect(),
            outputs,
            extra: Map::new(),
        }
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellKind::Code
    }

    pub fn is_markdown(&self) -> bool {
        self.cell_type == CellKind::Markdown
    }

    /// First source line, or `""` for an empty cell.
    pub fn first_line(&self) -> &str {
        self.source.first().map(String::as_str).unwrap_or_default()
    }

    pub fn has_outputs(&self) -> bool {
        self.outputs.as_ref().is_some_and(|o| !o.is_empty())
    }
}

/// nbformat allows `source` as one string or a list of lines.
fn deserialize_source<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Source {
        Lines(Vec<String>),
        Text(String),
    }

    Ok(match Source::deserialize(deserializer)? {
        Source::Lines(lines) => lines,
        Source::Text(text) => text.split_inclusive('\n').map(str::to_string).collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub language: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernelspec: Option<KernelSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notebook {
    /// Read a notebook template from disk.
    pub fn read(path: &Path) -> Result<Self, NotebookError> {
        let text = fs::read_to_string(path).map_err(|source| NotebookError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| NotebookError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the notebook as 2-space indented JSON.
    pub fn write(&self, path: &Path) -> Result<(), NotebookError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| NotebookError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Templates must be committed without outputs; any output left over
    /// from running the template is stale.
    pub fn ensure_outputs_cleared(&self, path: &Path) -> Result<(), NotebookError> {
        if self.cells.iter().any(Cell::has_outputs) {
            return Err(NotebookError::StaleOutputs(path.to_path_buf()));
        }
        Ok(())
    }

    /// Kernel language from `metadata.kernelspec.language`.
    pub fn language(&self, path: &Path) -> Result<&str, NotebookError> {
        self.metadata
            .kernelspec
            .as_ref()
            .map(|k| k.language.as_str())
            .ok_or_else(|| NotebookError::MissingKernel(path.to_path_buf()))
    }

    /// A copy of this notebook with a different cell list.
    pub fn with_cells(&self, cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: self.metadata.clone(),
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "id": "a1",
   "metadata": {},
   "source": ["# Title {#intro}\n", "[TOC]\n"]
  },
  {
   "cell_type": "code",
   "execution_count": null,
   "id": "b2",
   "metadata": {"tags": ["x"]},
   "outputs": [],
   "source": "import IMP\nprint(1)"
  }
 ],
 "metadata": {
  "kernelspec": {"display_name": "Python 3", "language": "python", "name": "python3"},
  "language_info": {"name": "python"}
 },
 "nbformat": 4,
 "nbformat_minor": 5
}"##;

    #[test]
    fn parses_cells_and_kernel() {
        let nb: Notebook = serde_json::from_str(TEMPLATE).unwrap();
        assert_eq!(nb.cells.len(), 2);
        assert!(nb.cells[0].is_markdown());
        assert!(nb.cells[1].is_code());
        assert_eq!(nb.language(Path::new("t")).unwrap(), "python");
    }

    #[test]
    fn string_source_is_split_into_lines() {
        let nb: Notebook = serde_json::from_str(TEMPLATE).unwrap();
        assert_eq!(nb.cells[1].source, vec!["import IMP\n", "print(1)"]);
    }

    #[test]
    fn unknown_fields_round_trip() {
        let nb: Notebook = serde_json::from_str(TEMPLATE).unwrap();
        let value = serde_json::to_value(&nb).unwrap();
        assert_eq!(value["nbformat"], 4);
        assert_eq!(value["cells"][1]["id"], "b2");
        assert_eq!(value["cells"][1]["metadata"]["tags"][0], "x");
        assert_eq!(value["metadata"]["language_info"]["name"], "python");
        assert_eq!(value["metadata"]["kernelspec"]["name"], "python3");
        assert!(value["cells"][0].get("outputs").is_none());
    }

    #[test]
    fn cleared_outputs_pass() {
        let nb: Notebook = serde_json::from_str(TEMPLATE).unwrap();
        assert!(nb.ensure_outputs_cleared(Path::new("t")).is_ok());
    }

    #[test]
    fn stale_outputs_are_rejected() {
        let mut nb: Notebook = serde_json::from_str(TEMPLATE).unwrap();
        nb.cells[1].outputs = Some(vec![serde_json::json!({"output_type": "stream"})]);
        let err = nb.ensure_outputs_cleared(Path::new("t.ipynb")).unwrap_err();
        assert!(err.to_string().contains("please clear all cell outputs first"));
    }

    #[test]
    fn missing_kernelspec_is_error() {
        let nb: Notebook =
            serde_json::from_str(r#"{"cells": [], "metadata": {}, "nbformat": 4}"#).unwrap();
        assert!(matches!(
            nb.language(Path::new("t")),
            Err(NotebookError::MissingKernel(_))
        ));
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.ipynb");
        let nb: Notebook = serde_json::from_str(TEMPLATE).unwrap();
        nb.write(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \""));
        assert_eq!(Notebook::read(&path).unwrap(), nb);
    }

    #[test]
    fn untyped_keys_keep_template_order() {
        let nb: Notebook = serde_json::from_value(serde_json::json!({
            "cells": [{"cell_type": "raw", "source": [], "metadata": {"zeta": 1, "alpha": 2}, "id": "c1"}],
            "metadata": {"widgets": {}, "authors": []},
            "nbformat_minor": 5,
            "nbformat": 4
        }))
        .unwrap();
        let text = serde_json::to_string(&nb).unwrap();
        let pos = |needle: &str| text.find(needle).unwrap();
        assert!(pos("\"zeta\"") < pos("\"alpha\""));
        assert!(pos("\"metadata\":{\"zeta\"") < pos("\"id\""));
        assert!(pos("\"widgets\"") < pos("\"authors\""));
        assert!(pos("\"nbformat_minor\"") < pos("\"nbformat\":"));
    }

    #[test]
    fn read_invalid_json_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.ipynb");
        fs::write(&path, "{not json").unwrap();
        let err = Notebook::read(&path).unwrap_err();
        assert!(matches!(err, NotebookError::Parse { .. }));
        assert!(err.to_string().contains("bad.ipynb"));
    }
}
