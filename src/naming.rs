//! Template-root naming convention.
//!
//! A tutorial notebook is authored as a template, `.template.<root>.ipynb`,
//! and every artifact generated from it is named after the same root:
//!
//! - `.template.intro.ipynb` → `intro.md` (doxygen input)
//! - → `intro.py` or `intro.sh` (runnable script, by kernel)
//! - → `intro.ipynb` (Jupyter notebook)
//! - → `intro-colab.ipynb` (Colab notebook, only when it differs)
//!
//! This module is the single place those names are derived.

use std::path::{Path, PathBuf};

/// A template root and the directory it lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRoot {
    /// Filename stem selecting the template, e.g. `intro`.
    pub root: String,
    dir: PathBuf,
    prefix: String,
}

impl TemplateRoot {
    /// `prefix` is the template filename prefix (normally `.template.`).
    pub fn new(dir: &Path, root: &str, prefix: &str) -> Self {
        Self {
            root: root.to_string(),
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    /// The template notebook, e.g. `.template.intro.ipynb`.
    pub fn template_path(&self) -> PathBuf {
        self.dir.join(self.template_filename())
    }

    pub fn template_filename(&self) -> String {
        format!("{}{}.ipynb", self.prefix, self.root)
    }

    /// Doxygen markdown input, e.g. `intro.md`.
    pub fn markdown_path(&self) -> PathBuf {
        self.dir.join(format!("{}.md", self.root))
    }

    /// Runnable script with the kernel's extension, e.g. `intro.py`.
    pub fn script_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.root, extension))
    }

    /// Standard notebook, e.g. `intro.ipynb`.
    pub fn notebook_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ipynb", self.root))
    }

    /// Colab notebook, e.g. `intro-colab.ipynb`.
    pub fn colab_path(&self) -> PathBuf {
        self.dir.join(format!("{}-colab.ipynb", self.root))
    }
}

/// Recover the template root from a markdown filename.
///
/// `intro.md` → `Some("intro")`; anything without an `.md` extension → `None`.
pub fn root_from_markdown(filename: &str) -> Option<&str> {
    filename.strip_suffix(".md").filter(|stem| !stem.is_empty())
}
