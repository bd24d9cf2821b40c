//! Doxygen configuration and invocation.
//!
//! The Doxyfile is never written from scratch. Doxygen prints its own
//! template (`doxygen -s -g -`) and [`DoxyfileSettings::rewrite`] replaces
//! the handful of keys the tutorial build cares about, so every other option
//! keeps the default of whichever doxygen version is installed.
//!
//! Two presets exist:
//!
//! - [`DoxyfileSettings::notebooks`] for pages generated from notebook
//!   templates (explicit input list, no search engine, no autolinking, tag
//!   files for `@ref`),
//! - [`DoxyfileSettings::doc_dir`] for a directory of hand-written markdown.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoxyfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not run {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} failed ({status})")]
    ToolFailed { tool: String, status: ExitStatus },
}

/// Keys to replace in the doxygen template, in the order they were set.
#[derive(Debug, Clone, PartialEq)]
pub struct DoxyfileSettings {
    entries: Vec<(&'static str, String)>,
}

impl DoxyfileSettings {
    /// Settings for markdown generated from notebook templates.
    ///
    /// `support_dir` holds `layout.xml`, `header.html` and `footer.html`;
    /// `tagfiles` is the `file=url` list built from the tag files.
    pub fn notebooks(title: &str, support_dir: &str, roots: &[String], tagfiles: &str) -> Self {
        let inputs: Vec<String> = roots.iter().map(|r| format!("{r}.md")).collect();
        Self {
            entries: vec![
                ("LAYOUT_FILE", format!("\"{support_dir}/layout.xml\"")),
                ("PROJECT_NAME", format!("\"{title}\"")),
                ("INPUT", inputs.join(" ")),
                ("SEARCHENGINE", "NO".into()),
                ("TOC_INCLUDE_HEADINGS", "2".into()),
                ("IMAGE_PATH", ".".into()),
                ("EXAMPLE_PATH", "..".into()),
                ("HTML_HEADER", format!("\"{support_dir}/header.html\"")),
                ("HTML_FOOTER", format!("\"{support_dir}/footer.html\"")),
                ("GENERATE_LATEX", "NO".into()),
                // Links only from code samples, not from prose.
                ("AUTOLINK_SUPPORT", "NO".into()),
                ("TAGFILES", tagfiles.to_string()),
            ],
        }
    }

    /// Settings for a directory of hand-written markdown pages.
    pub fn doc_dir(title: &str, support_dir: &str, tagfiles: &str) -> Self {
        Self {
            entries: vec![
                ("LAYOUT_FILE", format!("\"{support_dir}/layout.xml\"")),
                ("PROJECT_NAME", format!("\"{title}\"")),
                ("INPUT", ".".into()),
                ("IMAGE_PATH", "images".into()),
                ("HTML_HEADER", format!("\"{support_dir}/header.html\"")),
                ("HTML_FOOTER", format!("\"{support_dir}/footer.html\"")),
                ("GENERATE_LATEX", "NO".into()),
                ("TAGFILES", tagfiles.to_string()),
            ],
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace recognised keys in a doxygen template.
    ///
    /// A template line starting with `KEY ` becomes `KEY = value`; every
    /// other line is kept as is.
    pub fn rewrite(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        for line in template.split_inclusive('\n') {
            let replacement = self.entries.iter().find(|(key, _)| {
                line.strip_prefix(key)
                    .is_some_and(|rest| rest.starts_with(' '))
            });
            match replacement {
                Some((key, value)) => {
                    out.push_str(key);
                    out.push_str(" = ");
                    out.push_str(value);
                    out.push('\n');
                }
                None => out.push_str(line),
            }
        }
        out
    }
}

/// Ask doxygen for its default configuration (`doxygen -s -g -`).
pub fn default_template(doxygen: &str, dir: &Path) -> Result<String, DoxyfileError> {
    log::debug!("{doxygen} -s -g -");
    let output = Command::new(doxygen)
        .args(["-s", "-g", "-"])
        .current_dir(dir)
        .stderr(Stdio::inherit())
        .output()
        .map_err(|source| DoxyfileError::Spawn {
            tool: doxygen.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(DoxyfileError::ToolFailed {
            tool: doxygen.to_string(),
            status: output.status,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `dir/Doxyfile` from doxygen's template and `settings`.
pub fn write_doxyfile(
    doxygen: &str,
    dir: &Path,
    settings: &DoxyfileSettings,
) -> Result<PathBuf, DoxyfileError> {
    let template = default_template(doxygen, dir)?;
    let path = dir.join("Doxyfile");
    fs::write(&path, settings.rewrite(&template))?;
    Ok(path)
}

/// Run `doxygen Doxyfile` in `dir`, then make the page images reachable from
/// the html output.
pub fn run_doxygen(doxygen: &str, dir: &Path) -> Result<(), DoxyfileError> {
    log::debug!("{doxygen} Doxyfile");
    let status = Command::new(doxygen)
        .arg("Doxyfile")
        .current_dir(dir)
        .status()
        .map_err(|source| DoxyfileError::Spawn {
            tool: doxygen.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(DoxyfileError::ToolFailed {
            tool: doxygen.to_string(),
            status,
        });
    }
    link_images(dir)?;
    Ok(())
}

/// `html/images` → `../images`, when there are images and no link yet.
fn link_images(dir: &Path) -> std::io::Result<()> {
    let link = dir.join("html").join("images");
    if !dir.join("images").exists() || link.symlink_metadata().is_ok() {
        return Ok(());
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink("../images", &link)?;
    #[cfg(not(unix))]
    log::warn!("not linking {}: symlinks need unix", link.display());
    Ok(())
}
