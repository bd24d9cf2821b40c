//! Notebook kernels: script rendering and cell output capture.
//!
//! A template's `kernelspec.language` selects one of the supported kernels.
//! The kernel decides the runnable script's extension and shebang, the
//! doxygen code-block language, and how cells are executed when the template
//! asks for generated outputs.
//!
//! # Output capture
//!
//! All script cells run in one interpreter process so that state carries
//! from cell to cell as it does in Jupyter. After each cell the harness
//! prints a boundary line (`@@tutorial-tools-cell-end@@ <n>`); stdout is then
//! split on those lines. For Python, the harness switches matplotlib to the
//! non-interactive `agg` backend and saves any figure a cell leaves open as a
//! PNG, which takes precedence over the cell's text output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Unsupported kernel language: {0}")]
    Unsupported(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        source: std::io::Error,
    },
    #[error("Running notebook cells with {interpreter} failed ({status}):\n{stderr}")]
    ExecutionFailed {
        interpreter: String,
        status: ExitStatus,
        stderr: String,
    },
}

const BOUNDARY: &str = "@@tutorial-tools-cell-end@@";
const PLOT_DIR_ENV: &str = "TUTORIAL_TOOLS_PLOT_DIR";

const PYTHON_PRELUDE: &str = r#"import os as _tt_os
import sys as _tt_sys
try:
    import matplotlib as _tt_mpl
    _tt_mpl.use('agg')
    import matplotlib.pyplot as _tt_plt
except ImportError:
    _tt_plt = None

def _tt_end_cell(n):
    if _tt_plt is not None and _tt_plt.get_fignums():
        _tt_plt.savefig(_tt_os.path.join(_tt_os.environ['TUTORIAL_TOOLS_PLOT_DIR'],
                                         'cell-%d.png' % n))
        _tt_plt.close('all')
    _tt_sys.stdout.write('\n@@tutorial-tools-cell-end@@ %d\n' % n)
    _tt_sys.stdout.flush()
"#;

/// Supported notebook kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Python,
    Bash,
}

impl Kernel {
    pub fn from_language(language: &str) -> Result<Self, KernelError> {
        match language {
            "python" => Ok(Self::Python),
            "bash" => Ok(Self::Bash),
            other => Err(KernelError::Unsupported(other.to_string())),
        }
    }

    /// Script file extension; also the doxygen `\code{.ext}` language.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Bash => "sh",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Self::Python => "#!/usr/bin/env python3\n\n",
            Self::Bash => "#!/bin/sh -e\n\n",
        }
    }

    /// Render script cells into one runnable script, cells separated by a
    /// blank line.
    pub fn render_script(self, cells: &[String]) -> String {
        let mut script = self.header().to_string();
        script.push_str(&cells.join("\n"));
        script
    }

    fn interpreter_args(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["-u", "-"],
            Self::Bash => &["-e", "-s"],
        }
    }

    fn prelude(self) -> &'static str {
        match self {
            Self::Python => PYTHON_PRELUDE,
            Self::Bash => "",
        }
    }

    fn boundary(self, n: usize) -> String {
        match self {
            Self::Python => format!("_tt_end_cell({n})\n"),
            Self::Bash => format!("printf '\\n%s %d\\n' '{BOUNDARY}' {n}\n"),
        }
    }

    /// Build the program that runs every cell and marks where each ends.
    fn harness(self, cells: &[String]) -> String {
        let mut program = self.prelude().to_string();
        for (n, cell) in cells.iter().enumerate() {
            program.push_str(cell);
            if !cell.ends_with('\n') {
                program.push('\n');
            }
            program.push_str(&self.boundary(n));
        }
        program
    }

    /// Run `cells` in order with `interpreter` inside `work_dir` and return
    /// the output of each cell, if any.
    pub fn capture_outputs(
        self,
        interpreter: &str,
        work_dir: &Path,
        cells: &[String],
    ) -> Result<Vec<Option<CapturedOutput>>, KernelError> {
        let plots = tempfile::TempDir::new()?;
        let program = self.harness(cells);

        log::debug!("running {} cells with {interpreter}", cells.len());
        let mut child = Command::new(interpreter)
            .args(self.interpreter_args())
            .current_dir(work_dir)
            .env(PLOT_DIR_ENV, plots.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| KernelError::Spawn {
                interpreter: interpreter.to_string(),
                source,
            })?;

        // Feed the program from another thread so a chatty cell cannot fill
        // the stdout pipe while stdin is still being written.
        let mut stdin = child.stdin.take();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(stdin) = stdin.as_mut() {
                stdin.write_all(program.as_bytes())?;
            }
            Ok(())
        });
        let output = child.wait_with_output()?;
        // A write error here means the interpreter exited early; its status
        // and stderr below say why.
        let _ = writer.join();

        if !output.status.success() {
            return Err(KernelError::ExecutionFailed {
                interpreter: interpreter.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let texts = split_cell_output(&stdout, cells.len());
        texts
            .into_iter()
            .enumerate()
            .map(|(n, text)| {
                let png = plot_path(plots.path(), n);
                if png.exists() {
                    return Ok(Some(CapturedOutput::Image(fs::read(png)?)));
                }
                Ok(CapturedOutput::from_text(&text))
            })
            .collect()
    }
}

fn plot_path(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("cell-{n}.png"))
}

/// Split harness stdout into one text per cell.
fn split_cell_output(stdout: &str, count: usize) -> Vec<String> {
    let mut texts = vec![String::new(); count];
    let mut current = String::new();
    for line in stdout.split_inclusive('\n') {
        let boundary = line
            .trim_end()
            .strip_prefix(BOUNDARY)
            .and_then(|n| n.trim().parse::<usize>().ok());
        match boundary {
            Some(n) if n < count => texts[n] = std::mem::take(&mut current),
            _ => current.push_str(line),
        }
    }
    texts
}

/// Output produced by one executed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedOutput {
    /// Standard output, one entry per line, each ending in `\n`.
    Stream(Vec<String>),
    /// A PNG image of the figure the cell drew.
    Image(Vec<u8>),
}

impl CapturedOutput {
    /// Text output with trailing newlines removed; `None` when empty.
    fn from_text(text: &str) -> Option<Self> {
        let trimmed = text.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return None;
        }
        Some(Self::Stream(
            trimmed.split('\n').map(|line| format!("{line}\n")).collect(),
        ))
    }

    /// The nbformat output object for this result.
    pub fn to_nbformat(&self) -> Value {
        match self {
            Self::Stream(lines) => json!({
                "name": "stdout",
                "output_type": "stream",
                "text": lines,
            }),
            Self::Image(png) => json!({
                "data": {"image/png": BASE64.encode(png)},
                "metadata": {"needs_background": "light"},
                "output_type": "display_data",
            }),
        }
    }
}

/// Write a script and mark it executable.
pub fn write_script(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
