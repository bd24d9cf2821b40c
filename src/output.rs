//! CLI output formatting for all commands.
//!
//! # Information-First Display
//!
//! Output is organised around the tutorial's template roots, not around the
//! files on disk: each root leads with its positional index and name, and the
//! artifacts written for it follow as indented context lines. Paths are shown
//! relative to the doc directory.
//!
//! # Output Format
//!
//! ## Notebooks
//!
//! ```text
//! Branch main → docs 2.17.0
//! Tag files: 2 downloaded
//! 001 intro (python)
//!     Markdown: intro.md
//!     Script: intro.py
//!     Notebook: intro.ipynb
//!     Colab: intro-colab.ipynb
//!     Contents: 3 headings, 1 generated output
//! Generated 1 notebook
//! ```
//!
//! ## HTML
//!
//! ```text
//! Doxyfile: Doxyfile ("Introduction to IMP")
//! Pages: 2 patched, 2 with license badge
//! Menu links → 2.17.0
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::driver::{BuildReport, DocsReport, DoxyfileReport, HtmlReport, NotebookReport, RunContext};
use crate::emit::GeneratedFiles;
use crate::kernel::Kernel;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `n thing` / `n things`.
fn plural(n: usize, thing: &str) -> String {
    if n == 1 {
        format!("{n} {thing}")
    } else {
        format!("{n} {thing}s")
    }
}

/// Path relative to `base` when possible, for display.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn kernel_name(kernel: Kernel) -> &'static str {
    match kernel {
        Kernel::Python => "python",
        Kernel::Bash => "bash",
    }
}

fn context_lines(context: &RunContext) -> Vec<String> {
    vec![format!(
        "Branch {} \u{2192} docs {}",
        context.branch, context.version
    )]
}

// ============================================================================
// Notebooks
// ============================================================================

/// Format the artifacts written for one template root.
fn root_lines(index: usize, files: &GeneratedFiles, base: &Path) -> Vec<String> {
    let detail = indent(1);
    let mut lines = vec![format!(
        "{} {} ({})",
        format_index(index),
        files.root,
        kernel_name(files.kernel)
    )];
    lines.push(format!("{detail}Markdown: {}", display_path(&files.markdown, base)));
    if let Some(script) = &files.script {
        lines.push(format!("{detail}Script: {}", display_path(script, base)));
    }
    lines.push(format!("{detail}Notebook: {}", display_path(&files.notebook, base)));
    if let Some(colab) = &files.colab {
        lines.push(format!("{detail}Colab: {}", display_path(colab, base)));
    }
    let mut contents = plural(files.toc_entries, "heading");
    if files.outputs > 0 {
        contents.push_str(&format!(", {}", plural(files.outputs, "generated output")));
    }
    lines.push(format!("{detail}Contents: {contents}"));
    lines
}

/// Format the result of generating notebook artifacts.
pub fn format_notebook_report(report: &NotebookReport, base: &Path) -> Vec<String> {
    let mut lines = context_lines(&report.context);
    lines.push(format!("Tag files: {}", report.cache));
    for (i, files) in report.files.iter().enumerate() {
        lines.extend(root_lines(i + 1, files, base));
    }
    let mut summary = format!("Generated {}", plural(report.files.len(), "notebook"));
    if report.images > 0 {
        summary.push_str(&format!(", {}", plural(report.images, "plot image")));
    }
    lines.push(summary);
    lines
}

pub fn print_notebook_report(report: &NotebookReport, base: &Path) {
    for line in format_notebook_report(report, base) {
        println!("{}", line);
    }
}

// ============================================================================
// Doxyfile and HTML
// ============================================================================

pub fn format_doxyfile_report(report: &DoxyfileReport, base: &Path) -> Vec<String> {
    let mut lines = context_lines(&report.context);
    lines.push(format!("Tag files: {}", report.cache));
    lines.push(format!(
        "Doxyfile: {} (\"{}\")",
        display_path(&report.path, base),
        report.title
    ));
    lines
}

pub fn print_doxyfile_report(report: &DoxyfileReport, base: &Path) {
    for line in format_doxyfile_report(report, base) {
        println!("{}", line);
    }
}

fn html_lines(html: &HtmlReport, context: &RunContext, base: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Doxyfile: {} (\"{}\")",
        display_path(&html.doxyfile, base),
        html.title
    )];
    let mut pages = format!("Pages: {} patched", html.pages.pages);
    if html.pages.badges > 0 {
        pages.push_str(&format!(", {} with license badge", html.pages.badges));
    }
    lines.push(pages);
    if html.menu_links_fixed {
        lines.push(format!("Menu links \u{2192} {}", context.version));
    }
    lines
}

/// Format the full notebook build: notebooks, then HTML.
pub fn format_build_report(report: &BuildReport, base: &Path) -> Vec<String> {
    let mut lines = format_notebook_report(&report.notebooks, base);
    lines.extend(html_lines(&report.html, &report.notebooks.context, base));
    lines
}

pub fn print_build_report(report: &BuildReport, base: &Path) {
    for line in format_build_report(report, base) {
        println!("{}", line);
    }
}

pub fn format_docs_report(report: &DocsReport, base: &Path) -> Vec<String> {
    let mut lines = context_lines(&report.context);
    lines.push(format!("Tag files: {}", report.cache));
    lines.extend(html_lines(&report.html, &report.context, base));
    lines
}

pub fn print_docs_report(report: &DocsReport, base: &Path) {
    for line in format_docs_report(report, base) {
        println!("{}", line);
    }
}
