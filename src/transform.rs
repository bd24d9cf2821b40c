//! Cell source passes.
//!
//! A template is transformed in two steps. First every markdown cell is put
//! into canonical form ([`canonicalize_markdown`]): headings get anchors, the
//! table of contents is collected, line directives (`%gencelloutputs`,
//! `%intersphinx <url>`) are consumed, and `%%include` / backtick / `@ref`
//! markup is expanded to literal URLs. Then each output format derives its
//! own text from the canonical cells:
//!
//! | Pass | Input | Changes |
//! |------|-------|---------|
//! | doc | markdown and code cells | directive and `%matplotlib` lines dropped, `@file X` → `X.html`, fence languages mapped to doxygen extensions, code wrapped in `\code{.ext}` |
//! | script | code cells | as doc, colab-only cells skipped |
//! | notebook | all cells | directive lines dropped, `[TOC]` replaced, `{#id}` → `<a id="id"></a>`, `@file X` → `X.ipynb` |
//!
//! All passes are pure functions of their input except the canonical pass,
//! which may read `%%include` files and fetch inventories.

use crate::cache::CacheError;
use crate::directives::{self, Directive, Target};
use crate::inventory::join_url;
use crate::notebook::{Cell, CellKind};
use crate::refs::{LinkResolver, RefError};
use crate::toc::{TableOfContents, TocError};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Ref(#[from] RefError),
    #[error(transparent)]
    Toc(#[from] TocError),
    #[error("Could not fetch inventory: {0}")]
    Cache(#[from] CacheError),
    #[error("Could not read inventory {path}: {source}")]
    InventoryRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("%intersphinx needs a URL: {0:?}")]
    MissingIntersphinxUrl(String),
}

const GEN_OUTPUTS: &str = "%gencelloutputs";
const INTERSPHINX: &str = "%intersphinx";

static FILE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@file\s+([^\s)]+)").expect("valid @file regex"));
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\S+)").expect("valid fence regex"));
static INLINE_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\{#([^\s}]+)\}").expect("valid anchor regex"));

/// A markdown cell after anchors, directives and links were handled.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMarkdown {
    pub source: Vec<String>,
    /// The cell asked for generated outputs (`%gencelloutputs`).
    pub generate_outputs: bool,
}

/// Canonicalize one markdown cell.
///
/// `fetch_inventory` maps an `objects.inv` URL to a local copy of it; it is
/// only called for `%intersphinx` lines. Inventories are loaded as they are
/// met, so links on later lines can use them.
pub fn canonicalize_markdown<F>(
    source: &[String],
    toc: &mut TableOfContents,
    resolver: &mut LinkResolver,
    fetch_inventory: &mut F,
) -> Result<CanonicalMarkdown, TransformError>
where
    F: FnMut(&str) -> Result<PathBuf, CacheError>,
{
    let anchored = toc.add_missing_anchors(source);
    toc.parse_cell(&anchored)?;

    let mut canonical = CanonicalMarkdown {
        source: Vec::with_capacity(anchored.len()),
        generate_outputs: false,
    };
    for line in &anchored {
        if line.starts_with(GEN_OUTPUTS) {
            canonical.generate_outputs = true;
        } else if line.starts_with(INTERSPHINX) {
            let url = line
                .split_whitespace()
                .nth(1)
                .ok_or_else(|| TransformError::MissingIntersphinxUrl(line.clone()))?;
            load_intersphinx(url, resolver, fetch_inventory)?;
        } else {
            canonical.source.push(resolver.fix_links(line)?);
        }
    }
    Ok(canonical)
}

fn load_intersphinx<F>(
    url: &str,
    resolver: &mut LinkResolver,
    fetch_inventory: &mut F,
) -> Result<(), TransformError>
where
    F: FnMut(&str) -> Result<PathBuf, CacheError>,
{
    let inventory_url = join_url(url, "objects.inv");
    let path = fetch_inventory(&inventory_url)?;
    let data = read_inventory(&path)?;
    let count = resolver.add_inventory(&data, url)?;
    log::debug!("loaded {count} Python objects from {inventory_url}");
    Ok(())
}

fn read_inventory(path: &Path) -> Result<Vec<u8>, TransformError> {
    fs::read(path).map_err(|source| TransformError::InventoryRead {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Doc and script passes
// ============================================================================

/// Rewrite one line for the doxygen markdown or the script, or drop it.
pub fn doc_line(line: &str) -> Option<String> {
    if directives::is_directive_line(line) || line.starts_with("%matplotlib") {
        return None;
    }
    let linked = FILE_LINK_RE.replace_all(line, "$1.html");
    let fenced = FENCE_RE.replace_all(&linked, |caps: &Captures| {
        format!("```{}", doxygen_language(&caps[1]))
    });
    Some(fenced.into_owned())
}

/// Jupyter fences name a language, doxygen wants a file extension.
fn doxygen_language(lang: &str) -> &str {
    match lang {
        "python" => "py",
        "c++" => "cpp",
        other => other,
    }
}

/// The doc-pass text of a cell's source, terminated by a newline.
pub fn doc_text(cell: &Cell) -> String {
    let mut text: String = cell.source.iter().filter_map(|l| doc_line(l)).collect();
    text.push('\n');
    text
}

/// Render one cell for the doxygen markdown, without any outputs. Raw cells
/// are never canonicalized, so they have no place in the doc.
pub fn doc_cell(cell: &Cell, extension: &str) -> String {
    match cell.cell_type {
        CellKind::Code => format!("\\code{{.{extension}}}\n{}\\endcode\n", doc_text(cell)),
        CellKind::Markdown => format!("{}\n", doc_text(cell)),
        CellKind::Raw => String::new(),
    }
}

/// Script text of a code cell, or `None` for cells that only make sense on
/// Colab (package installs and the like).
pub fn script_cell(cell: &Cell) -> Option<String> {
    match directives::parse_directive(cell.first_line()) {
        Some(Directive::Only(Target::Colab)) => None,
        _ => Some(doc_text(cell)),
    }
}

/// Text output block placed after a code block in the doxygen markdown.
pub fn doc_stream_output(lines: &[String]) -> String {
    format!(
        "<div class=\"output\">\nOutput\n\\verbatim\n{}\\endverbatim\n</div>\n",
        lines.concat()
    )
}

/// Image output block; `image` is relative to the html directory.
pub fn doc_image_output(image: &str) -> String {
    format!("<div class=\"output\">\n<img src=\"{image}\" />\n</div>\n")
}

// ============================================================================
// Notebook pass
// ============================================================================

/// Markdown cell source for Jupyter.
pub fn notebook_markdown(source: &[String], toc_markdown: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(source.len());
    for line in source {
        if line.contains("[TOC]") {
            out.extend(toc_markdown.iter().cloned());
        } else if !directives::is_directive_line(line) {
            let anchored = INLINE_ANCHOR_RE.replace_all(line, "<a id=\"$1\"></a>");
            out.push(FILE_LINK_RE.replace_all(&anchored, "$1.ipynb").into_owned());
        }
    }
    out
}

/// Code cell source for Jupyter.
pub fn notebook_code(source: &[String]) -> Vec<String> {
    source
        .iter()
        .filter(|line| !directives::is_directive_line(line))
        .cloned()
        .collect()
}

/// A copy of `cell` with its source rewritten for Jupyter.
pub fn notebook_cell(cell: &Cell, toc_markdown: &[String]) -> Cell {
    let source = if cell.is_markdown() {
        notebook_markdown(&cell.source, toc_markdown)
    } else {
        notebook_code(&cell.source)
    };
    Cell {
        source,
        ..cell.clone()
    }
}
