//! Notebook template → doxygen markdown, script, and notebooks.
//!
//! [`NotebookGenerator`] holds what is shared by every template in one run:
//! the link resolver built from the downloaded tag files, the URL cache for
//! `%intersphinx` inventories, the template counter used for synthetic
//! anchors, and the writer for plot images. Each call to
//! [`NotebookGenerator::generate`] then processes one template root:
//!
//! ```text
//! .template.intro.ipynb
//!   ├── check: no stale outputs, known kernel
//!   ├── canonicalize markdown cells (anchors, ToC, links)
//!   ├── (run cells for outputs)    only with %gencelloutputs
//!   ├── intro.py / intro.sh        code cells, colab-only skipped
//!   ├── intro.md                   cells kept for html
//!   ├── intro.ipynb                cells kept for the notebook
//!   └── intro-colab.ipynb          cells kept for colab, if different
//! ```
//!
//! Template, kernel and link checks, and running the cells for outputs, all
//! happen before the first file is written. A template that fails any of them
//! leaves no partial outputs behind.

use crate::cache::{CacheError, Fetch, UrlCache};
use crate::config::NotebookConfig;
use crate::directives::{Target, cell_subset};
use crate::kernel::{self, CapturedOutput, Kernel, KernelError};
use crate::naming::TemplateRoot;
use crate::notebook::{Cell, Notebook, NotebookError};
use crate::refs::LinkResolver;
use crate::toc::TableOfContents;
use crate::transform::{self, TransformError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error("{template}: {source}")]
    Kernel {
        template: PathBuf,
        source: KernelError,
    },
    #[error("{template}: {source}")]
    Transform {
        template: PathBuf,
        source: TransformError,
    },
    #[error("Could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What was written for one template root.
#[derive(Debug, Clone)]
pub struct GeneratedFiles {
    pub root: String,
    pub kernel: Kernel,
    pub markdown: PathBuf,
    /// `None` when the template has no code cells.
    pub script: Option<PathBuf>,
    pub notebook: PathBuf,
    /// `None` when the Colab notebook would equal the plain one.
    pub colab: Option<PathBuf>,
    pub toc_entries: usize,
    /// Cells that received generated outputs.
    pub outputs: usize,
}

/// Writes plot images under `html/matplotlib/`, numbered across the run.
#[derive(Debug)]
pub struct ImageWriter {
    html_dir: PathBuf,
    counter: usize,
}

impl ImageWriter {
    pub fn new(html_dir: impl Into<PathBuf>) -> Self {
        Self {
            html_dir: html_dir.into(),
            counter: 0,
        }
    }

    /// Store a PNG and return its path relative to the html directory.
    pub fn write(&mut self, png: &[u8]) -> std::io::Result<String> {
        self.counter += 1;
        let dir = self.html_dir.join("matplotlib");
        fs::create_dir_all(&dir)?;
        let name = format!("matplotlib/{}.png", self.counter);
        fs::write(self.html_dir.join(&name), png)?;
        Ok(name)
    }

    pub fn count(&self) -> usize {
        self.counter
    }
}

pub struct NotebookGenerator<'f, F: Fetch> {
    work_dir: PathBuf,
    config: NotebookConfig,
    resolver: LinkResolver,
    cache: UrlCache<'f, F>,
    images: ImageWriter,
    file_counter: usize,
}

impl<'f, F: Fetch> NotebookGenerator<'f, F> {
    /// `resolver` holds the tag-file links every template can use; each
    /// template works on its own copy so `%intersphinx` inventories stay
    /// local to the template that loads them.
    pub fn new(
        work_dir: &Path,
        config: NotebookConfig,
        resolver: LinkResolver,
        cache: UrlCache<'f, F>,
    ) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            config,
            resolver,
            cache,
            images: ImageWriter::new(work_dir.join("html")),
            file_counter: 0,
        }
    }

    pub fn cache(&self) -> &UrlCache<'f, F> {
        &self.cache
    }

    pub fn images_written(&self) -> usize {
        self.images.count()
    }

    fn interpreter(&self, kernel: Kernel) -> &str {
        match kernel {
            Kernel::Python => &self.config.python,
            Kernel::Bash => &self.config.shell,
        }
    }

    /// Generate every artifact for one template root.
    pub fn generate(&mut self, root: &str) -> Result<GeneratedFiles, EmitError> {
        self.file_counter += 1;
        let names = TemplateRoot::new(&self.work_dir, root, &self.config.template_prefix);
        let template = names.template_path();
        log::debug!("processing {}", template.display());

        let notebook = Notebook::read(&template)?;
        notebook.ensure_outputs_cleared(&template)?;
        let kernel = Kernel::from_language(notebook.language(&template)?).map_err(|source| {
            EmitError::Kernel {
                template: template.clone(),
                source,
            }
        })?;

        let mut cells = notebook.cells.clone();
        let mut toc = TableOfContents::new(self.file_counter);
        let mut resolver = self.resolver.clone();
        let mut generate_outputs = false;
        let cache = &mut self.cache;
        let mut fetch_inventory =
            |url: &str| -> Result<PathBuf, CacheError> { Ok(cache.get_url(url)?.0) };
        for cell in cells.iter_mut().filter(|c| c.is_markdown()) {
            let canonical = transform::canonicalize_markdown(
                &cell.source,
                &mut toc,
                &mut resolver,
                &mut fetch_inventory,
            )
            .map_err(|source| EmitError::Transform {
                template: template.clone(),
                source,
            })?;
            generate_outputs |= canonical.generate_outputs;
            cell.source = canonical.source;
        }

        let mut captured = HashMap::new();
        if generate_outputs {
            captured = self.capture_outputs(&template, kernel, &cells)?;
            for (index, output) in &captured {
                cells[*index].outputs = Some(vec![output.to_nbformat()]);
            }
        }

        let script = self.write_script(&names, kernel, &cells)?;

        let markdown = names.markdown_path();
        let doc = self.render_doc(&cells, kernel, &captured)?;
        write_file(&markdown, &doc)?;

        let toc_markdown = toc.to_markdown();
        let notebook_cells = cell_subset(&cells, Target::Notebook);
        let colab_cells = cell_subset(&cells, Target::Colab);
        let notebook_path = names.notebook_path();
        write_notebook(&notebook, &cells, &notebook_cells, &toc_markdown, &notebook_path)?;
        let colab = if colab_cells != notebook_cells {
            let path = names.colab_path();
            write_notebook(&notebook, &cells, &colab_cells, &toc_markdown, &path)?;
            Some(path)
        } else {
            None
        };

        Ok(GeneratedFiles {
            root: root.to_string(),
            kernel,
            markdown,
            script,
            notebook: notebook_path,
            colab,
            toc_entries: toc.entries().len(),
            outputs: captured.len(),
        })
    }

    /// Write the runnable script, unless there is no code at all.
    fn write_script(
        &self,
        names: &TemplateRoot,
        kernel: Kernel,
        cells: &[Cell],
    ) -> Result<Option<PathBuf>, EmitError> {
        if !cells.iter().any(Cell::is_code) {
            return Ok(None);
        }
        let parts: Vec<String> = cells
            .iter()
            .filter(|c| c.is_code())
            .filter_map(transform::script_cell)
            .collect();
        let path = names.script_path(kernel.extension());
        kernel::write_script(&path, &kernel.render_script(&parts)).map_err(|source| {
            EmitError::Write {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Some(path))
    }

    /// Run the script form of every code cell and collect their outputs,
    /// keyed by cell index.
    fn capture_outputs(
        &self,
        template: &Path,
        kernel: Kernel,
        cells: &[Cell],
    ) -> Result<HashMap<usize, CapturedOutput>, EmitError> {
        let (indices, sources): (Vec<usize>, Vec<String>) = cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_code())
            .filter_map(|(i, c)| transform::script_cell(c).map(|text| (i, text)))
            .unzip();
        let outputs = kernel
            .capture_outputs(self.interpreter(kernel), &self.work_dir, &sources)
            .map_err(|source| EmitError::Kernel {
                template: template.to_path_buf(),
                source,
            })?;
        Ok(indices
            .into_iter()
            .zip(outputs)
            .filter_map(|(i, out)| out.map(|o| (i, o)))
            .collect())
    }

    fn render_doc(
        &mut self,
        cells: &[Cell],
        kernel: Kernel,
        captured: &HashMap<usize, CapturedOutput>,
    ) -> Result<String, EmitError> {
        let mut doc = String::new();
        for index in cell_subset(cells, Target::Html) {
            let cell = &cells[index];
            doc.push_str(&transform::doc_cell(cell, kernel.extension()));
            match captured.get(&index) {
                Some(CapturedOutput::Stream(lines)) => {
                    doc.push_str(&transform::doc_stream_output(lines));
                }
                Some(CapturedOutput::Image(png)) => {
                    let name = self.images.write(png).map_err(|source| EmitError::Write {
                        path: self.images.html_dir.join("matplotlib"),
                        source,
                    })?;
                    doc.push_str(&transform::doc_image_output(&name));
                }
                None => {}
            }
        }
        Ok(doc)
    }
}

fn write_notebook(
    template: &Notebook,
    cells: &[Cell],
    subset: &[usize],
    toc_markdown: &[String],
    path: &Path,
) -> Result<(), EmitError> {
    let rewritten = subset
        .iter()
        .map(|&i| transform::notebook_cell(&cells[i], toc_markdown))
        .collect();
    template.with_cells(rewritten).write(path)?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), EmitError> {
    fs::write(path, contents).map_err(|source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    })
}
