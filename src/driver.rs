//! Doc-build driver: the stages of each CLI command in order.
//!
//! | Command | Stages |
//! |---------|--------|
//! | `notebooks` | branch → tag files → notebook artifacts |
//! | `doxyfile` | branch → tag files → title → Doxyfile |
//! | `build` | `notebooks` → Doxyfile → doxygen → edit links → menu links |
//! | `docs` | branch → tag files → title → Doxyfile (doc dir) → doxygen → edit links → menu links |
//!
//! Every stage returns its result to the caller instead of printing it; the
//! `output` module turns the reports into CLI text. Any error stops the run.

use crate::cache::{CacheError, CacheStats, Fetch, UrlCache};
use crate::config::ToolConfig;
use crate::doxyfile::{self, DoxyfileError, DoxyfileSettings};
use crate::emit::{EmitError, GeneratedFiles, NotebookGenerator};
use crate::git::{self, GitError};
use crate::html::{self, EditLinkTarget, HtmlError, PatchReport};
use crate::metadata::{self, MetadataError};
use crate::refs::RefError;
use crate::tags::{self, DocVersion, FetchedTagFile};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Tag file download failed: {0}")]
    Cache(#[from] CacheError),
    #[error("Tag file error: {0}")]
    Ref(#[from] RefError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("Doxygen error: {0}")]
    Doxyfile(#[from] DoxyfileError),
    #[error("Git error: {0}")]
    Git(#[from] GitError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("HTML error: {0}")]
    Html(#[from] HtmlError),
}

/// Branch and documentation version a run links against.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub branch: String,
    pub version: DocVersion,
    pub tags: Vec<FetchedTagFile>,
}

#[derive(Debug, Clone)]
pub struct NotebookReport {
    pub context: RunContext,
    pub files: Vec<GeneratedFiles>,
    /// Plot images written under `html/matplotlib/`.
    pub images: usize,
    pub cache: CacheStats,
}

#[derive(Debug, Clone)]
pub struct DoxyfileReport {
    pub context: RunContext,
    pub title: String,
    pub path: PathBuf,
    pub cache: CacheStats,
}

#[derive(Debug, Clone)]
pub struct HtmlReport {
    pub doxyfile: PathBuf,
    pub title: String,
    pub pages: PatchReport,
    pub menu_links_fixed: bool,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub notebooks: NotebookReport,
    pub html: HtmlReport,
}

#[derive(Debug, Clone)]
pub struct DocsReport {
    pub context: RunContext,
    pub html: HtmlReport,
    pub cache: CacheStats,
}

pub struct Driver<'f, F: Fetch> {
    work_dir: PathBuf,
    config: ToolConfig,
    fetcher: &'f F,
}

impl<'f, F: Fetch> Driver<'f, F> {
    /// `work_dir` is the doc directory holding the templates or markdown.
    pub fn new(work_dir: &Path, config: ToolConfig, fetcher: &'f F) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            config,
            fetcher,
        }
    }

    fn cache(&self) -> UrlCache<'f, F> {
        UrlCache::new(
            self.work_dir.join(&self.config.cache.dir),
            self.config.cache.max_age(),
            self.fetcher,
        )
    }

    /// Resolve the branch and download the tag files for its docs version.
    fn context(
        &self,
        cache: &mut UrlCache<'f, F>,
        branch: Option<&str>,
    ) -> Result<RunContext, DriverError> {
        let branch = match branch {
            Some(b) => b.to_string(),
            None => git::current_branch(&self.work_dir)?,
        };
        let version = DocVersion::for_branch(&branch, &self.config.docs);
        log::info!("branch {branch}: linking to {version} documentation");
        let tags = tags::fetch_tag_files(cache, &self.config.docs, &version)?;
        Ok(RunContext {
            branch,
            version,
            tags,
        })
    }

    fn title(&self) -> Result<String, MetadataError> {
        metadata::resolve_title(
            self.config.project.title.as_deref(),
            &self.work_dir,
            &self.config.project.metadata_files,
        )
    }

    /// Generate markdown, scripts and notebooks for each template root.
    pub fn notebooks(
        &self,
        roots: &[String],
        branch: Option<&str>,
    ) -> Result<NotebookReport, DriverError> {
        let mut cache = self.cache();
        let context = self.context(&mut cache, branch)?;
        let resolver = tags::load_resolver(&context.tags, &self.work_dir)?;

        let mut generator =
            NotebookGenerator::new(&self.work_dir, self.config.notebook.clone(), resolver, cache);
        let files = roots
            .iter()
            .map(|root| generator.generate(root))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NotebookReport {
            context,
            files,
            images: generator.images_written(),
            cache: generator.cache().stats().clone(),
        })
    }

    fn notebook_settings(
        &self,
        title: &str,
        roots: &[String],
        context: &RunContext,
    ) -> DoxyfileSettings {
        DoxyfileSettings::notebooks(
            title,
            &self.config.doxygen.support_dir,
            roots,
            &tags::doxygen_tagfiles(&context.tags),
        )
    }

    /// Write only the Doxyfile for the given template roots.
    pub fn doxyfile(
        &self,
        roots: &[String],
        branch: Option<&str>,
    ) -> Result<DoxyfileReport, DriverError> {
        let mut cache = self.cache();
        let context = self.context(&mut cache, branch)?;
        let title = self.title()?;
        let settings = self.notebook_settings(&title, roots, &context);
        let path = doxyfile::write_doxyfile(&self.config.doxygen.binary, &self.work_dir, &settings)?;
        Ok(DoxyfileReport {
            context,
            title,
            path,
            cache: cache.stats().clone(),
        })
    }

    /// The full notebook pipeline.
    pub fn build(&self, roots: &[String], branch: Option<&str>) -> Result<BuildReport, DriverError> {
        let notebooks = self.notebooks(roots, branch)?;
        let title = self.title()?;
        let settings = self.notebook_settings(&title, roots, &notebooks.context);
        let html = self.run_html(title, &settings, &notebooks.context)?;
        Ok(BuildReport { notebooks, html })
    }

    /// Build a directory of hand-written markdown pages.
    pub fn docs(&self, branch: Option<&str>) -> Result<DocsReport, DriverError> {
        let mut cache = self.cache();
        let context = self.context(&mut cache, branch)?;
        let title = self.title()?;
        let settings = DoxyfileSettings::doc_dir(
            &title,
            &self.config.doxygen.support_dir,
            &tags::doxygen_tagfiles(&context.tags),
        );
        let html = self.run_html(title, &settings, &context)?;
        Ok(DocsReport {
            context,
            html,
            cache: cache.stats().clone(),
        })
    }

    /// Doxyfile → doxygen → edit links and badge → menu links.
    fn run_html(
        &self,
        title: String,
        settings: &DoxyfileSettings,
        context: &RunContext,
    ) -> Result<HtmlReport, DriverError> {
        let doxygen = &self.config.doxygen.binary;
        let doxyfile = doxyfile::write_doxyfile(doxygen, &self.work_dir, settings)?;
        doxyfile::run_doxygen(doxygen, &self.work_dir)?;

        let top = git::find_top_dir(&self.work_dir)?;
        let repo = match &self.config.project.repository {
            Some(repo) => repo.clone(),
            None => git::origin_repo_name(&self.work_dir)?,
        };
        let target = EditLinkTarget {
            owner: self.config.project.github_owner.clone(),
            repo,
            branch: context.branch.clone(),
            path: html::relative_url_path(&self.work_dir, &top),
        };
        let with_badge = metadata::is_cc_by_sa(&top.join(&self.config.project.license_file));
        let pages = html::add_html_links(
            &self.work_dir,
            &target,
            &self.config.notebook.template_prefix,
            with_badge,
        )?;
        let menu_links_fixed = html::fix_menu_links(&self.work_dir, &context.version)?;

        Ok(HtmlReport {
            doxyfile,
            title,
            pages,
            menu_links_fixed,
        })
    }
}
