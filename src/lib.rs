//! # Tutorial Tools
//!
//! Builds a tutorial's documentation from annotated Jupyter notebook
//! templates. One template (`.template.<root>.ipynb`) is the single source
//! for everything a reader sees: doxygen-flavoured markdown for the HTML
//! pages, a runnable script, and the notebooks offered for download and for
//! Google Colab.
//!
//! # Architecture: Template In, Four Artifacts Out
//!
//! ```text
//! 1. Resolve   tag files + inventories  →  LinkResolver   (@ref identifiers → URLs)
//! 2. Emit      .template.<root>.ipynb   →  <root>.md, <root>.py|.sh,
//!                                          <root>.ipynb, <root>-colab.ipynb
//! 3. Publish   Doxyfile → doxygen      →  html/ (edit links, license, menu)
//! ```
//!
//! Stage 2 is a set of pure text passes over notebook cells. Cell directives
//! (`%%nbexclude`, `#%%colabonly`, ...) pick which cells reach which target,
//! and the table of contents is rebuilt from the headings on every run.
//! Only stages 1 and 3 touch the network or spawn tools, and both go
//! through seams ([`cache::Fetch`], the configured `doxygen` binary) that
//! tests replace.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`driver`] | Runs the stages of each CLI command and returns reports |
//! | [`config`] | `tutorial-tools.toml` loading, validation, and stock defaults |
//! | [`cache`] | On-disk cache of downloaded files behind the [`cache::Fetch`] transport |
//! | [`tags`] | Documentation version for a branch; fetching doxygen tag files |
//! | [`refs`] | `@ref` link resolution from tag files and Sphinx inventories |
//! | [`inventory`] | Sphinx `objects.inv` parser |
//! | [`notebook`] | nbformat 4 reading and writing |
//! | [`directives`] | Cell directives and per-target cell selection |
//! | [`toc`] | Heading anchors and the generated table of contents |
//! | [`transform`] | Markdown canonicalization and per-target cell rendering |
//! | [`kernel`] | Script rendering and cell output capture |
//! | [`emit`] | Writes all artifacts for one template root |
//! | [`naming`] | File names derived from a template root |
//! | [`doxyfile`] | Doxyfile generation and running doxygen |
//! | [`html`] | Post-processing of doxygen's HTML output |
//! | [`git`] | Branch, repository name, and repository top |
//! | [`metadata`] | Project title and license detection |
//! | [`output`] | CLI output formatting for the driver reports |
//!
//! # Design Decisions
//!
//! ## Templates Are Canonical
//!
//! Generated files are overwritten on every run and never read back. The
//! only exception is the HTML patching pass, which edits doxygen's output in
//! place right after doxygen has written it.
//!
//! ## Links Resolve Against Released Docs
//!
//! Tutorials on the stable branch link to the stable release's reference
//! documentation; every other branch links to nightly. The choice is made
//! once per run ([`tags::DocVersion::for_branch`]) and flows into tag file
//! URLs, `@ref` links, and the patched navigation menu alike.
//!
//! ## Maud for HTML Fragments
//!
//! The edit link and license badge inserted into doxygen pages are built with
//! [Maud](https://maud.lambda.xyz/), so every interpolated URL is escaped.

pub mod cache;
pub mod config;
pub mod directives;
pub mod doxyfile;
pub mod driver;
pub mod emit;
pub mod git;
pub mod html;
pub mod inventory;
pub mod kernel;
pub mod metadata;
pub mod naming;
pub mod notebook;
pub mod output;
pub mod refs;
pub mod tags;
pub mod toc;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
