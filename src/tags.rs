//! Reference documentation tag files.
//!
//! Tutorials link into the published reference documentation. Which
//! documentation depends on the branch being built: the stable branch links
//! to the latest stable release, everything else to the nightly build. Each
//! documentation set publishes one doxygen tag file per documentation type
//! (`manual`, `ref`) at
//!
//! ```text
//! <doc_root>/<version>/doc/<doctype>-tags.xml
//! ```
//!
//! and the pages it names live under `<doc_root>/<version>/doc/<doctype>/`.

use crate::cache::{CacheError, Fetch, FetchOutcome, UrlCache};
use crate::config::DocsConfig;
use crate::refs::{LinkResolver, RefError};
use std::fmt;
use std::path::{Path, PathBuf};

/// The documentation version a build links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocVersion {
    Stable(String),
    Nightly,
}

impl DocVersion {
    /// Stable release for the stable branch, nightly for every other.
    pub fn for_branch(branch: &str, docs: &DocsConfig) -> Self {
        if branch == docs.stable_branch {
            Self::Stable(docs.stable_release.clone())
        } else {
            Self::Nightly
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stable(release) => release,
            Self::Nightly => "nightly",
        }
    }

    pub fn is_nightly(&self) -> bool {
        matches!(self, Self::Nightly)
    }
}

impl fmt::Display for DocVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote tag file.
#[derive(Debug, Clone, PartialEq)]
pub struct TagFile {
    pub doctype: String,
    pub version: DocVersion,
    doc_root: String,
}

impl TagFile {
    pub fn new(doc_root: &str, doctype: &str, version: DocVersion) -> Self {
        Self {
            doctype: doctype.to_string(),
            version,
            doc_root: doc_root.trim_end_matches('/').to_string(),
        }
    }

    fn doc_top(&self) -> String {
        format!("{}/{}/doc", self.doc_root, self.version)
    }

    pub fn url(&self) -> String {
        format!("{}/{}-tags.xml", self.doc_top(), self.doctype)
    }

    /// Cache file name; includes the version so stable and nightly tags
    /// can be cached side by side.
    pub fn local_name(&self) -> String {
        format!("{}-{}-tags.xml", self.doctype, self.version)
    }

    /// Base URL that the tag file's relative file names resolve against.
    pub fn doctop(&self) -> String {
        format!("{}/{}/", self.doc_top(), self.doctype)
    }
}

/// A tag file available on local disk.
#[derive(Debug, Clone)]
pub struct FetchedTagFile {
    pub tag: TagFile,
    pub path: PathBuf,
    pub outcome: FetchOutcome,
}

/// Fetch every configured tag file for `version` through the cache.
pub fn fetch_tag_files<F: Fetch>(
    cache: &mut UrlCache<'_, F>,
    docs: &DocsConfig,
    version: &DocVersion,
) -> Result<Vec<FetchedTagFile>, CacheError> {
    docs.tag_doctypes
        .iter()
        .map(|doctype| {
            let tag = TagFile::new(&docs.doc_root, doctype, version.clone());
            let (path, outcome) = cache.get(&tag.url(), &tag.local_name())?;
            Ok(FetchedTagFile { tag, path, outcome })
        })
        .collect()
}

/// Build a resolver holding every target of the given tag files.
pub fn load_resolver(tags: &[FetchedTagFile], include_dir: &Path) -> Result<LinkResolver, RefError> {
    let mut resolver = LinkResolver::new(include_dir);
    for fetched in tags {
        resolver.add_tag_file(&fetched.path, &fetched.tag.doctop())?;
    }
    if resolver.overwrites() > 0 {
        log::debug!(
            "{} @ref targets were defined more than once; the last definition wins",
            resolver.overwrites()
        );
    }
    Ok(resolver)
}

/// `TAGFILES` value for doxygen: `file=doctop` pairs.
pub fn doxygen_tagfiles(tags: &[FetchedTagFile]) -> String {
    tags.iter()
        .map(|t| format!("{}={}", t.path.display(), t.tag.doctop()))
        .collect::<Vec<_>>()
        .join(" ")
}
