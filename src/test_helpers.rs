//! Shared test utilities for the tutorial-tools test suite.
//!
//! Provides a fake network transport, fixture setup, and builders for the
//! files a tutorial directory contains (notebook templates, a mock `doxygen`
//! executable, a repository top).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let fetcher = MockFetcher::default()
//!     .with(REF_TAGS_URL, fixture_bytes("tags/ref-tags.xml"));
//! let doxygen = install_mock_doxygen(tmp.path());
//! ```

use crate::cache::{CacheError, Fetch};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =========================================================================
// Network
// =========================================================================

/// Serves canned responses and records every URL requested.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl MockFetcher {
    pub fn with(mut self, url: &str, body: impl AsRef<[u8]>) -> Self {
        self.responses.insert(url.to_string(), body.as_ref().to_vec());
        self
    }

    /// URLs fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetch for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CacheError> {
        self.requests.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| CacheError::Unavailable {
                url: url.to_string(),
                message: "404 Not Found".to_string(),
            })
    }
}

/// Tag file URLs for the default stable release.
pub const MANUAL_TAGS_URL: &str = "https://integrativemodeling.org/2.17.0/doc/manual-tags.xml";
pub const REF_TAGS_URL: &str = "https://integrativemodeling.org/2.17.0/doc/ref-tags.xml";

/// A fetcher serving the fixture tag files for one docs version.
pub fn tag_fetcher(version: &str) -> MockFetcher {
    let url =
        |doctype: &str| format!("https://integrativemodeling.org/{version}/doc/{doctype}-tags.xml");
    MockFetcher::default()
        .with(&url("manual"), fixture_bytes("tags/manual-tags.xml"))
        .with(&url("ref"), fixture_bytes("tags/ref-tags.xml"))
}

/// [`tag_fetcher`] for the default stable release.
pub fn stable_tag_fetcher() -> MockFetcher {
    tag_fetcher("2.17.0")
}

// =========================================================================
// Fixture setup
// =========================================================================

pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(relative)
}

pub fn fixture_bytes(relative: &str) -> Vec<u8> {
    let path = fixture_path(relative);
    fs::read(&path).unwrap_or_else(|e| panic!("fixture {} unreadable: {e}", path.display()))
}

/// Copy `fixtures/repo/` to a temp directory and return it.
///
/// The copy is a miniature tutorial repository: a `.git` marker and
/// `LICENSE` at the top, `support/metadata.yaml`, and notebook templates in
/// `doc/`.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_dir_recursive(&fixture_path("repo"), tmp.path()).unwrap();
    fs::create_dir_all(tmp.path().join(".git")).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Copy the mock `doxygen` script into `dir/bin` and make it executable.
pub fn install_mock_doxygen(dir: &Path) -> PathBuf {
    let bin = dir.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let path = bin.join("doxygen");
    fs::copy(fixture_path("mock-doxygen.sh"), &path).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

// =========================================================================
// Templates
// =========================================================================

/// Write `.template.<root>.ipynb` into `dir` with the given cells.
pub fn write_template(dir: &Path, root: &str, language: &str, cells: Value) -> PathBuf {
    let notebook = json!({
        "cells": cells,
        "metadata": {
            "kernelspec": {"display_name": language, "language": language, "name": language}
        },
        "nbformat": 4,
        "nbformat_minor": 5
    });
    let path = dir.join(format!(".template.{root}.ipynb"));
    fs::write(&path, serde_json::to_string_pretty(&notebook).unwrap()).unwrap();
    path
}
