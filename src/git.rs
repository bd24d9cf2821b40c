//! Repository facts needed for edit links.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// How far up the tree to look for `.git`.
const MAX_PARENTS: usize = 20;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Could not run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git {args} failed: {stderr}")]
    Failed { args: String, stderr: String },
    #[error("Could not determine top directory of repository from {0}")]
    NoTopDir(PathBuf),
}

fn git(dir: &Path, args: &[&str]) -> Result<String, GitError> {
    log::debug!("git {}", args.join(" "));
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if !output.status.success() {
        return Err(GitError::Failed {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .trim_end_matches(['\r', '\n'])
        .to_string())
}

/// Name of the checked-out branch.
pub fn current_branch(dir: &Path) -> Result<String, GitError> {
    git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Repository name from the `origin` remote URL.
pub fn origin_repo_name(dir: &Path) -> Result<String, GitError> {
    let url = git(dir, &["config", "--get", "remote.origin.url"])?;
    Ok(repo_name_from_url(&url).to_string())
}

/// Last path component of a remote URL, without `.git`.
///
/// Works for both `https://github.com/o/r.git` and `git@github.com:o/r.git`.
pub fn repo_name_from_url(url: &str) -> &str {
    let last = url.rsplit('/').next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last)
}

/// The nearest directory at or above `start` that contains `.git`.
pub fn find_top_dir(start: &Path) -> Result<PathBuf, GitError> {
    start
        .ancestors()
        .take(MAX_PARENTS + 1)
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| GitError::NoTopDir(start.to_path_buf()))
}
