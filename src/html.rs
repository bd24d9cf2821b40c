//! Post-processing of doxygen's HTML output.
//!
//! After doxygen has run, every page in `html/` (except the generated
//! `pages.html` index) gets:
//!
//! - an "Edit on GitHub" entry in the main menu, pointing at the notebook
//!   template (or hand-written markdown) the page was built from,
//! - a Creative Commons badge in the footer, when the repository is
//!   CC BY-SA licensed.
//!
//! Pages are matched back to their sources through the `{#name}` anchor on
//! the first heading of each markdown file: doxygen writes `{#name}` to
//! `html/name.html`, except `{#mainpage}` which becomes `html/index.html`.
//!
//! Both fragments are rendered with maud; the menu entry is injected as a
//! line of JavaScript right after doxygen's `initMenu` call, since the menu
//! itself is built client-side.

use crate::naming::{self, TemplateRoot};
use crate::tags::DocVersion;
use maud::{Markup, html};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not list {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Could not determine page name for file {0}")]
    NoPageName(PathBuf),
    #[error("No markdown source for {0}")]
    UnknownPage(PathBuf),
    #[error("Failed to patch {0} to add GitHub-edit link")]
    EditLinkNotPatched(PathBuf),
}

static PAGE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{#([^\s}]+)\}").expect("valid page name regex"));

const INIT_MENU: &str = "  initMenu('',false,false";
const FOOTER: &str = "<hr class=\"footer\"";
const INDEX_PAGE: &str = "pages.html";

/// Where edit links point.
#[derive(Debug, Clone, PartialEq)]
pub struct EditLinkTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Doc directory relative to the repository top, `/`-separated; empty
    /// when the docs live at the top.
    pub path: String,
}

impl EditLinkTarget {
    pub fn url(&self, file: &str) -> String {
        let mut url = format!(
            "https://github.com/{}/{}/blob/{}/",
            self.owner, self.repo, self.branch
        );
        if !self.path.is_empty() {
            url.push_str(&self.path);
            url.push('/');
        }
        url.push_str(file);
        url
    }
}

/// `dir` relative to `top`, as a URL path.
pub fn relative_url_path(dir: &Path, top: &Path) -> String {
    let relative = dir.strip_prefix(top).unwrap_or(dir);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The main-menu entry linking to the page source on GitHub.
pub fn edit_link_item(url: &str) -> Markup {
    html! {
        li style="float:right" {
            div id="github_edit" {
                a href=(url) {
                    i class="fab fa-github" {}
                    " Edit on GitHub"
                }
            }
        }
    }
}

/// The JavaScript line appending the edit link to doxygen's menu.
pub fn edit_link_script(url: &str) -> String {
    format!(
        "  $('#main-menu').append('{}');\n",
        edit_link_item(url).into_string()
    )
}

/// CC BY-SA 4.0 badge for the page footer.
pub fn license_badge() -> Markup {
    html! {
        div class="doxlicense" {
            a href="https://creativecommons.org/licenses/by-sa/4.0/"
                title="This work is available under the terms of the Creative Commons Attribution-ShareAlike 4.0 International license" {
                img src="https://integrativemodeling.org/tutorials/by-sa.svg" alt="CC BY-SA logo";
            }
        }
    }
}

/// Insert `edit_line` after the `initMenu` line and `badge` after the footer
/// rule. `None` when the page has no `initMenu` line.
pub fn patch_page(contents: &str, edit_line: &str, badge: Option<&str>) -> Option<String> {
    let mut out = String::with_capacity(contents.len() + edit_line.len());
    let mut patched = false;
    for line in contents.split_inclusive('\n') {
        out.push_str(line);
        if line.starts_with(INIT_MENU) {
            patched = true;
            out.push_str(edit_line);
        }
        if let Some(badge) = badge
            && line.starts_with(FOOTER)
        {
            if !line.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(badge);
            out.push('\n');
        }
    }
    patched.then_some(out)
}

/// Files directly inside `dir` with the given extension, sorted.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, HtmlError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| HtmlError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn read(path: &Path) -> Result<String, HtmlError> {
    fs::read_to_string(path).map_err(|source| HtmlError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), HtmlError> {
    fs::write(path, contents).map_err(|source| HtmlError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Map each html page name (`index.html`) to the markdown file it came from.
pub fn page_map(dir: &Path) -> Result<BTreeMap<String, String>, HtmlError> {
    let mut map = BTreeMap::new();
    for md in list_files(dir, "md")? {
        let Some(filename) = md.file_name().map(|f| f.to_string_lossy().into_owned()) else {
            continue;
        };
        if filename == "README.md" {
            continue;
        }
        let text = read(&md)?;
        let name = PAGE_NAME_RE
            .captures(&text)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| HtmlError::NoPageName(md.clone()))?;
        let page = if name == "mainpage" { "index".to_string() } else { name };
        map.insert(format!("{page}.html"), filename);
    }
    Ok(map)
}

/// The file an edit link should open for markdown `source`: its notebook
/// template when there is one, else the markdown itself.
pub fn edit_source(dir: &Path, source: &str, template_prefix: &str) -> String {
    let Some(root) = naming::root_from_markdown(source) else {
        return source.to_string();
    };
    let template = TemplateRoot::new(dir, root, template_prefix);
    if template.template_path().exists() {
        template.template_filename()
    } else {
        source.to_string()
    }
}

/// Summary of one HTML patching pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchReport {
    pub pages: usize,
    pub badges: usize,
}

/// Add edit links (and the license badge, when `with_badge`) to every page
/// in `dir/html`.
pub fn add_html_links(
    dir: &Path,
    target: &EditLinkTarget,
    template_prefix: &str,
    with_badge: bool,
) -> Result<PatchReport, HtmlError> {
    let pages = page_map(dir)?;
    let badge = with_badge.then(|| license_badge().into_string());
    let mut report = PatchReport::default();

    for html_path in list_files(&dir.join("html"), "html")? {
        let filename = html_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        if filename == INDEX_PAGE {
            continue;
        }
        let source = pages
            .get(&filename)
            .ok_or_else(|| HtmlError::UnknownPage(html_path.clone()))?;
        let edit_line = edit_link_script(&target.url(&edit_source(dir, source, template_prefix)));

        let contents = read(&html_path)?;
        let patched = patch_page(&contents, &edit_line, badge.as_deref())
            .ok_or_else(|| HtmlError::EditLinkNotPatched(html_path.clone()))?;
        if badge.is_some() && contents.lines().any(|l| l.starts_with(FOOTER)) {
            report.badges += 1;
        }
        write(&html_path, &patched)?;
        log::debug!("patched {}", html_path.display());
        report.pages += 1;
    }
    Ok(report)
}

/// Point menu links at the linked documentation version instead of
/// nightly. Returns whether `html/menudata.js` was rewritten.
pub fn fix_menu_links(dir: &Path, version: &DocVersion) -> Result<bool, HtmlError> {
    if version.is_nightly() {
        return Ok(false);
    }
    let path = dir.join("html").join("menudata.js");
    if !path.exists() {
        return Ok(false);
    }
    let contents = read(&path)?;
    write(&path, &contents.replace("nightly", version.as_str()))?;
    Ok(true)
}
