//! Cross-reference resolution for `@ref` links.
//!
//! Tutorial markdown links into the reference documentation with doxygen
//! syntax (`@ref IMP::Model`) or with double backticks (``` ``IMP.Model`` ```).
//! Neither the notebook viewer nor doxygen-without-tag-files can resolve
//! those, so every link is rewritten to a literal URL before any output is
//! written. A link with no known target is an error: publishing a tutorial
//! with a dead link is worse than failing the build.
//!
//! The identifier → URL table is filled from two kinds of source:
//!
//! - **Doxygen tag files** ([`LinkResolver::add_tag_xml`]): classes,
//!   namespaces and their member functions, pages and their anchors, and
//!   header files with their typedefs.
//! - **Sphinx inventories** ([`LinkResolver::add_inventory`]): Python objects
//!   from other projects' documentation.
//!
//! When two sources define the same identifier the later one wins. The number
//! of such overwrites is tracked so it can be reported.

use crate::inventory::{self, InventoryError};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid tag file {path}: {source}")]
    Xml {
        path: PathBuf,
        source: roxmltree::Error,
    },
    #[error("Bad @ref link to {0}")]
    BrokenReference(String),
    #[error("Could not include {path}: {source}")]
    Include {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%include\s+([^\s)]+)").expect("valid include regex"));
static BACKTICK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``([^\s`]+)``").expect("valid backtick regex"));
static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@ref\s+([^\s)]+)").expect("valid ref regex"));

/// Identifier → URL table plus the markup rewriting built on it.
#[derive(Debug, Clone, Default)]
pub struct LinkResolver {
    refs: HashMap<String, String>,
    overwrites: usize,
    include_dir: PathBuf,
}

impl LinkResolver {
    /// `include_dir` is the directory `%%include` paths are relative to.
    pub fn new(include_dir: &Path) -> Self {
        Self {
            refs: HashMap::new(),
            overwrites: 0,
            include_dir: include_dir.to_path_buf(),
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// How many registrations replaced an existing identifier.
    pub fn overwrites(&self) -> usize {
        self.overwrites
    }

    /// Register `name`, replacing any earlier URL for it.
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        if let Some(old) = self.refs.insert(name.clone(), url) {
            self.overwrites += 1;
            log::debug!("@ref target {name} redefined (was {old})");
        }
    }

    /// Look up an identifier verbatim, then with `.` replaced by `::`.
    pub fn resolve(&self, ident: &str) -> Result<&str, RefError> {
        self.refs
            .get(ident)
            .or_else(|| self.refs.get(&ident.replace('.', "::")))
            .map(String::as_str)
            .ok_or_else(|| RefError::BrokenReference(ident.to_string()))
    }

    /// Read a doxygen tag file from disk; URLs are prefixed with `urltop`.
    pub fn add_tag_file(&mut self, path: &Path, urltop: &str) -> Result<(), RefError> {
        let text = fs::read_to_string(path).map_err(|source| RefError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_tag_xml(&text, urltop).map_err(|source| RefError::Xml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Register every class, namespace, page and file in a tag file.
    pub fn add_tag_xml(&mut self, xml: &str, urltop: &str) -> Result<(), roxmltree::Error> {
        let doc = roxmltree::Document::parse(xml)?;
        for compound in doc
            .root_element()
            .children()
            .filter(|n| n.has_tag_name("compound"))
        {
            match compound.attribute("kind") {
                Some("class") | Some("namespace") => self.add_class_tags(compound, urltop),
                Some("page") => self.add_page_tags(compound, urltop),
                Some("file") => self.add_file_tags(compound, urltop),
                _ => {}
            }
        }
        Ok(())
    }

    fn add_class_tags(&mut self, cls: roxmltree::Node<'_, '_>, urltop: &str) {
        let (Some(name), Some(filename)) = (child_text(cls, "name"), child_text(cls, "filename"))
        else {
            return;
        };
        self.insert(name, format!("{urltop}{filename}"));

        // Tag files sometimes file a base class's members under the derived
        // class. Such a member's anchor file is the base class's page.
        let base = child_text(cls, "base");
        let base_suffix = base.map(|b| format!("{}.html", b.replace("::", "_1_1")));
        for member in cls
            .children()
            .filter(|n| n.has_tag_name("member") && n.attribute("kind") == Some("function"))
        {
            let (Some(method), Some(anchorfile), Some(anchor)) = (
                child_text(member, "name"),
                child_text(member, "anchorfile"),
                child_text(member, "anchor"),
            ) else {
                continue;
            };
            let url = format!("{urltop}{anchorfile}#{anchor}");
            self.insert(format!("{name}::{method}"), url.clone());
            if let (Some(base), Some(suffix)) = (base, &base_suffix)
                && anchorfile.ends_with(suffix.as_str())
            {
                self.insert(format!("{base}::{method}"), url);
            }
        }
    }

    fn add_page_tags(&mut self, page: roxmltree::Node<'_, '_>, urltop: &str) {
        if let (Some(name), Some(filename)) = (child_text(page, "name"), child_text(page, "filename"))
        {
            self.insert(name, format!("{urltop}{filename}.html"));
        }
        for anchor in page.children().filter(|n| n.has_tag_name("docanchor")) {
            if let (Some(file), Some(text)) = (anchor.attribute("file"), anchor.text()) {
                self.insert(text, format!("{urltop}{file}.html#{text}"));
            }
        }
    }

    fn add_file_tags(&mut self, file: roxmltree::Node<'_, '_>, urltop: &str) {
        let mut namespace: Option<&str> = None;
        for child in file.children().filter(|n| n.is_element()) {
            if child.has_tag_name("namespace") {
                namespace = child.text();
            }
            if let Some(ns) = namespace
                && child.has_tag_name("member")
                && child.attribute("kind") == Some("typedef")
                && let (Some(name), Some(anchorfile), Some(anchor)) = (
                    child_text(child, "name"),
                    child_text(child, "anchorfile"),
                    child_text(child, "anchor"),
                )
            {
                self.insert(format!("{ns}::{name}"), format!("{urltop}{anchorfile}#{anchor}"));
            }
        }
        if let (Some(name), Some(filename)) = (child_text(file, "name"), child_text(file, "filename"))
            && name.ends_with(".h")
        {
            self.insert(format!("IMP/{name}"), format!("{urltop}{filename}.html"));
        }
    }

    /// Register the Python objects of a Sphinx inventory.
    pub fn add_inventory(&mut self, data: &[u8], base_url: &str) -> Result<usize, RefError> {
        let entries = inventory::parse_inventory(data, base_url)?;
        let count = entries.len();
        for entry in entries {
            self.insert(entry.name, entry.url);
        }
        Ok(count)
    }

    /// Expand `%%include` directives, backtick links and `@ref` links in one
    /// line of markdown, in that order.
    pub fn fix_links(&self, line: &str) -> Result<String, RefError> {
        let included = try_replace_all(&INCLUDE_RE, line, |caps| {
            let path = self.include_dir.join(&caps[1]);
            fs::read_to_string(&path).map_err(|source| RefError::Include { path, source })
        })?;
        let linked = BACKTICK_RE.replace_all(&included, |caps: &Captures| backtick_link(&caps[1]));
        try_replace_all(&REF_RE, &linked, |caps| self.resolve(&caps[1]).map(str::to_string))
    }
}

/// Text of the first child element called `tag`.
fn child_text<'a>(node: roxmltree::Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(str::trim)
}

/// ``` ``IMP.Model`` ``` → `[IMP.Model](@ref IMP.Model)`;
/// ``` ``~IMP.Model`` ``` → `[Model](@ref IMP.Model)`.
fn backtick_link(token: &str) -> String {
    match token.strip_prefix('~') {
        Some(target) => {
            let short = target
                .rsplit('.')
                .next()
                .and_then(|s| s.rsplit("::").next())
                .unwrap_or(target);
            format!("[{short}](@ref {target})")
        }
        None => format!("[{token}](@ref {token})"),
    }
}

/// `Regex::replace_all` with a fallible replacement.
fn try_replace_all<E>(
    re: &Regex,
    text: &str,
    mut replace: impl FnMut(&Captures<'_>) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replace(&caps)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::make_inventory;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const URLTOP: &str = "https://integrativemodeling.org/nightly/doc/ref/";

    const TAGS: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<tagfile>
  <compound kind="class">
    <name>IMP::Foo</name>
    <filename>classIMP_1_1Foo.html</filename>
    <base>IMP::Bar</base>
    <member kind="function">
      <name>m</name>
      <anchorfile>classIMP_1_1Bar.html</anchorfile>
      <anchor>a1234</anchor>
    </member>
    <member kind="function">
      <name>own</name>
      <anchorfile>classIMP_1_1Foo.html</anchorfile>
      <anchor>a5678</anchor>
    </member>
    <member kind="variable">
      <name>x</name>
      <anchorfile>classIMP_1_1Foo.html</anchorfile>
      <anchor>a0000</anchor>
    </member>
  </compound>
  <compound kind="namespace">
    <name>IMP</name>
    <filename>namespaceIMP.html</filename>
  </compound>
  <compound kind="page">
    <name>rnapolii_stalk</name>
    <title>Modeling of RNA Pol II</title>
    <filename>rnapolii_stalk</filename>
    <docanchor file="rnapolii_stalk" title="Setup">rnapolii_setup</docanchor>
  </compound>
  <compound kind="file">
    <name>base_types.h</name>
    <path>/imp/include/IMP/</path>
    <filename>base__types_8h</filename>
    <namespace>IMP</namespace>
    <member kind="typedef">
      <type>Vector&lt; Pointer&lt; Model &gt; &gt;</type>
      <name>Models</name>
      <anchorfile>namespaceIMP.html</anchorfile>
      <anchor>a9999</anchor>
    </member>
  </compound>
  <compound kind="dir">
    <name>include</name>
    <filename>dir_1.html</filename>
  </compound>
</tagfile>
"#;

    fn resolver() -> LinkResolver {
        let mut rl = LinkResolver::new(Path::new("."));
        rl.add_tag_xml(TAGS, URLTOP).unwrap();
        rl
    }

    #[test]
    fn classes_and_namespaces_resolve_to_their_pages() {
        let rl = resolver();
        assert_eq!(
            rl.resolve("IMP::Foo").unwrap(),
            format!("{URLTOP}classIMP_1_1Foo.html")
        );
        assert_eq!(rl.resolve("IMP").unwrap(), format!("{URLTOP}namespaceIMP.html"));
    }

    #[test]
    fn inherited_method_is_registered_under_base_class() {
        let rl = resolver();
        let url = format!("{URLTOP}classIMP_1_1Bar.html#a1234");
        assert_eq!(rl.resolve("IMP::Foo::m").unwrap(), url);
        assert_eq!(rl.resolve("IMP::Bar::m").unwrap(), url);
    }

    #[test]
    fn own_method_is_not_registered_under_base_class() {
        let rl = resolver();
        assert!(rl.resolve("IMP::Foo::own").is_ok());
        assert!(matches!(
            rl.resolve("IMP::Bar::own"),
            Err(RefError::BrokenReference(_))
        ));
    }

    #[test]
    fn non_function_members_are_ignored() {
        assert!(resolver().resolve("IMP::Foo::x").is_err());
    }

    #[test]
    fn pages_and_anchors_get_html_suffix() {
        let rl = resolver();
        assert_eq!(
            rl.resolve("rnapolii_stalk").unwrap(),
            format!("{URLTOP}rnapolii_stalk.html")
        );
        assert_eq!(
            rl.resolve("rnapolii_setup").unwrap(),
            format!("{URLTOP}rnapolii_stalk.html#rnapolii_setup")
        );
    }

    #[test]
    fn file_typedefs_and_headers() {
        let rl = resolver();
        assert_eq!(
            rl.resolve("IMP::Models").unwrap(),
            format!("{URLTOP}namespaceIMP.html#a9999")
        );
        assert_eq!(
            rl.resolve("IMP/base_types.h").unwrap(),
            format!("{URLTOP}base__types_8h.html")
        );
    }

    #[test]
    fn resolve_falls_back_to_double_colon() {
        let rl = resolver();
        assert_eq!(
            rl.resolve("IMP.Foo").unwrap(),
            rl.resolve("IMP::Foo").unwrap()
        );
    }

    #[test]
    fn duplicate_identifiers_last_writer_wins() {
        let mut rl = LinkResolver::default();
        rl.insert("Foo", "https://a/1");
        rl.insert("Foo", "https://a/2");
        assert_eq!(rl.resolve("Foo").unwrap(), "https://a/2");
        assert_eq!(rl.overwrites(), 1);
        assert_eq!(rl.len(), 1);
    }

    #[test]
    fn invalid_xml_is_error() {
        let mut rl = LinkResolver::default();
        assert!(rl.add_tag_xml("<tagfile><compound>", URLTOP).is_err());
    }

    #[test]
    fn add_tag_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ref-tags.xml");
        fs::write(&path, "not xml").unwrap();
        let mut rl = LinkResolver::default();
        let err = rl.add_tag_file(&path, URLTOP).unwrap_err();
        assert!(err.to_string().contains("ref-tags.xml"));
    }

    #[test]
    fn inventory_objects_become_targets() {
        let mut rl = LinkResolver::default();
        let data = make_inventory(&["os.path.join py:function 1 library/os.path.html#$ -"]);
        assert_eq!(rl.add_inventory(&data, "https://docs.python.org/3").unwrap(), 1);
        assert_eq!(
            rl.fix_links("see @ref os.path.join").unwrap(),
            "see https://docs.python.org/3/library/os.path.html#os.path.join"
        );
    }

    // =========================================================================
    // Markup rewriting
    // =========================================================================

    #[test]
    fn ref_link_becomes_url() {
        let mut rl = LinkResolver::default();
        rl.insert("Foo", "https://x/classFoo.html");
        let out = rl.fix_links("[Foo](@ref Foo) is useful\n").unwrap();
        assert_eq!(out, "[Foo](https://x/classFoo.html) is useful\n");
        assert!(!out.contains("@ref"));
    }

    #[test]
    fn unknown_ref_is_error() {
        let rl = LinkResolver::default();
        let err = rl.fix_links("see @ref Foo\n").unwrap_err();
        assert!(matches!(err, RefError::BrokenReference(ref name) if name == "Foo"));
        assert_eq!(err.to_string(), "Bad @ref link to Foo");
    }

    #[test]
    fn backtick_link_keeps_full_name() {
        let rl = resolver();
        assert_eq!(
            rl.fix_links("Use ``IMP.Foo`` here").unwrap(),
            format!("Use [IMP.Foo]({URLTOP}classIMP_1_1Foo.html) here")
        );
    }

    #[test]
    fn backtick_link_with_tilde_shortens_display_text() {
        let rl = resolver();
        assert_eq!(
            rl.fix_links("Use ``~IMP.Foo``").unwrap(),
            format!("Use [Foo]({URLTOP}classIMP_1_1Foo.html)")
        );
        assert_eq!(backtick_link("~IMP::Foo::m"), "[m](@ref IMP::Foo::m)");
        assert_eq!(backtick_link("~Foo"), "[Foo](@ref Foo)");
    }

    #[test]
    fn include_directive_inserts_file_contents() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("snippet.txt"), "included text").unwrap();
        let rl = LinkResolver::new(tmp.path());
        assert_eq!(
            rl.fix_links("before %%include snippet.txt after").unwrap(),
            "before included text after"
        );
    }

    #[test]
    fn include_of_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let rl = LinkResolver::new(tmp.path());
        assert!(matches!(
            rl.fix_links("%%include nope.txt"),
            Err(RefError::Include { .. })
        ));
    }

    #[test]
    fn plain_text_is_unchanged() {
        let rl = LinkResolver::default();
        assert_eq!(rl.fix_links("# Title {#intro}\n").unwrap(), "# Title {#intro}\n");
    }
}
