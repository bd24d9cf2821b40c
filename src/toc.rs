//! Table of contents for a tutorial notebook.
//!
//! Doxygen builds its own table of contents from `[TOC]`, but Jupyter has no
//! such feature, so the notebook output gets a rendered markdown list in its
//! place. Every heading needs an anchor for that list to link to; headings
//! written without one (`# Title`) are given a synthetic anchor
//! (`# Title {#autotoc1v1}`) before any entries are collected.
//!
//! Headings must nest properly: the first must be level 1, and no heading may
//! be more than one level deeper than the one before it.

use crate::directives::{self, Directive, Target};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TocError {
    #[error("Top-level section ({0}) is not a level one heading (use '# title {{#anchor}}')")]
    TopLevelNotOne(String),
    #[error("A level-{level} heading ({title}) cannot follow a level-{prev_level} heading ({prev_title})")]
    LevelSkip {
        level: usize,
        title: String,
        prev_level: usize,
        prev_title: String,
    },
}

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#+)\s+(.*?)\s*\{#([^\s}]+)\}").expect("valid anchored heading regex")
});
static NOANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#+)\s+(.*?)\s*$").expect("valid heading regex"));

/// One heading: level, title text, and anchor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: usize,
    pub title: String,
    pub anchor: String,
}

/// Parse an anchored heading line into its entry.
pub fn parse_heading(line: &str) -> Option<TocEntry> {
    ANCHOR_RE.captures(line).map(|caps| TocEntry {
        level: caps[1].len(),
        title: caps[2].to_string(),
        anchor: caps[3].to_string(),
    })
}

#[derive(Debug)]
pub struct TableOfContents {
    file_index: usize,
    auto_count: usize,
    entries: Vec<TocEntry>,
}

impl TableOfContents {
    /// `file_index` distinguishes synthetic anchors of different templates
    /// built in the same run.
    pub fn new(file_index: usize) -> Self {
        Self {
            file_index,
            auto_count: 0,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Give every heading without an `{#anchor}` a synthetic one.
    ///
    /// The rewritten line keeps its trailing newline so the cell's lines
    /// still join up.
    pub fn add_missing_anchors(&mut self, source: &[String]) -> Vec<String> {
        source
            .iter()
            .map(|line| {
                if ANCHOR_RE.is_match(line) {
                    return line.clone();
                }
                let Some(caps) = NOANCHOR_RE.captures(line) else {
                    return line.clone();
                };
                self.auto_count += 1;
                let newline = if line.ends_with('\n') { "\n" } else { "" };
                format!(
                    "{} {} {{#autotoc{}v{}}}{}",
                    &caps[1], &caps[2], self.file_index, self.auto_count, newline
                )
            })
            .collect()
    }

    /// Record the anchored headings of one markdown cell.
    ///
    /// Cells excluded from the notebook do not contribute entries.
    pub fn parse_cell(&mut self, source: &[String]) -> Result<(), TocError> {
        let excluded = source.first().is_some_and(|first| {
            directives::parse_directive(first) == Some(Directive::Exclude(Target::Notebook))
        });
        if excluded {
            return Ok(());
        }
        for entry in source.iter().filter_map(|line| parse_heading(line)) {
            match self.entries.last() {
                None if entry.level != 1 => {
                    return Err(TocError::TopLevelNotOne(entry.title));
                }
                Some(prev) if entry.level > prev.level + 1 => {
                    return Err(TocError::LevelSkip {
                        level: entry.level,
                        title: entry.title,
                        prev_level: prev.level,
                        prev_title: prev.title.clone(),
                    });
                }
                _ => self.entries.push(entry),
            }
        }
        Ok(())
    }

    /// Render the contents as markdown lines, indented by heading level.
    pub fn to_markdown(&self) -> Vec<String> {
        let mut lines = vec!["**Table of contents**\n".to_string(), "\n".to_string()];
        lines.extend(self.entries.iter().map(|e| {
            format!("{}- [{}](#{})\n", " ".repeat(e.level), e.title, e.anchor)
        }));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_anchor_is_synthesized() {
        let mut toc = TableOfContents::new(3);
        let out = toc.add_missing_anchors(&lines(&["# Introduction\n", "Some text\n"]));
        assert_eq!(out, lines(&["# Introduction {#autotoc3v1}\n", "Some text\n"]));
    }

    #[test]
    fn synthesized_heading_parses_back_to_same_level_and_title() {
        let mut toc = TableOfContents::new(1);
        let out = toc.add_missing_anchors(&lines(&["## Setting up  \n"]));
        let entry = parse_heading(&out[0]).unwrap();
        assert_eq!(entry.level, 2);
        assert_eq!(entry.title, "Setting up");
        assert_eq!(entry.anchor, "autotoc1v1");
    }

    #[test]
    fn existing_anchor_is_kept() {
        let mut toc = TableOfContents::new(1);
        let src = lines(&["# Title {#intro}\n", "## Next\n"]);
        let out = toc.add_missing_anchors(&src);
        assert_eq!(out, lines(&["# Title {#intro}\n", "## Next {#autotoc1v1}\n"]));
    }

    #[test]
    fn counter_runs_across_cells() {
        let mut toc = TableOfContents::new(2);
        toc.add_missing_anchors(&lines(&["# A\n"]));
        let out = toc.add_missing_anchors(&lines(&["## B"]));
        assert_eq!(out, lines(&["## B {#autotoc2v2}"]));
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        let mut toc = TableOfContents::new(1);
        let src = lines(&["#%%nbexclude\n", "#hashtag\n"]);
        assert_eq!(toc.add_missing_anchors(&src), src);
    }

    #[test]
    fn skipping_a_level_is_an_error() {
        let mut toc = TableOfContents::new(1);
        let err = toc
            .parse_cell(&lines(&["# Top {#top}\n", "### Deep {#deep}\n"]))
            .unwrap_err();
        assert_eq!(
            err,
            TocError::LevelSkip {
                level: 3,
                title: "Deep".into(),
                prev_level: 1,
                prev_title: "Top".into(),
            }
        );
    }

    #[test]
    fn going_back_up_is_fine() {
        let mut toc = TableOfContents::new(1);
        toc.parse_cell(&lines(&["# A {#a}\n", "## B {#b}\n"])).unwrap();
        toc.parse_cell(&lines(&["# C {#c}\n"])).unwrap();
        let levels: Vec<usize> = toc.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![1, 2, 1]);
    }

    #[test]
    fn first_heading_must_be_level_one() {
        let mut toc = TableOfContents::new(1);
        let err = toc.parse_cell(&lines(&["## Sub {#sub}\n"])).unwrap_err();
        assert_eq!(err, TocError::TopLevelNotOne("Sub".into()));
    }

    #[test]
    fn notebook_excluded_cells_are_skipped() {
        let mut toc = TableOfContents::new(1);
        toc.parse_cell(&lines(&["%%nbexclude\n", "### Only in HTML {#html}\n"]))
            .unwrap();
        assert!(toc.entries().is_empty());
    }

    #[test]
    fn directive_mentioned_in_prose_keeps_headings() {
        let mut toc = TableOfContents::new(1);
        toc.parse_cell(&lines(&[
            "# Use %%nbexclude to hide cells {#hide}\n",
            "## Example {#example}\n",
        ]))
        .unwrap();
        assert_eq!(toc.entries().len(), 2);
    }

    #[test]
    fn markdown_rendering() {
        let mut toc = TableOfContents::new(1);
        toc.parse_cell(&lines(&["# Title {#intro}\n", "## Part {#part}\n"]))
            .unwrap();
        assert_eq!(
            toc.to_markdown(),
            lines(&[
                "**Table of contents**\n",
                "\n",
                " - [Title](#intro)\n",
                "  - [Part](#part)\n",
            ])
        );
    }
}
