//! Cell-conditional directives.
//!
//! A template cell can be limited to some of the generated outputs by
//! starting its first line with a directive, optionally behind a `#` so it is
//! a comment in code cells:
//!
//! | Directive          | Effect                                   |
//! |--------------------|------------------------------------------|
//! | `%%htmlexclude`    | dropped from the doxygen markdown        |
//! | `%%nbexclude`      | dropped from the Jupyter notebook        |
//! | `%%colabexclude`   | dropped from the Colab notebook          |
//! | `%%htmlonly`       | kept only in the doxygen markdown        |
//! | `%%nbonly`         | kept only in the Jupyter notebook        |
//! | `%%colabonly`      | kept only in the Colab notebook          |
//!
//! Directive lines themselves never reach any output.

use crate::notebook::Cell;
use regex::Regex;
use std::sync::LazyLock;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?%%(html|nb|colab)(exclude|only)").expect("valid directive regex")
});

/// An output stream a cell can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Html,
    Notebook,
    Colab,
}

impl Target {
    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "html" => Some(Self::Html),
            "nb" => Some(Self::Notebook),
            "colab" => Some(Self::Colab),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Exclude(Target),
    Only(Target),
}

/// Parse a directive at the start of `line`.
pub fn parse_directive(line: &str) -> Option<Directive> {
    let caps = DIRECTIVE_RE.captures(line)?;
    let target = Target::from_marker(&caps[1])?;
    match &caps[2] {
        "exclude" => Some(Directive::Exclude(target)),
        _ => Some(Directive::Only(target)),
    }
}

pub fn is_directive_line(line: &str) -> bool {
    DIRECTIVE_RE.is_match(line)
}

/// Whether `cell` belongs in the output for `target`.
pub fn keeps(cell: &Cell, target: Target) -> bool {
    match parse_directive(cell.first_line()) {
        Some(Directive::Exclude(t)) => t != target,
        Some(Directive::Only(t)) => t == target,
        None => true,
    }
}

/// Indices of the cells that belong in the output for `target`.
pub fn cell_subset(cells: &[Cell], target: Target) -> Vec<usize> {
    cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| keeps(cell, target))
        .map(|(i, _)| i)
        .collect()
}
