//! Sphinx object inventory (`objects.inv`) parsing.
//!
//! A version-2 inventory is four `#` header lines followed by a
//! zlib-compressed body with one object per line:
//!
//! ```text
//! name domain:role priority location display-name
//! ```
//!
//! A location ending in `$` is shorthand for "append the object name". Only
//! Python-domain (`py:*`) objects are of interest for tutorial links.

use flate2::read::ZlibDecoder;
use regex::Regex;
use std::io::Read;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Unsupported inventory format: {0:?}")]
    UnsupportedVersion(String),
    #[error("Truncated inventory header")]
    TruncatedHeader,
    #[error("Could not decompress inventory: {0}")]
    Decompress(#[from] std::io::Error),
}

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+(\S+)\s+(-?\d+)\s+?(\S*)\s+(.*)$").expect("valid inventory regex")
});

const HEADER_V2: &str = "# Sphinx inventory version 2";

/// One Python object from an inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Fully-qualified object name, e.g. `os.path.join`.
    pub name: String,
    /// Domain and role, e.g. `py:function`.
    pub kind: String,
    /// Absolute URL of the object's documentation.
    pub url: String,
}

/// Parse a version-2 inventory, resolving locations against `base_url`.
pub fn parse_inventory(data: &[u8], base_url: &str) -> Result<Vec<InventoryEntry>, InventoryError> {
    let mut rest = data;
    let mut header = Vec::with_capacity(4);
    for _ in 0..4 {
        let newline = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(InventoryError::TruncatedHeader)?;
        header.push(String::from_utf8_lossy(&rest[..newline]).trim_end().to_string());
        rest = &rest[newline + 1..];
    }
    if header[0] != HEADER_V2 {
        return Err(InventoryError::UnsupportedVersion(header[0].clone()));
    }

    let mut body = String::new();
    ZlibDecoder::new(rest).read_to_string(&mut body)?;

    Ok(body
        .lines()
        .filter_map(|line| ENTRY_RE.captures(line))
        .filter(|caps| caps[2].starts_with("py:"))
        .map(|caps| {
            let name = caps[1].to_string();
            let location = match caps[4].strip_suffix('$') {
                Some(prefix) => format!("{prefix}{name}"),
                None => caps[4].to_string(),
            };
            InventoryEntry {
                kind: caps[2].to_string(),
                url: join_url(base_url, &location),
                name,
            }
        })
        .collect())
}

/// Join a location onto a base URL the way POSIX paths join.
pub(crate) fn join_url(base: &str, location: &str) -> String {
    if location.starts_with('/') || base.is_empty() {
        location.to_string()
    } else if base.ends_with('/') {
        format!("{base}{location}")
    } else {
        format!("{base}/{location}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    /// Build an in-memory version-2 inventory from body lines.
    pub(crate) fn make_inventory(lines: &[&str]) -> Vec<u8> {
        let mut data = b"# Sphinx inventory version 2\n\
# Project: Python\n\
# Version: 3.12\n\
# The remainder of this file is compressed using zlib.\n"
            .to_vec();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for line in lines {
            encoder.write_all(line.as_bytes()).unwrap();
            encoder.write_all(b"\n").unwrap();
        }
        data.extend(encoder.finish().unwrap());
        data
    }

    #[test]
    fn parses_python_entries() {
        let data = make_inventory(&[
            "os.path.join py:function 1 library/os.path.html#$ -",
            "json py:module 0 library/json.html#module-json -",
        ]);
        let entries = parse_inventory(&data, "https://docs.python.org/3").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "os.path.join");
        assert_eq!(entries[0].kind, "py:function");
        assert_eq!(
            entries[0].url,
            "https://docs.python.org/3/library/os.path.html#os.path.join"
        );
        assert_eq!(
            entries[1].url,
            "https://docs.python.org/3/library/json.html#module-json"
        );
    }

    #[test]
    fn skips_other_domains() {
        let data = make_inventory(&[
            "glossary std:label -1 glossary.html#$ Glossary",
            "PyObject c:type 1 c-api/structures.html#c.$ -",
            "str py:class 1 library/stdtypes.html#$ -",
        ]);
        let entries = parse_inventory(&data, "https://docs.python.org/3/").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["str"]);
        assert_eq!(
            entries[0].url,
            "https://docs.python.org/3/library/stdtypes.html#str"
        );
    }

    #[test]
    fn names_with_spaces_are_kept_whole() {
        let data = make_inventory(&["a b py:method 1 x.html#ab -"]);
        let entries = parse_inventory(&data, "https://h").unwrap();
        assert_eq!(entries[0].name, "a b");
    }

    #[test]
    fn rejects_version_one() {
        let data = b"# Sphinx inventory version 1\n# a\n# b\n# c\n".to_vec();
        assert!(matches!(
            parse_inventory(&data, "https://h"),
            Err(InventoryError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            parse_inventory(b"# Sphinx inventory version 2\n", "https://h"),
            Err(InventoryError::TruncatedHeader)
        ));
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://h/doc", "a.html"), "https://h/doc/a.html");
        assert_eq!(join_url("https://h/doc/", "a.html"), "https://h/doc/a.html");
        assert_eq!(join_url("https://h/doc", "/abs.html"), "/abs.html");
    }
}
