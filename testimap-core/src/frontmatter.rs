//! Front-matter splitting for transcript source documents.

use crate::models::MetaValue;
use std::collections::BTreeMap;

/// Marker line opening and closing a front-matter block.
pub const DELIMITER: &str = "---";

/// Key-value metadata from the head of a source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    entries: BTreeMap<String, MetaValue>,
}

impl FrontMatter {
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    /// Value for `key` when it is set to something other than an empty
    /// string or zero.
    pub fn truthy(&self, key: &str) -> Option<&MetaValue> {
        self.get(key).filter(|v| v.is_truthy())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetaValue)> {
        self.entries.iter()
    }
}

/// Split a document into its front matter and body.
///
/// When the first non-empty line is not a delimiter the whole input is
/// returned unchanged as the body. Otherwise the body is everything after
/// the closing delimiter, with any directly following duplicate blocks also
/// removed, trimmed.
///
/// # Example
///
/// ```
/// use testimap_core::frontmatter::split_front_matter;
///
/// let (fm, body) = split_front_matter("---\ninterviewee: Jane Doe\n---\n<p>Hello</p>\n");
/// assert_eq!(fm.get("interviewee").unwrap().to_string(), "Jane Doe");
/// assert_eq!(body, "<p>Hello</p>");
/// ```
pub fn split_front_matter(raw: &str) -> (FrontMatter, String) {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let Some(start) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return (FrontMatter::default(), raw.to_string());
    };
    if lines[start].trim() != DELIMITER {
        return (FrontMatter::default(), raw.to_string());
    }

    let (meta_lines, mut rest) = take_block(&lines[start + 1..]);

    // Some sources carry the same block twice in a row.
    while rest.first().is_some_and(|line| line.trim() == DELIMITER) {
        rest = take_block(&rest[1..]).1;
    }

    let front_matter = parse_meta_lines(meta_lines);
    let body = rest.join("\n").trim().to_string();
    (front_matter, body)
}

/// Split at the next delimiter line: (lines before it, lines after it).
/// An unterminated block swallows the remaining lines.
fn take_block<'l, 's>(lines: &'l [&'s str]) -> (&'l [&'s str], &'l [&'s str]) {
    match lines.iter().position(|line| line.trim() == DELIMITER) {
        Some(end) => (&lines[..end], &lines[end + 1..]),
        None => (lines, &[]),
    }
}

fn parse_meta_lines(lines: &[&str]) -> FrontMatter {
    let mut front_matter = FrontMatter::default();
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        front_matter.insert(key, MetaValue::parse(value.trim()));
    }
    front_matter
}
