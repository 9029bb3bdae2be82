//! Structural note metadata.
//!
//! The storage layer indexes every note once and hands the result to the
//! extraction pipeline: list item positions with parent linkage, heading
//! boundaries, front matter, and tag/link occurrences. The pipeline never
//! re-derives structure from raw text beyond the single task line it owns.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Line range of a structural element, zero-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// First line of the element.
    pub line: u32,
    /// Last line of the element.
    pub end_line: u32,
}

impl Span {
    /// Single-line span.
    #[must_use]
    pub const fn single(line: u32) -> Self {
        Self { line, end_line: line }
    }

    /// Whether the given line falls inside this span.
    #[must_use]
    pub const fn contains_line(&self, line: u32) -> bool {
        self.line <= line && line <= self.end_line
    }
}

/// One list item as located by the structural index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemMeta {
    /// Source span, when the indexer could locate one.
    pub span: Option<Span>,
    /// Line of the parent list item, `None` for top-level items.
    pub parent: Option<u32>,
    /// Checkbox marker character, `None` for plain list items.
    pub marker: Option<char>,
}

/// One heading as located by the structural index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingMeta {
    /// Heading text without the leading `#` markers.
    pub text: String,
    /// Heading level, 1-6.
    pub level: u8,
    /// Line the heading occupies.
    pub line: u32,
}

/// One `#tag` occurrence in the note body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMeta {
    /// Tag text including the leading `#`.
    pub tag: String,
    /// Line the occurrence is on.
    pub line: u32,
}

/// One outgoing link occurrence in the note body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMeta {
    /// Link target (wiki page name or URL).
    pub target: String,
    /// Display text, when the link carries one.
    pub display: Option<String>,
    /// Line the occurrence is on.
    pub line: u32,
}

/// Parsed front matter of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter(pub BTreeMap<String, serde_json::Value>);

impl FrontMatter {
    /// Look up a raw front matter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Tags declared in front matter, normalized to a leading `#`.
    ///
    /// Accepts `tag:` with a single value and `tags:` with either a single
    /// value or a list; duplicates collapse into the set.
    #[must_use]
    pub fn tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for key in ["tag", "tags"] {
            match self.0.get(key) {
                Some(serde_json::Value::String(value)) => {
                    insert_tag(&mut tags, value);
                }
                Some(serde_json::Value::Array(values)) => {
                    for value in values {
                        if let serde_json::Value::String(value) = value {
                            insert_tag(&mut tags, value);
                        }
                    }
                }
                _ => {}
            }
        }
        tags
    }
}

/// Normalize a tag token to its canonical `#`-prefixed form.
///
/// Returns `None` for blank input or a lone `#`.
#[must_use]
pub fn normalize_tag(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.strip_prefix('#') {
        Some("") => None,
        Some(_) => Some(value.to_owned()),
        None => Some(format!("#{value}")),
    }
}

fn insert_tag(tags: &mut BTreeSet<String>, value: &str) {
    if let Some(tag) = normalize_tag(value) {
        tags.insert(tag);
    }
}

/// Full structural metadata of one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    /// Every list item in structural order.
    pub items: Vec<ListItemMeta>,
    /// Every heading in source order.
    pub headings: Vec<HeadingMeta>,
    /// Parsed front matter, empty when the note has none.
    pub front_matter: FrontMatter,
    /// Every tag occurrence in source order.
    pub tags: Vec<TagMeta>,
    /// Every link occurrence in source order.
    pub links: Vec<LinkMeta>,
}

impl NoteMetadata {
    /// The heading a given line belongs to: the nearest heading at or above
    /// the line.
    #[must_use]
    pub fn heading_for(&self, line: u32) -> Option<&HeadingMeta> {
        self.headings
            .iter()
            .take_while(|heading| heading.line <= line)
            .last()
    }

    /// Tag occurrences that fall inside the given span.
    #[must_use]
    pub fn tags_in(&self, span: Span) -> Vec<TagMeta> {
        self.tags
            .iter()
            .filter(|tag| span.contains_line(tag.line))
            .cloned()
            .collect()
    }

    /// Link occurrences that fall inside the given span.
    #[must_use]
    pub fn links_in(&self, span: Span) -> Vec<LinkMeta> {
        self.links
            .iter()
            .filter(|link| span.contains_line(link.line))
            .cloned()
            .collect()
    }

    /// The note's own tags: front matter tags plus every body occurrence.
    ///
    /// Used for document-level tag filtering before any line is parsed.
    #[must_use]
    pub fn note_tags(&self) -> BTreeSet<String> {
        let mut tags = self.front_matter.tags();
        tags.extend(self.tags.iter().map(|tag| tag.tag.clone()));
        tags
    }
}
