//! Structural indexing of raw note content.
//!
//! One pass over the note text derives everything the extraction pipeline
//! consumes positionally: front matter, headings, list items with parent
//! linkage, tag occurrences and link occurrences.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use taskmill_core::note::{
    FrontMatter, HeadingMeta, LinkMeta, ListItemMeta, NoteMetadata, Span, TagMeta,
};

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<level>#{1,6})\s+(?P<text>.+?)\s*$")
        .unwrap_or_else(|err| unreachable!("heading pattern must compile: {err}"))
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>[\s>]*)(?:[-*+]|\d+[.)])\s+(?:\[(?P<marker>.)\]\s?)?")
        .unwrap_or_else(|err| unreachable!("list item pattern must compile: {err}"))
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#[A-Za-z][A-Za-z0-9_/-]*")
        .unwrap_or_else(|err| unreachable!("tag pattern must compile: {err}"))
});

static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(?P<target>[^\]|]+?)(?:\|(?P<display>[^\]]+?))?\]\]")
        .unwrap_or_else(|err| unreachable!("wiki link pattern must compile: {err}"))
});

static MD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<display>[^\]]+)\]\((?P<target>[^)\s]+)\)")
        .unwrap_or_else(|err| unreachable!("markdown link pattern must compile: {err}"))
});

/// Build the structural metadata for one note.
#[must_use]
pub fn index_note(path: &str, content: &str) -> NoteMetadata {
    let lines: Vec<&str> = content.lines().collect();
    let (front_matter, body_start) = parse_front_matter(path, &lines);

    let mut meta = NoteMetadata {
        front_matter,
        ..NoteMetadata::default()
    };

    // Stack of (indent width, line) for parent linkage within one block.
    let mut item_stack: Vec<(usize, u32)> = Vec::new();

    for (idx, raw) in lines.iter().enumerate().skip(body_start) {
        let line = u32::try_from(idx).unwrap_or(u32::MAX);

        if let Some(captures) = HEADING.captures(raw) {
            meta.headings.push(HeadingMeta {
                text: captures.name("text").map_or("", |m| m.as_str()).to_owned(),
                level: u8::try_from(captures.name("level").map_or(1, |m| m.as_str().len()))
                    .unwrap_or(6),
                line,
            });
            item_stack.clear();
        } else if let Some(captures) = LIST_ITEM.captures(raw) {
            let indent = captures.name("indent").map_or(0, |m| m.as_str().len());
            while item_stack.last().is_some_and(|&(width, _)| width >= indent) {
                item_stack.pop();
            }
            let parent = item_stack.last().map(|&(_, parent_line)| parent_line);
            meta.items.push(ListItemMeta {
                span: Some(Span::single(line)),
                parent,
                marker: captures.name("marker").and_then(|m| m.as_str().chars().next()),
            });
            item_stack.push((indent, line));
        } else if raw.trim().is_empty() {
            item_stack.clear();
        }

        for found in TAG.find_iter(raw) {
            meta.tags.push(TagMeta {
                tag: found.as_str().to_owned(),
                line,
            });
        }
        for captures in WIKI_LINK.captures_iter(raw) {
            meta.links.push(LinkMeta {
                target: captures.name("target").map_or("", |m| m.as_str()).to_owned(),
                display: captures.name("display").map(|m| m.as_str().to_owned()),
                line,
            });
        }
        for captures in MD_LINK.captures_iter(raw) {
            if raw
                .get(..captures.get(0).map_or(0, |m| m.start()))
                .is_some_and(|prefix| prefix.ends_with('['))
            {
                // Already consumed as the tail of a wiki link.
                continue;
            }
            meta.links.push(LinkMeta {
                target: captures.name("target").map_or("", |m| m.as_str()).to_owned(),
                display: captures.name("display").map(|m| m.as_str().to_owned()),
                line,
            });
        }
    }

    meta
}

/// Parse a leading `---` front matter block. Returns the parsed data and
/// the index of the first body line.
fn parse_front_matter(path: &str, lines: &[&str]) -> (FrontMatter, usize) {
    if lines.first().map(|line| line.trim()) != Some("---") {
        return (FrontMatter::default(), 0);
    }
    let Some(end) = lines
        .iter()
        .skip(1)
        .position(|line| line.trim() == "---")
        .map(|offset| offset + 1)
    else {
        return (FrontMatter::default(), 0);
    };

    let yaml = lines
        .get(1..end)
        .map(|slice| slice.join("\n"))
        .unwrap_or_default();
    let parsed: Result<serde_yaml::Value, _> = serde_yaml::from_str(&yaml);
    let front_matter = match parsed {
        Ok(serde_yaml::Value::Mapping(mapping)) => {
            let mut data = std::collections::BTreeMap::new();
            for (key, value) in mapping {
                let (serde_yaml::Value::String(key), Ok(value)) =
                    (key, serde_json::to_value(value))
                else {
                    continue;
                };
                data.insert(key, value);
            }
            FrontMatter(data)
        }
        Ok(_) => FrontMatter::default(),
        Err(err) => {
            warn!(note = path, error = %err, "front matter is not valid YAML, ignoring");
            FrontMatter::default()
        }
    };
    (front_matter, end + 1)
}
