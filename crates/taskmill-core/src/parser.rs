use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::key::{ItemKey, PosKey};
use crate::note::{FrontMatter, HeadingMeta, LinkMeta, Span, TagMeta};
use crate::record::{LinkRef, TaskRecord};

/// Optional indentation (including blockquote markers), a list marker, a
/// single bracketed status character, then the body.
static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s>]*(?:[-*+]|\d+[.)])\s+\[(?P<marker>.)\]\s?(?P<body>.*)$")
        .unwrap_or_else(|err| unreachable!("task line pattern must compile: {err}"))
});

/// Trailing block reference: `^id` at the end of the line.
static BLOCK_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\^(?P<id>[A-Za-z0-9-]+)\s*$")
        .unwrap_or_else(|err| unreachable!("block ref pattern must compile: {err}"))
});

/// Pre-resolved structural context for one line.
///
/// The caller looks up everything positional (owning section, tags and links
/// on the line, front matter) before calling the parser, which keeps
/// [`parse_line`] a pure function of its arguments.
#[derive(Debug)]
pub struct LineContext<'a> {
    /// Vault-relative path of the owning note.
    pub path: &'a str,
    /// Source span of the line, when known.
    pub span: Option<Span>,
    /// Line of the parent list item, for the identity fallback.
    pub parent: Option<u32>,
    /// Heading the line sits under.
    pub section: Option<&'a HeadingMeta>,
    /// Front matter of the owning note.
    pub front_matter: &'a FrontMatter,
    /// Tag occurrences located on this line by the structural index.
    pub tags: &'a [TagMeta],
    /// Link occurrences located on this line by the structural index.
    pub links: &'a [LinkMeta],
}

impl LineContext<'_> {
    fn key(&self) -> ItemKey {
        let pos = self.span.map_or_else(
            || PosKey::Parent(self.parent.unwrap_or(0)),
            |span| PosKey::Line(span.line),
        );
        ItemKey::new(self.path.to_owned(), pos)
    }
}

/// Convert one raw line into a minimal [`TaskRecord`], or `None` when the
/// line is not a task.
///
/// Only structurally extractable fields are filled here: marker, body,
/// merged tags, links, section, identity and flags. Dates, priority,
/// recurrence and text cleanup are left to the modifier chain.
#[must_use]
pub fn parse_line(raw: &str, ctx: &LineContext<'_>) -> Option<TaskRecord> {
    let captures = TASK_LINE.captures(raw)?;
    let marker = captures
        .name("marker")
        .and_then(|m| m.as_str().chars().next())?;
    let body = captures.name("body").map_or("", |m| m.as_str());

    let (visual, block_id) = split_block_ref(body);

    let mut tags: BTreeSet<String> = ctx.tags.iter().map(|tag| tag.tag.clone()).collect();
    tags.extend(ctx.front_matter.tags());

    let mut record = TaskRecord::new(ctx.key(), raw);
    record.visual = visual.to_owned();
    record.marker = marker;
    record.tags = tags;
    record.links = ctx
        .links
        .iter()
        .map(|link| LinkRef {
            target: link.target.clone(),
            display: link.display.clone(),
        })
        .collect();
    record.section = ctx.section.map(|heading| heading.text.clone());
    record.front_matter = ctx.front_matter.clone();
    record.span = ctx.span;
    record.block_id = block_id;
    record.checked = !body.is_empty();
    record.completed = matches!(marker, 'x' | 'X');
    record.fully_completed = marker != ' ';
    Some(record)
}

fn split_block_ref(body: &str) -> (&str, Option<String>) {
    match BLOCK_REF.find(body) {
        Some(found) => {
            let id = body[found.start()..]
                .trim()
                .trim_start_matches('^')
                .to_owned();
            (&body[..found.start()], Some(id))
        }
        None => (body, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn empty_fm() -> FrontMatter {
        FrontMatter::default()
    }

    fn ctx<'a>(front_matter: &'a FrontMatter, tags: &'a [TagMeta]) -> LineContext<'a> {
        LineContext {
            path: "notes/a.md",
            span: Some(Span::single(3)),
            parent: None,
            section: None,
            front_matter,
            tags,
            links: &[],
        }
    }

    #[test]
    fn non_task_lines_are_skipped() {
        let fm = empty_fm();
        let context = ctx(&fm, &[]);
        for line in [
            "",
            "plain prose",
            "# heading",
            "- plain list item",
            "- [] missing marker",
            "- [xx] two chars",
            "[x] no list marker",
            "    code block - [ ] nope? no list marker",
        ] {
            assert!(parse_line(line, &context).is_none(), "line: {line:?}");
        }
    }

    #[test]
    fn task_line_shapes_are_recognized() {
        let fm = empty_fm();
        let context = ctx(&fm, &[]);
        for line in [
            "- [ ] basic",
            "* [x] star marker",
            "+ [/] plus marker",
            "1. [ ] numbered",
            "2) [-] numbered paren",
            "  - [ ] indented",
            "> - [ ] quoted",
        ] {
            assert!(parse_line(line, &context).is_some(), "line: {line:?}");
        }
    }

    #[test]
    fn minimal_fields_are_extracted() {
        let fm = empty_fm();
        let tags = [TagMeta { tag: "#todo".into(), line: 3 }];
        let context = ctx(&fm, &tags);
        let record = parse_line("- [ ] buy milk #todo", &context).expect("must parse");

        assert_eq!(record.key.to_string(), "notes/a.md#L3");
        assert_eq!(record.marker, ' ');
        assert_eq!(record.visual, "buy milk #todo");
        assert!(record.tags.contains("#todo"));
        assert!(record.is_task);
        assert!(record.checked);
        assert!(!record.completed);
        assert!(!record.fully_completed);
    }

    #[test]
    fn completed_flags_follow_marker() {
        let fm = empty_fm();
        let context = ctx(&fm, &[]);

        let done = parse_line("- [x] shipped", &context).expect("must parse");
        assert!(done.completed);
        assert!(done.fully_completed);

        let custom = parse_line("- [/] underway", &context).expect("must parse");
        assert!(!custom.completed);
        assert!(custom.fully_completed);

        let empty = parse_line("- [ ]", &context).expect("must parse");
        assert!(!empty.checked);
    }

    #[test]
    fn block_ref_is_stripped_and_kept() {
        let fm = empty_fm();
        let context = ctx(&fm, &[]);
        let record = parse_line("- [ ] call home ^abc-123", &context).expect("must parse");
        assert_eq!(record.visual, "call home");
        assert_eq!(record.block_id.as_deref(), Some("abc-123"));

        let plain = parse_line("- [ ] no reference", &context).expect("must parse");
        assert_eq!(plain.block_id, None);
    }

    #[test]
    fn front_matter_tags_merge_with_line_tags() {
        let fm = FrontMatter(BTreeMap::from([
            ("tags".to_owned(), json!(["work", "#todo"])),
        ]));
        let tags = [TagMeta { tag: "#todo".into(), line: 3 }];
        let context = ctx(&fm, &tags);
        let record = parse_line("- [ ] overlap #todo", &context).expect("must parse");
        let merged: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        assert_eq!(merged, vec!["#todo", "#work"]);
    }

    #[test]
    fn identity_falls_back_to_parent() {
        let fm = empty_fm();
        let context = LineContext {
            path: "notes/a.md",
            span: None,
            parent: Some(1),
            section: None,
            front_matter: &fm,
            tags: &[],
            links: &[],
        };
        let record = parse_line("- [ ] orphaned", &context).expect("must parse");
        assert_eq!(record.key.to_string(), "notes/a.md#P1");
        assert_eq!(record.span, None);
    }

    #[test]
    fn reparsing_is_deterministic() {
        let fm = FrontMatter(BTreeMap::from([("tag".to_owned(), json!("home"))]));
        let tags = [TagMeta { tag: "#todo".into(), line: 3 }];
        let context = ctx(&fm, &tags);
        let line = "- [x] repeat me #todo ^ref";
        let first = parse_line(line, &context).expect("must parse");
        let second = parse_line(line, &context).expect("must parse");
        assert_eq!(first, second);
    }
}
